#![forbid(unsafe_code)]

//! Live collection reconciliation: merge a push-delivered change feed into
//! client-held list state without reloading and without ghost rows.
//!
//! The reconciler owns the in-memory backing array and nothing else: the
//! client's filter/sort parameters live beside it in [`ViewParams`] and are
//! never touched by event handling. Each event is one of three idempotent
//! transitions:
//!
//! - **insert** — already present: ignore (duplicate delivery); otherwise
//!   add and re-sort into canonical order. Sort is reapplied, never assumed
//!   preserved by insertion position.
//! - **update** — absent: treat as insert (the subscription may postdate
//!   the row); present: replace in place, preserving array position so any
//!   client-side sort recomputes deterministically on next render.
//! - **delete** — remove by id; absence is a no-op.
//!
//! Events are applied in delivery order; duplicate delivery of any event is
//! absorbed by the transitions above. No event triggers a full reload —
//! that is what keeps reconciliation under the perceptible-latency budget.
//!
//! The feed subscription is scoped to the mounted view: [`Subscription`]
//! tears the feed down on drop, because a leaked subscription plus a
//! remount means every event reconciles twice.

use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use tracing::trace;

use chromacast_core::{AccountId, StoreError};
use chromacast_store::LiveQuery;

/// A server-owned row the client mirrors but never treats as
/// authoritative.
pub trait LiveRow: Clone {
    type Id: Copy + Eq + Ord + std::hash::Hash + std::fmt::Debug;

    fn id(&self) -> Self::Id;
    fn created_at(&self) -> DateTime<Utc>;
}

/// One change-feed message. No ordering or at-most-once delivery guarantee
/// is assumed from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent<T: LiveRow> {
    Insert(T),
    Update(T),
    Delete(T::Id),
}

/// Client-only filter/sort/pagination state. Event handling never reads or
/// writes this; it exists so the owner has one place to keep it that the
/// reconciler is structurally unable to clobber.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewParams {
    pub filter: Option<String>,
    pub page: usize,
}

/// The client-held collection for one mounted list view.
#[derive(Debug, Default)]
pub struct LiveCollection<T: LiveRow> {
    items: Vec<T>,
    /// Untouched by [`apply`](Self::apply).
    pub view: ViewParams,
}

impl<T: LiveRow> LiveCollection<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            view: ViewParams::default(),
        }
    }

    /// Replace contents from an initial load and sort canonically.
    pub fn seed(&mut self, rows: Vec<T>) {
        self.items = rows;
        self.sort_canonical();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    /// Apply one feed event. Idempotent for every event shape.
    pub fn apply(&mut self, event: ChangeEvent<T>) {
        match event {
            ChangeEvent::Insert(row) => {
                if self.contains(row.id()) {
                    trace!(id = ?row.id(), "duplicate insert ignored");
                    return;
                }
                trace!(id = ?row.id(), "insert");
                self.items.push(row);
                self.sort_canonical();
            }
            ChangeEvent::Update(row) => {
                match self.items.iter_mut().find(|item| item.id() == row.id()) {
                    Some(slot) => {
                        trace!(id = ?row.id(), "update in place");
                        *slot = row;
                    }
                    None => {
                        // Subscription started after this row was created.
                        trace!(id = ?row.id(), "update for unseen row; treating as insert");
                        self.items.push(row);
                        self.sort_canonical();
                    }
                }
            }
            ChangeEvent::Delete(id) => {
                let before = self.items.len();
                self.items.retain(|item| item.id() != id);
                trace!(?id, removed = self.items.len() != before, "delete");
            }
        }
    }

    /// Canonical order: creation time descending, id as deterministic
    /// tiebreak.
    fn sort_canonical(&mut self) {
        self.items.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
    }
}

// ---------------------------------------------------------------------------
// Change feed seam
// ---------------------------------------------------------------------------

/// Callback invoked per delivered event.
pub type Handler<T> = Box<dyn FnMut(ChangeEvent<T>) + Send>;

/// A long-lived push channel of row events, scoped per account.
pub trait ChangeFeed<T: LiveRow> {
    /// Start delivering `account`'s events to `handler`. Delivery stops
    /// when the returned [`Subscription`] is dropped.
    fn subscribe(&self, account: AccountId, handler: Handler<T>) -> Subscription;
}

/// Guard for an active feed subscription. Dropping it tears the feed down;
/// leaking it past the view's lifetime causes duplicate reconciliation on
/// remount.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Explicit teardown, for hosts that want the unmount visible in code.
    pub fn end(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// In-memory feed
// ---------------------------------------------------------------------------

struct FeedInner<T: LiveRow> {
    rows: Vec<(AccountId, T)>,
    handlers: AHashMap<u64, (AccountId, Handler<T>)>,
    next_token: u64,
}

/// In-memory [`ChangeFeed`] backed by its own row table. Mutating the table
/// emits the matching event to every live subscriber of that account, which
/// makes multi-view and duplicate-delivery tests direct to write.
pub struct MemoryFeed<T: LiveRow> {
    inner: Arc<Mutex<FeedInner<T>>>,
}

impl<T: LiveRow> Default for MemoryFeed<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FeedInner {
                rows: Vec::new(),
                handlers: AHashMap::new(),
                next_token: 0,
            })),
        }
    }
}

impl<T: LiveRow> MemoryFeed<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().handlers.len()
    }

    /// Insert a row and emit `Insert`.
    pub fn insert_row(&self, account: AccountId, row: T) {
        let mut inner = self.lock();
        inner.rows.push((account, row.clone()));
        Self::deliver(&mut inner, account, ChangeEvent::Insert(row));
    }

    /// Update (or upsert) a row and emit `Update`.
    pub fn update_row(&self, account: AccountId, row: T) {
        let mut inner = self.lock();
        match inner
            .rows
            .iter_mut()
            .find(|(a, r)| *a == account && r.id() == row.id())
        {
            Some((_, slot)) => *slot = row.clone(),
            None => inner.rows.push((account, row.clone())),
        }
        Self::deliver(&mut inner, account, ChangeEvent::Update(row));
    }

    /// Remove a row and emit `Delete`.
    pub fn delete_row(&self, account: AccountId, id: T::Id) {
        let mut inner = self.lock();
        inner.rows.retain(|(a, r)| !(*a == account && r.id() == id));
        Self::deliver(&mut inner, account, ChangeEvent::Delete(id));
    }

    /// Deliver an event without touching the table — for duplicate and
    /// out-of-order delivery tests.
    pub fn deliver_raw(&self, account: AccountId, event: ChangeEvent<T>) {
        Self::deliver(&mut self.lock(), account, event);
    }

    fn deliver(inner: &mut FeedInner<T>, account: AccountId, event: ChangeEvent<T>) {
        for (subscriber, handler) in inner.handlers.values_mut() {
            if *subscriber == account {
                handler(event.clone());
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedInner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: LiveRow + Send + 'static> ChangeFeed<T> for MemoryFeed<T> {
    fn subscribe(&self, account: AccountId, handler: Handler<T>) -> Subscription {
        let token = {
            let mut inner = self.lock();
            let token = inner.next_token;
            inner.next_token += 1;
            inner.handlers.insert(token, (account, handler));
            token
        };
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                inner.handlers.remove(&token);
            }
        })
    }
}

impl<T: LiveRow> LiveQuery<T> for MemoryFeed<T> {
    fn items_newer_than(
        &self,
        account: AccountId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<T>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .rows
            .iter()
            .filter(|(a, row)| *a == account && since.is_none_or(|bound| row.created_at() > bound))
            .map(|(_, row)| row.clone())
            .collect())
    }
}
