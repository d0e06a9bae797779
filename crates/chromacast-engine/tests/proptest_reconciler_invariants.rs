//! Property-based invariant tests for the live collection reconciler.
//!
//! Verifies structural guarantees over arbitrary event streams:
//!
//! 1. No duplicate ids, whatever the delivery pattern
//! 2. Every event is idempotent: delivering it twice equals once
//! 3. Insert events always leave the collection in canonical order
//! 4. Client view params survive any event stream untouched
//! 5. Event application never panics (deletes of unknown ids included)

use chromacast_engine::{ChangeEvent, LiveCollection, LiveRow, ViewParams};
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    id: u8,
    revision: u16,
    created_at: DateTime<Utc>,
}

impl LiveRow for Row {
    type Id = u8;

    fn id(&self) -> u8 {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn arb_row() -> impl Strategy<Value = Row> {
    (0u8..8, 0u16..100, 0u32..60).prop_map(|(id, revision, minute)| Row {
        id,
        revision,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
    })
}

fn arb_event() -> impl Strategy<Value = ChangeEvent<Row>> {
    prop_oneof![
        arb_row().prop_map(ChangeEvent::Insert),
        arb_row().prop_map(ChangeEvent::Update),
        (0u8..12).prop_map(ChangeEvent::Delete),
    ]
}

fn unique_ids(list: &LiveCollection<Row>) -> bool {
    let mut seen = std::collections::HashSet::new();
    list.items().iter().all(|row| seen.insert(row.id))
}

fn canonically_ordered(list: &LiveCollection<Row>) -> bool {
    list.items().windows(2).all(|pair| {
        (pair[1].created_at, pair[1].id) <= (pair[0].created_at, pair[0].id)
    })
}

// ═════════════════════════════════════════════════════════════════════════
// 1 & 5. uniqueness and no panics over arbitrary streams
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn ids_stay_unique(events in proptest::collection::vec(arb_event(), 0..60)) {
        let mut list = LiveCollection::new();
        for event in events {
            list.apply(event);
            prop_assert!(unique_ids(&list));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. idempotence of every event
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn double_delivery_equals_single(
        prefix in proptest::collection::vec(arb_event(), 0..30),
        event in arb_event(),
    ) {
        let mut once = LiveCollection::new();
        for e in &prefix {
            once.apply(e.clone());
        }
        let mut twice = LiveCollection::new();
        for e in &prefix {
            twice.apply(e.clone());
        }

        once.apply(event.clone());
        twice.apply(event.clone());
        twice.apply(event);

        prop_assert_eq!(once.items(), twice.items());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. canonical order after insert-only streams
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn inserts_keep_canonical_order(rows in proptest::collection::vec(arb_row(), 0..40)) {
        let mut list = LiveCollection::new();
        for row in rows {
            list.apply(ChangeEvent::Insert(row));
            prop_assert!(canonically_ordered(&list));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. view params are never touched
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn view_params_survive(events in proptest::collection::vec(arb_event(), 0..60)) {
        let mut list = LiveCollection::new();
        list.view = ViewParams {
            filter: Some("status:active".into()),
            page: 7,
        };
        for event in events {
            list.apply(event);
        }
        prop_assert_eq!(list.view.filter.as_deref(), Some("status:active"));
        prop_assert_eq!(list.view.page, 7);
    }
}
