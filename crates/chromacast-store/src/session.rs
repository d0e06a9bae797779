#![forbid(unsafe_code)]

//! Tab-local session mirror: the fallback tier consulted only when the edge
//! cache channel is unavailable.
//!
//! The mirror is readable only after hydration, so it can never help the
//! very first paint — its job is to keep the *current tab* correct when a
//! cookie write was silently dropped. It shares the scalar field codec with
//! the channel so the two tiers can never disagree about wire shape.

use chromacast_core::CascadeSnapshot;

use crate::cookie::{parse_snapshot, snapshot_fields};

/// Raw tab-local key/value storage. The host backs this with real session
/// storage; tests use [`MemorySession`].
pub trait SessionMirror {
    fn put(&mut self, key: &str, value: &str);
    fn get(&self, key: &str) -> Option<String>;
    fn remove(&mut self, key: &str);
}

/// Typed snapshot access over a [`SessionMirror`], using the same field
/// layout as the edge cache channel.
#[derive(Debug, Clone)]
pub struct SessionChannel {
    prefix: String,
}

impl Default for SessionChannel {
    fn default() -> Self {
        Self {
            prefix: "chromacast-brand".into(),
        }
    }
}

impl SessionChannel {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Mirror a snapshot. Stale accent fields from a previous write are
    /// removed first; the session has no attribute variants to sweep.
    pub fn write(&self, mirror: &mut dyn SessionMirror, snap: &CascadeSnapshot) {
        for suffix in ["ah", "as", "al"] {
            mirror.remove(&format!("{}-{suffix}", self.prefix));
        }
        for (key, value) in snapshot_fields(&self.prefix, snap) {
            mirror.put(&key, &value.encode());
        }
    }

    /// Post-hydration read; malformed entries degrade to `None`.
    pub fn read(&self, mirror: &dyn SessionMirror) -> Option<CascadeSnapshot> {
        parse_snapshot(&self.prefix, |key| mirror.get(key))
    }
}

/// In-memory [`SessionMirror`].
#[derive(Debug, Default)]
pub struct MemorySession {
    entries: ahash::AHashMap<String, String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionMirror for MemorySession {
    fn put(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}
