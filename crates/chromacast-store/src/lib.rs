#![forbid(unsafe_code)]

//! Storage tiers for the chromacast cascade.
//!
//! One logical value — "the active brand color" — lives in several places
//! with very different properties:
//!
//! | Tier | Read | Write | Authority |
//! |------|------|-------|-----------|
//! | [`DurableStore`] | async to paint | async | final arbiter |
//! | [`EdgeCacheChannel`] | sync, pre-render | sweep-then-write | one cycle stale, max |
//! | [`SessionMirror`] | post-hydration | best effort | fallback only |
//!
//! This crate defines the trait seam for each tier plus an in-memory
//! reference implementation used by tests and by hosts without a real
//! backend. The memory implementations deliberately model the failure modes
//! the engine must survive: injectable read/write failures on the durable
//! store, and attribute-variant shadowing on the cookie jar.
//!
//! Precedence between tiers belongs to the resolution engine, not here; a
//! tier only knows how to read and write itself.

/// Cookie jar seam, channel value encoding, and the edge cache channel.
pub mod cookie;
/// Durable store trait and the in-memory reference implementation.
pub mod durable;
/// Tab-local session mirror.
pub mod session;

pub use cookie::{
    ChannelValue, CookieAttrs, CookieJar, EdgeCacheChannel, MemoryJar, SameSite,
    percent_decode, percent_encode,
};
pub use durable::{DurableStore, LiveQuery, MemoryStore};
pub use session::{MemorySession, SessionChannel, SessionMirror};
