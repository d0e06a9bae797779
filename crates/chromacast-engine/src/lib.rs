#![forbid(unsafe_code)]

//! Behavior layer of the chromacast cascade.
//!
//! # Role in chromacast
//! `chromacast-engine` is where the tiers defined by `chromacast-store`
//! get an opinion: which one is authoritative right now, how a user edit
//! propagates, and how a push feed folds into list state.
//!
//! # This crate provides
//! - [`StyleInjector`] — materializes a resolved color as one
//!   highest-precedence style fragment, replaced atomically on every apply.
//! - [`ResolutionEngine`] — the per-page-load state machine that paints
//!   from the fast tiers, reconciles against the durable store, and writes
//!   user mutations through every tier in a fixed order.
//! - [`PresetLifecycleManager`] — preset/color CRUD with hex dedupe,
//!   substitution-before-delete, and the generation gate.
//! - [`LiveCollection`] — idempotent insert/update/delete reconciliation of
//!   a change feed into an owned collection, with drop-guarded
//!   subscriptions.
//!
//! # Degradation contract
//! Nothing in this crate may blank the UI or panic on a tier failure:
//! reads degrade to the last painted value, writes surface as retryable
//! errors with the optimistic paint kept, and feed anomalies are absorbed
//! silently.

/// Style injection engine and the style target seam.
pub mod inject;
/// Preset lifecycle manager and the generation gate.
pub mod lifecycle;
/// Live collection reconciler and the change feed seam.
pub mod reconcile;
/// The resolution state machine.
pub mod resolve;

pub use inject::{RecordingTarget, StyleInjector, StyleTarget, TargetError};
pub use lifecycle::{GeneratedPalette, PresetGenerator, PresetLifecycleManager};
pub use reconcile::{
    ChangeEvent, ChangeFeed, Handler, LiveCollection, LiveRow, MemoryFeed, Subscription,
    ViewParams,
};
pub use resolve::{Phase, Resolution, ResolutionEngine};
