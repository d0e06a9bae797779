#![forbid(unsafe_code)]

//! Data model for the chromacast theme cascade.
//!
//! # Role in chromacast
//! `chromacast-core` is the shared vocabulary for colors, presets, and the
//! active-theme pointer. The store and engine crates move these values
//! between tiers; this crate keeps them well-formed.
//!
//! # This crate provides
//! - [`HexColor`] and [`Hsl`], two representations of one color, with the
//!   conversions between them.
//! - [`Color`], an owned row whose hex/HSL pair is re-synced at every
//!   mutation — a stale pair can never be observed or persisted.
//! - [`ThemePreset`], [`ActiveThemePointer`], and [`CascadeSnapshot`], the
//!   preset bundle, the single mutable selection row, and the derived value
//!   mirrored into the fast tiers.
//! - The error taxonomy: [`ColorError`], [`StoreError`], [`IntegrityError`].
//!
//! # How it fits in the system
//! `chromacast-store` persists these rows and encodes snapshots onto the
//! edge cache channel; `chromacast-engine` resolves which snapshot is
//! authoritative and mutates rows through the lifecycle manager. Nothing in
//! this crate touches a storage tier.

/// Color representations, conversion, and luminance utilities.
pub mod color;
/// Error taxonomy shared across the workspace.
pub mod error;
/// Presets, the active pointer, and the derived cascade snapshot.
pub mod preset;

pub use color::{
    AccountId, Color, ColorId, HexColor, Hsl, contrast_ratio, readable_text_hex,
    relative_luminance,
};
pub use error::{ColorError, IntegrityError, LifecycleError, StoreError};
pub use preset::{
    ActiveThemePointer, CascadeSnapshot, FontDescriptor, PresetId, PresetOrigin, PresetSlot,
    ThemePreset,
};
