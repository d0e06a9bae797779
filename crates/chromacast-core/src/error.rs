#![forbid(unsafe_code)]

//! Error taxonomy for the cascade.
//!
//! Three failure domains, each with its own enum: malformed color values
//! ([`ColorError`]), storage-tier failures ([`StoreError`]), and
//! referential/generation violations ([`IntegrityError`]). Integrity
//! violations are always rejected before any persistence happens; store
//! failures are recoverable and the engine degrades rather than propagating
//! them to the paint path.

use thiserror::Error;

use crate::color::{ColorId, HexColor};
use crate::preset::PresetId;

/// A color value that does not satisfy its representation's constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// Not a 7-character `#RRGGBB` string.
    #[error("invalid hex color {0:?}: expected \"#RRGGBB\"")]
    InvalidHex(String),
    /// Hue outside `[0, 360)`.
    #[error("hue {0} out of range [0, 360)")]
    HueRange(u16),
    /// Saturation or lightness outside `[0, 100]`.
    #[error("{field} {value} out of range [0, 100]")]
    PercentRange { field: &'static str, value: u8 },
}

/// A durable-store or propagation-tier failure. Always recoverable: reads
/// degrade to the last painted value, writes surface as retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    Read(String),
    #[error("store write failed: {0}")]
    Write(String),
    /// A referenced row is missing from the store.
    #[error("{kind} not found in store")]
    Missing { kind: &'static str },
}

/// A referential-integrity or generation violation, detected before any row
/// is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Deleting this color would leave a preset slot with no substitute.
    /// The caller should add another color first.
    #[error("color {color} is the only color on the account and is still referenced; add another color before deleting it")]
    LastColor { color: ColorId },
    /// An operation referenced a color row that does not exist.
    #[error("unknown color {0}")]
    UnknownColor(ColorId),
    /// An operation referenced a preset row that does not exist.
    #[error("unknown preset {0}")]
    UnknownPreset(PresetId),
    /// The generator returned the same hex for primary and accent.
    #[error("generated preset is degenerate: primary and accent are both {hex}")]
    DegeneratePreset { hex: HexColor },
}

/// Combined error for lifecycle operations, which can fail on either the
/// integrity gate or the store itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    /// The external generator call itself failed (network, quota, garbage
    /// response). Nothing was persisted.
    #[error("preset generator failed: {0}")]
    Generator(String),
}
