#![forbid(unsafe_code)]

//! Theme presets, the active pointer, and the derived cascade snapshot.

use std::fmt;

use uuid::Uuid;

use crate::color::{AccountId, Color, ColorId, Hsl};

/// Identity of a [`ThemePreset`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PresetId(Uuid);

impl PresetId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Font stack carried alongside the color slots. Opaque to the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontDescriptor {
    pub family: String,
    pub fallback: String,
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self {
            family: "system-ui".into(),
            fallback: "sans-serif".into(),
        }
    }
}

/// How a preset came to exist. Generated presets carry a hard invariant
/// (primary and accent must be distinct colors); manual presets only get a
/// UI warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PresetOrigin {
    Manual,
    Generated,
}

/// The three color slots of a preset. The secondary slot is optional; the
/// quick-create path only takes primary and accent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetSlot {
    Primary,
    Secondary,
    Accent,
}

/// A named bundle of color references plus a font descriptor.
///
/// Colors are shared by reference: many presets may point at one [`Color`]
/// row, and deleting a preset never deletes its colors. The lifecycle
/// manager is responsible for never letting a slot dangle.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThemePreset {
    pub id: PresetId,
    pub name: String,
    pub primary: ColorId,
    pub secondary: Option<ColorId>,
    pub accent: ColorId,
    pub font: FontDescriptor,
    pub origin: PresetOrigin,
}

impl ThemePreset {
    /// Every occupied slot and the color it references.
    pub fn slots(&self) -> impl Iterator<Item = (PresetSlot, ColorId)> + '_ {
        [
            Some((PresetSlot::Primary, self.primary)),
            self.secondary.map(|id| (PresetSlot::Secondary, id)),
            Some((PresetSlot::Accent, self.accent)),
        ]
        .into_iter()
        .flatten()
    }

    /// Whether any slot references `color`.
    pub fn references(&self, color: ColorId) -> bool {
        self.slots().any(|(_, id)| id == color)
    }

    /// Point every slot that references `from` at `to` instead. Returns the
    /// number of slots rewritten.
    pub fn substitute(&mut self, from: ColorId, to: ColorId) -> usize {
        let mut rewritten = 0;
        if self.primary == from {
            self.primary = to;
            rewritten += 1;
        }
        if self.secondary == Some(from) {
            self.secondary = Some(to);
            rewritten += 1;
        }
        if self.accent == from {
            self.accent = to;
            rewritten += 1;
        }
        rewritten
    }
}

/// The single mutable selection row: which preset is active for an account.
/// Created lazily on first selection, rewritten on every switch, deleted
/// only with the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveThemePointer {
    pub account: AccountId,
    pub active: PresetId,
}

/// The derived value mirrored into the fast tiers: the resolved HSL of the
/// active preset's primary (and accent, when present). Carries no identity
/// of its own — it is always reproducible from
/// `ActiveThemePointer → ThemePreset → Color`, and is allowed to be stale
/// for at most one resolution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CascadeSnapshot {
    pub primary: Hsl,
    pub accent: Option<Hsl>,
}

impl CascadeSnapshot {
    pub const fn new(primary: Hsl, accent: Option<Hsl>) -> Self {
        Self { primary, accent }
    }

    /// Resolve from the rows the active pointer leads to.
    pub fn resolve(primary: &Color, accent: Option<&Color>) -> Self {
        Self {
            primary: primary.hsl(),
            accent: accent.map(Color::hsl),
        }
    }
}
