#![forbid(unsafe_code)]

//! Preset lifecycle: create, update, rename, delete — with the referential
//! integrity rules that keep every preset slot pointing at a live color.
//!
//! # Dedupe rule
//!
//! No account ever holds two color rows with the same hex. Every path that
//! would insert a color first looks for an existing row with that exact
//! value and reuses it.
//!
//! # The hazardous path
//!
//! `delete_color` is the one operation that can break the cascade. It must
//! rewrite every preset slot referencing the doomed color to a substitute
//! before the row goes away, refuse outright when no substitute exists, and
//! re-resolve the cascade when the deleted color was the one on screen.
//! All checks happen before the first write.
//!
//! # Write ordering
//!
//! Multi-row operations run colors → preset → pointer, so a mid-sequence
//! failure strands at worst an unused color row (harmless), never a preset
//! slot pointing at a missing color (harmful).

use tracing::{debug, info, warn};

use chromacast_core::{
    AccountId, ActiveThemePointer, CascadeSnapshot, Color, ColorId, FontDescriptor, HexColor,
    IntegrityError, LifecycleError, PresetId, PresetOrigin, ThemePreset,
};
use chromacast_store::{CookieJar, DurableStore, SessionMirror};

use crate::inject::StyleTarget;
use crate::resolve::ResolutionEngine;

/// Response of the external palette generator. Opaque to this system apart
/// from the two-hexes-must-differ gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPalette {
    pub name: String,
    pub primary: HexColor,
    pub accent: HexColor,
}

/// The external AI collaborator. Request/response; no retries or streaming
/// at this seam.
pub trait PresetGenerator {
    fn generate(&mut self, hint: Option<&str>) -> Result<GeneratedPalette, String>;
}

/// Account-scoped lifecycle operations over a [`DurableStore`].
#[derive(Debug, Clone, Copy)]
pub struct PresetLifecycleManager {
    account: AccountId,
}

impl PresetLifecycleManager {
    pub const fn new(account: AccountId) -> Self {
        Self { account }
    }

    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// Reuse the account's existing row for `hex`, or insert a fresh one.
    pub fn dedupe_or_insert_color(
        &self,
        store: &mut dyn DurableStore,
        name: &str,
        hex: HexColor,
    ) -> Result<Color, LifecycleError> {
        if let Some(existing) = store
            .colors(self.account)?
            .into_iter()
            .find(|c| c.hex() == hex)
        {
            debug!(account = %self.account, %hex, existing = %existing.id(), "deduped color by exact hex");
            return Ok(existing);
        }
        let color = Color::from_hex(ColorId::new(), name, hex);
        store.put_color(self.account, color.clone())?;
        Ok(color)
    }

    /// Quick-create: a preset from two hex values. Colors are deduped, the
    /// preset is written after them.
    pub fn create_preset(
        &self,
        store: &mut dyn DurableStore,
        name: &str,
        primary_hex: HexColor,
        accent_hex: HexColor,
    ) -> Result<ThemePreset, LifecycleError> {
        let primary = self.dedupe_or_insert_color(store, &format!("{name} primary"), primary_hex)?;
        let accent = self.dedupe_or_insert_color(store, &format!("{name} accent"), accent_hex)?;
        if primary.id() == accent.id() {
            // Manual creation may relax the distinct-colors rule; the UI
            // warns, we just record it.
            warn!(account = %self.account, preset = name, "manual preset uses one color for primary and accent");
        }
        let preset = ThemePreset {
            id: PresetId::new(),
            name: name.to_string(),
            primary: primary.id(),
            secondary: None,
            accent: accent.id(),
            font: FontDescriptor::default(),
            origin: PresetOrigin::Manual,
        };
        store.put_preset(self.account, preset.clone())?;
        info!(account = %self.account, preset = %preset.id, "preset created");
        Ok(preset)
    }

    /// Create a preset and point the account at it, in the fixed
    /// colors → preset → pointer order.
    pub fn create_and_activate(
        &self,
        store: &mut dyn DurableStore,
        name: &str,
        primary_hex: HexColor,
        accent_hex: HexColor,
    ) -> Result<ThemePreset, LifecycleError> {
        let preset = self.create_preset(store, name, primary_hex, accent_hex)?;
        store.set_active(ActiveThemePointer {
            account: self.account,
            active: preset.id,
        })?;
        Ok(preset)
    }

    /// Repoint a preset's primary/accent slots at (possibly deduped) new
    /// colors.
    pub fn update_preset(
        &self,
        store: &mut dyn DurableStore,
        preset_id: PresetId,
        primary_hex: HexColor,
        accent_hex: HexColor,
    ) -> Result<ThemePreset, LifecycleError> {
        let mut preset = store
            .preset(self.account, preset_id)?
            .ok_or(IntegrityError::UnknownPreset(preset_id))?;
        let primary =
            self.dedupe_or_insert_color(store, &format!("{} primary", preset.name), primary_hex)?;
        let accent =
            self.dedupe_or_insert_color(store, &format!("{} accent", preset.name), accent_hex)?;
        preset.primary = primary.id();
        preset.accent = accent.id();
        store.put_preset(self.account, preset.clone())?;
        Ok(preset)
    }

    pub fn rename_preset(
        &self,
        store: &mut dyn DurableStore,
        preset_id: PresetId,
        name: &str,
    ) -> Result<(), LifecycleError> {
        let mut preset = store
            .preset(self.account, preset_id)?
            .ok_or(IntegrityError::UnknownPreset(preset_id))?;
        preset.name = name.to_string();
        store.put_preset(self.account, preset)?;
        Ok(())
    }

    pub fn rename_color(
        &self,
        store: &mut dyn DurableStore,
        color_id: ColorId,
        name: &str,
    ) -> Result<(), LifecycleError> {
        let mut color = store
            .color(self.account, color_id)?
            .ok_or(IntegrityError::UnknownColor(color_id))?;
        color.rename(name);
        store.put_color(self.account, color)?;
        Ok(())
    }

    /// Everything the account owns, for list views.
    pub fn list_presets(
        &self,
        store: &dyn DurableStore,
    ) -> Result<Vec<ThemePreset>, LifecycleError> {
        Ok(store.presets(self.account)?)
    }

    pub fn list_colors(&self, store: &dyn DurableStore) -> Result<Vec<Color>, LifecycleError> {
        Ok(store.colors(self.account)?)
    }

    /// Delete the preset row only; its colors stay. The active pointer is
    /// left alone — resolution treats a dangling pointer like a first
    /// visit and falls back.
    pub fn delete_preset(
        &self,
        store: &mut dyn DurableStore,
        preset_id: PresetId,
    ) -> Result<(), LifecycleError> {
        if store.preset(self.account, preset_id)?.is_none() {
            return Err(IntegrityError::UnknownPreset(preset_id).into());
        }
        store.remove_preset(self.account, preset_id)?;
        info!(account = %self.account, preset = %preset_id, "preset deleted; colors untouched");
        Ok(())
    }

    /// The hazardous path. Substitutes another existing color into every
    /// slot referencing `color_id`, refuses when none exists, and — when
    /// the active preset was touched — re-resolves the cascade before
    /// returning, so a color can never be "active but deleted".
    #[allow(clippy::too_many_arguments)]
    pub fn delete_color(
        &self,
        store: &mut dyn DurableStore,
        cascade: &mut ResolutionEngine,
        jar: &mut dyn CookieJar,
        mirror: &mut dyn SessionMirror,
        target: &mut dyn StyleTarget,
        color_id: ColorId,
    ) -> Result<(), LifecycleError> {
        let colors = store.colors(self.account)?;
        if !colors.iter().any(|c| c.id() == color_id) {
            return Err(IntegrityError::UnknownColor(color_id).into());
        }

        let referencing: Vec<ThemePreset> = store
            .presets(self.account)?
            .into_iter()
            .filter(|p| p.references(color_id))
            .collect();

        let substitute = colors.iter().find(|c| c.id() != color_id).map(Color::id);

        let mut touched_active = false;
        if !referencing.is_empty() {
            let Some(substitute) = substitute else {
                return Err(IntegrityError::LastColor { color: color_id }.into());
            };
            let pointer = store.active_pointer(self.account)?;
            for mut preset in referencing {
                let rewritten = preset.substitute(color_id, substitute);
                debug!(preset = %preset.id, slots = rewritten, substitute = %substitute, "rewrote slots before color delete");
                if pointer.is_some_and(|p| p.active == preset.id) {
                    touched_active = true;
                }
                store.put_preset(self.account, preset)?;
            }
        }
        store.remove_color(self.account, color_id)?;
        info!(account = %self.account, color = %color_id, "color deleted");

        if touched_active {
            // The deleted color was on screen; re-resolve so the paint and
            // the fast tiers pick up the substitute before we report done.
            cascade.reconcile(store, jar, mirror, target);
        }
        Ok(())
    }

    /// Auto-generation flow. The degenerate-palette gate runs before any
    /// persistence: an equal primary/accent response aborts the whole
    /// creation.
    pub fn generate_preset(
        &self,
        store: &mut dyn DurableStore,
        generator: &mut dyn PresetGenerator,
        hint: Option<&str>,
    ) -> Result<ThemePreset, LifecycleError> {
        let palette = generator.generate(hint).map_err(LifecycleError::Generator)?;
        if palette.primary == palette.accent {
            return Err(IntegrityError::DegeneratePreset {
                hex: palette.primary,
            }
            .into());
        }

        let primary =
            self.dedupe_or_insert_color(store, &format!("{} primary", palette.name), palette.primary)?;
        let accent =
            self.dedupe_or_insert_color(store, &format!("{} accent", palette.name), palette.accent)?;
        let preset = ThemePreset {
            id: PresetId::new(),
            name: palette.name,
            primary: primary.id(),
            secondary: None,
            accent: accent.id(),
            font: FontDescriptor::default(),
            origin: PresetOrigin::Generated,
        };
        store.put_preset(self.account, preset.clone())?;
        info!(account = %self.account, preset = %preset.id, "generated preset persisted");
        Ok(preset)
    }

    /// Resolve a preset's snapshot from its rows, for the UI's optimistic
    /// switch path.
    pub fn resolve_snapshot(
        &self,
        store: &dyn DurableStore,
        preset: &ThemePreset,
    ) -> Result<CascadeSnapshot, LifecycleError> {
        let primary = store
            .color(self.account, preset.primary)?
            .ok_or(IntegrityError::UnknownColor(preset.primary))?;
        let accent = store.color(self.account, preset.accent)?;
        Ok(CascadeSnapshot::resolve(&primary, accent.as_ref()))
    }
}
