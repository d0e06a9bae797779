#![forbid(unsafe_code)]

//! The resolution engine: decides which tier is authoritative and closes
//! the loop so the next load agrees.
//!
//! One engine instance per page load. The resting phases are explicit:
//!
//! ```text
//! Init ──first_paint()──▶ Reconciling ──reconcile()──▶ Applied
//! ```
//!
//! `first_paint` is synchronous and touches only the pre-render tiers
//! (channel, then session mirror). `reconcile` is the only step that reads
//! the durable store, and it runs after the page is interactive — nothing
//! here may sit on the critical render path. The host is responsible for
//! bounding the durable read (a store call that never returns is a soft
//! failure at the seam: give up after your budget and the painted value
//! stands).
//!
//! User mutations ([`set_active`], [`apply_color`]) run the `Mutating`
//! transition inline: optimistic paint first, then durable persist, then
//! channel + mirror propagation. A failed persist surfaces as a retryable
//! error and never reverts the paint.
//!
//! [`set_active`]: ResolutionEngine::set_active
//! [`apply_color`]: ResolutionEngine::apply_color

use tracing::{debug, warn};

use chromacast_core::{
    AccountId, ActiveThemePointer, CascadeSnapshot, Color, PresetId, StoreError, ThemePreset,
};
use chromacast_store::{
    CookieJar, DurableStore, EdgeCacheChannel, SessionChannel, SessionMirror,
};

use crate::inject::{StyleInjector, StyleTarget};

/// Resting state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Pre-paint; no tier consulted yet.
    Init,
    /// First paint done (or skipped); durable store not yet consulted.
    Reconciling,
    /// Durable store consulted; tiers agree until the next mutation.
    Applied,
}

/// What `reconcile` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Durable agreed with the painted value; nothing changed.
    Confirmed,
    /// Durable differed; the value was re-applied and propagated.
    Corrected(CascadeSnapshot),
    /// No pointer and no "Default"-named preset; nothing asserted.
    Unset,
    /// Durable unreachable or rows missing; the painted value stands.
    Degraded,
}

/// One page load's resolution state machine.
#[derive(Debug)]
pub struct ResolutionEngine {
    account: AccountId,
    channel: EdgeCacheChannel,
    session: SessionChannel,
    injector: StyleInjector,
    phase: Phase,
}

impl ResolutionEngine {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            channel: EdgeCacheChannel::default(),
            session: SessionChannel::default(),
            injector: StyleInjector::default(),
            phase: Phase::Init,
        }
    }

    pub fn with_channel(mut self, channel: EdgeCacheChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_session(mut self, session: SessionChannel) -> Self {
        self.session = session;
        self
    }

    pub fn with_injector(mut self, injector: StyleInjector) -> Self {
        self.injector = injector;
        self
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// The injector, for the host's delayed-reapply scheduling and for
    /// wait-free paint-path reads of the applied snapshot.
    pub const fn injector(&self) -> &StyleInjector {
        &self.injector
    }

    /// What the page is currently showing, if anything.
    pub fn painted(&self) -> Option<CascadeSnapshot> {
        self.injector.applied()
    }

    /// Synchronous pre-render paint from the fast tiers: channel first,
    /// session mirror as fallback. Returns what was painted, if anything.
    /// No durable read, no network, no waiting.
    pub fn first_paint(
        &mut self,
        jar: &dyn CookieJar,
        mirror: &dyn SessionMirror,
        target: &mut dyn StyleTarget,
    ) -> Option<CascadeSnapshot> {
        let snap = self
            .channel
            .read_sync(jar)
            .or_else(|| self.session.read(mirror));
        if let Some(snap) = snap {
            self.injector.apply(target, &snap);
            debug!(account = %self.account, "first paint from cached tier");
        } else {
            debug!(account = %self.account, "no cached tier value; first paint asserts nothing");
        }
        self.phase = Phase::Reconciling;
        snap
    }

    /// Post-interactive reconciliation against the durable store. Every
    /// failure degrades: the painted value is never blanked by a store
    /// problem.
    pub fn reconcile(
        &mut self,
        store: &mut dyn DurableStore,
        jar: &mut dyn CookieJar,
        mirror: &mut dyn SessionMirror,
        target: &mut dyn StyleTarget,
    ) -> Resolution {
        self.phase = Phase::Reconciling;
        let outcome = self.reconcile_inner(store, jar, mirror, target);
        self.phase = Phase::Applied;
        outcome
    }

    fn reconcile_inner(
        &mut self,
        store: &mut dyn DurableStore,
        jar: &mut dyn CookieJar,
        mirror: &mut dyn SessionMirror,
        target: &mut dyn StyleTarget,
    ) -> Resolution {
        let pointer = match store.active_pointer(self.account) {
            Ok(pointer) => pointer,
            Err(err) => {
                warn!(account = %self.account, %err, "durable pointer read failed; keeping painted value");
                return Resolution::Degraded;
            }
        };

        // A pointer whose preset row is gone (deleted from another tab)
        // degrades to the same fallback chain as no pointer at all.
        let preset = match pointer {
            Some(pointer) => match store.preset(self.account, pointer.active) {
                Ok(Some(preset)) => Some(preset),
                Ok(None) => {
                    warn!(account = %self.account, preset = %pointer.active, "active pointer references a missing preset");
                    self.default_fallback(store)
                }
                Err(err) => {
                    warn!(account = %self.account, %err, "durable preset read failed; keeping painted value");
                    return Resolution::Degraded;
                }
            },
            None => self.default_fallback(store),
        };

        let Some(preset) = preset else {
            debug!(account = %self.account, "no active preset and no default; leaving colors unasserted");
            return Resolution::Unset;
        };

        let Some(resolved) = self.resolve_snapshot(store, &preset) else {
            return Resolution::Degraded;
        };

        if self.painted() != Some(resolved) {
            self.injector.apply(target, &resolved);
            self.channel.write(jar, &resolved);
            self.session.write(mirror, &resolved);
            debug!(account = %self.account, "durable value differed from paint; corrected and propagated");
            return Resolution::Corrected(resolved);
        }

        // Painted and durable agree, but the cookie itself may be missing
        // (session-sourced paint). Repair it so the next load is right.
        if self.channel.read_sync(jar) != Some(resolved) {
            self.channel.write(jar, &resolved);
            debug!(account = %self.account, "channel lagged agreed value; rewritten");
        }
        Resolution::Confirmed
    }

    /// First-visit fallback: a preset literally named "Default" (any case),
    /// promoted to active so this path runs at most once per account.
    fn default_fallback(&self, store: &mut dyn DurableStore) -> Option<ThemePreset> {
        let presets = match store.presets(self.account) {
            Ok(presets) => presets,
            Err(err) => {
                warn!(account = %self.account, %err, "preset list read failed during default fallback");
                return None;
            }
        };
        let preset = presets
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case("default"))?;
        if let Err(err) = store.set_active(ActiveThemePointer {
            account: self.account,
            active: preset.id,
        }) {
            // Promotion failing just means the fallback runs again next
            // load; the preset is still usable now.
            warn!(account = %self.account, %err, "failed to promote default preset to active");
        }
        Some(preset)
    }

    fn resolve_snapshot(
        &self,
        store: &dyn DurableStore,
        preset: &ThemePreset,
    ) -> Option<CascadeSnapshot> {
        let primary = match store.color(self.account, preset.primary) {
            Ok(Some(color)) => color,
            Ok(None) => {
                warn!(preset = %preset.id, color = %preset.primary, "primary color row missing; keeping painted value");
                return None;
            }
            Err(err) => {
                warn!(%err, "color read failed; keeping painted value");
                return None;
            }
        };
        let accent = match store.color(self.account, preset.accent) {
            Ok(accent) => accent,
            Err(err) => {
                warn!(%err, "accent color read failed; painting without accent");
                None
            }
        };
        Some(CascadeSnapshot::resolve(&primary, accent.as_ref()))
    }

    /// Switch the active preset: paint, persist, propagate — in that order.
    /// `snap` is the preset's resolved snapshot (the caller already holds
    /// the rows). A persist failure is returned as retryable; the paint
    /// stands either way.
    pub fn set_active(
        &mut self,
        store: &mut dyn DurableStore,
        jar: &mut dyn CookieJar,
        mirror: &mut dyn SessionMirror,
        target: &mut dyn StyleTarget,
        preset: PresetId,
        snap: CascadeSnapshot,
    ) -> Result<(), StoreError> {
        self.injector.apply(target, &snap);
        self.phase = Phase::Applied;

        store
            .set_active(ActiveThemePointer {
                account: self.account,
                active: preset,
            })
            .map_err(|err| {
                warn!(account = %self.account, %err, "active preset persist failed; optimistic paint kept");
                err
            })?;

        self.channel.write(jar, &snap);
        self.session.write(mirror, &snap);
        Ok(())
    }

    /// Persist an edited color row and repaint with it. Same ordering and
    /// failure contract as [`set_active`](Self::set_active).
    pub fn apply_color(
        &mut self,
        store: &mut dyn DurableStore,
        jar: &mut dyn CookieJar,
        mirror: &mut dyn SessionMirror,
        target: &mut dyn StyleTarget,
        color: &Color,
    ) -> Result<(), StoreError> {
        let accent = self.painted().and_then(|p| p.accent);
        let snap = CascadeSnapshot::new(color.hsl(), accent);
        self.injector.apply(target, &snap);
        self.phase = Phase::Applied;

        store.put_color(self.account, color.clone()).map_err(|err| {
            warn!(account = %self.account, color = %color.id(), %err, "color persist failed; optimistic paint kept");
            err
        })?;

        self.channel.write(jar, &snap);
        self.session.write(mirror, &snap);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromacast_core::{ColorId, FontDescriptor, Hsl, PresetOrigin};
    use chromacast_store::{MemoryJar, MemorySession, MemoryStore};

    use crate::inject::RecordingTarget;

    struct Fixture {
        store: MemoryStore,
        jar: MemoryJar,
        mirror: MemorySession,
        target: RecordingTarget,
        engine: ResolutionEngine,
    }

    fn fixture() -> Fixture {
        Fixture {
            store: MemoryStore::new(),
            jar: MemoryJar::new(),
            mirror: MemorySession::new(),
            target: RecordingTarget::new(),
            engine: ResolutionEngine::new(AccountId::new()),
        }
    }

    fn seed_active(f: &mut Fixture, hex: &str) -> (PresetId, CascadeSnapshot) {
        let account = f.engine.account();
        let primary = Color::from_hex(ColorId::new(), "primary", hex.parse().unwrap());
        let accent = Color::from_hex(ColorId::new(), "accent", "#222222".parse().unwrap());
        let preset = ThemePreset {
            id: PresetId::new(),
            name: "Brand".into(),
            primary: primary.id(),
            secondary: None,
            accent: accent.id(),
            font: FontDescriptor::default(),
            origin: PresetOrigin::Manual,
        };
        let snap = CascadeSnapshot::resolve(&primary, Some(&accent));
        f.store.put_color(account, primary).unwrap();
        f.store.put_color(account, accent).unwrap();
        f.store.put_preset(account, preset.clone()).unwrap();
        f.store
            .set_active(ActiveThemePointer {
                account,
                active: preset.id,
            })
            .unwrap();
        (preset.id, snap)
    }

    #[test]
    fn phases_advance_in_order() {
        let mut f = fixture();
        assert_eq!(f.engine.phase(), Phase::Init);
        f.engine.first_paint(&f.jar, &f.mirror, &mut f.target);
        assert_eq!(f.engine.phase(), Phase::Reconciling);
        f.engine
            .reconcile(&mut f.store, &mut f.jar, &mut f.mirror, &mut f.target);
        assert_eq!(f.engine.phase(), Phase::Applied);
    }

    #[test]
    fn empty_everything_resolves_to_unset() {
        let mut f = fixture();
        assert_eq!(f.engine.first_paint(&f.jar, &f.mirror, &mut f.target), None);
        let outcome =
            f.engine
                .reconcile(&mut f.store, &mut f.jar, &mut f.mirror, &mut f.target);
        assert_eq!(outcome, Resolution::Unset);
        assert_eq!(f.engine.painted(), None);
        assert!(f.target.fragments().is_empty());
    }

    #[test]
    fn durable_read_failure_keeps_painted_value() {
        let mut f = fixture();
        let snap = CascadeSnapshot::new(Hsl::new(210, 80, 45).unwrap(), None);
        EdgeCacheChannel::default().write(&mut f.jar, &snap);
        f.engine.first_paint(&f.jar, &f.mirror, &mut f.target);
        assert_eq!(f.engine.painted(), Some(snap));

        f.store.fail_reads(true);
        let outcome =
            f.engine
                .reconcile(&mut f.store, &mut f.jar, &mut f.mirror, &mut f.target);
        assert_eq!(outcome, Resolution::Degraded);
        assert_eq!(f.engine.painted(), Some(snap));
    }

    #[test]
    fn default_named_preset_is_promoted_once() {
        let mut f = fixture();
        let account = f.engine.account();
        let primary = Color::from_hex(ColorId::new(), "p", "#1773CF".parse().unwrap());
        let preset = ThemePreset {
            id: PresetId::new(),
            name: "default".into(),
            primary: primary.id(),
            secondary: None,
            accent: primary.id(),
            font: FontDescriptor::default(),
            origin: PresetOrigin::Manual,
        };
        f.store.put_color(account, primary).unwrap();
        f.store.put_preset(account, preset.clone()).unwrap();

        f.engine.first_paint(&f.jar, &f.mirror, &mut f.target);
        let outcome =
            f.engine
                .reconcile(&mut f.store, &mut f.jar, &mut f.mirror, &mut f.target);
        assert!(matches!(outcome, Resolution::Corrected(_)));
        assert_eq!(
            f.store.active_pointer(account).unwrap().unwrap().active,
            preset.id
        );
    }

    #[test]
    fn session_sourced_paint_repairs_the_channel() {
        let mut f = fixture();
        let (_, snap) = seed_active(&mut f, "#1773CF");
        // Cookie dropped; only the session mirror has the value.
        SessionChannel::default().write(&mut f.mirror, &snap);

        assert_eq!(
            f.engine.first_paint(&f.jar, &f.mirror, &mut f.target),
            Some(snap)
        );
        let outcome =
            f.engine
                .reconcile(&mut f.store, &mut f.jar, &mut f.mirror, &mut f.target);
        assert_eq!(outcome, Resolution::Confirmed);
        assert_eq!(EdgeCacheChannel::default().read_sync(&f.jar), Some(snap));
    }

    #[test]
    fn persist_failure_keeps_optimistic_paint() {
        let mut f = fixture();
        let (preset, snap) = seed_active(&mut f, "#1773CF");
        f.store.fail_writes(true);

        let err = f
            .engine
            .set_active(
                &mut f.store,
                &mut f.jar,
                &mut f.mirror,
                &mut f.target,
                preset,
                snap,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Write(_)));
        // Paint stands; propagation was skipped.
        assert_eq!(f.engine.painted(), Some(snap));
        assert_eq!(EdgeCacheChannel::default().read_sync(&f.jar), None);
    }

    #[test]
    fn apply_color_writes_through_all_tiers() {
        let mut f = fixture();
        let (_, _) = seed_active(&mut f, "#1773CF");
        f.engine.first_paint(&f.jar, &f.mirror, &mut f.target);
        f.engine
            .reconcile(&mut f.store, &mut f.jar, &mut f.mirror, &mut f.target);

        let mut edited = f
            .store
            .colors(f.engine.account())
            .unwrap()
            .into_iter()
            .find(|c| c.name() == "primary")
            .unwrap();
        edited.set_hsl(Hsl::new(0, 70, 50).unwrap());

        f.engine
            .apply_color(&mut f.store, &mut f.jar, &mut f.mirror, &mut f.target, &edited)
            .unwrap();

        let painted = f.engine.painted().unwrap();
        assert_eq!(painted.primary, Hsl::new(0, 70, 50).unwrap());
        assert_eq!(
            EdgeCacheChannel::default().read_sync(&f.jar).unwrap().primary,
            Hsl::new(0, 70, 50).unwrap()
        );
        assert_eq!(
            f.store
                .color(f.engine.account(), edited.id())
                .unwrap()
                .unwrap()
                .hsl(),
            Hsl::new(0, 70, 50).unwrap()
        );
    }
}
