//! Property-based invariant tests for the preset lifecycle manager.
//!
//! Verifies structural guarantees over arbitrary operation sequences:
//!
//! 1. No preset slot ever references a color id that does not exist
//! 2. No two color rows for one account ever share a hex
//! 3. Generated presets never persist with equal primary and accent hex
//! 4. Refused deletes leave the store untouched
//! 5. The active pointer never references a missing preset *slotlessly*
//!    (it may dangle to a deleted preset; resolution handles that, but the
//!    preset it names must then simply be absent, not half-written)

use chromacast_core::{AccountId, HexColor, PresetOrigin};
use chromacast_engine::{
    GeneratedPalette, PresetGenerator, PresetLifecycleManager, RecordingTarget, ResolutionEngine,
};
use chromacast_store::{DurableStore, MemoryJar, MemorySession, MemoryStore};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────

const PALETTE: [&str; 6] = [
    "#1773CF", "#D92626", "#22AA55", "#F5A623", "#7B2FBE", "#111111",
];

fn hex(idx: usize) -> HexColor {
    PALETTE[idx % PALETTE.len()].parse().unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Create { name: u8, primary: usize, accent: usize },
    Update { preset: usize, primary: usize, accent: usize },
    DeletePreset { preset: usize },
    DeleteColor { color: usize },
    Generate { primary: usize, accent: usize },
    Activate { preset: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, 0usize..6, 0usize..6)
            .prop_map(|(name, primary, accent)| Op::Create { name, primary, accent }),
        (0usize..4, 0usize..6, 0usize..6)
            .prop_map(|(preset, primary, accent)| Op::Update { preset, primary, accent }),
        (0usize..4).prop_map(|preset| Op::DeletePreset { preset }),
        (0usize..8).prop_map(|color| Op::DeleteColor { color }),
        (0usize..6, 0usize..6).prop_map(|(primary, accent)| Op::Generate { primary, accent }),
        (0usize..4).prop_map(|preset| Op::Activate { preset }),
    ]
}

struct IndexedGenerator {
    primary: HexColor,
    accent: HexColor,
}

impl PresetGenerator for IndexedGenerator {
    fn generate(&mut self, _hint: Option<&str>) -> Result<GeneratedPalette, String> {
        Ok(GeneratedPalette {
            name: "generated".into(),
            primary: self.primary,
            accent: self.accent,
        })
    }
}

fn check_invariants(store: &MemoryStore, account: AccountId) -> Result<(), TestCaseError> {
    let colors = store.colors(account).unwrap();
    let presets = store.presets(account).unwrap();

    // 1. no dangling slot
    for preset in &presets {
        for (slot, id) in preset.slots() {
            prop_assert!(
                colors.iter().any(|c| c.id() == id),
                "preset {:?} slot {slot:?} dangles to {id}",
                preset.name
            );
        }
    }

    // 2. hex dedupe
    for (i, a) in colors.iter().enumerate() {
        for b in &colors[i + 1..] {
            prop_assert_ne!(a.hex(), b.hex(), "two rows share hex {}", a.hex());
        }
    }

    // 3. generated presets stay non-degenerate
    for preset in &presets {
        if preset.origin == PresetOrigin::Generated {
            let primary = colors.iter().find(|c| c.id() == preset.primary).unwrap();
            let accent = colors.iter().find(|c| c.id() == preset.accent).unwrap();
            prop_assert_ne!(
                primary.hex(),
                accent.hex(),
                "generated preset {:?} is degenerate",
                preset.name
            );
        }
    }

    Ok(())
}

// ═════════════════════════════════════════════════════════════════════════
// Invariants hold across arbitrary op sequences
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn no_dangling_references_ever(ops in proptest::collection::vec(arb_op(), 1..40)) {
        let account = AccountId::new();
        let manager = PresetLifecycleManager::new(account);
        let mut store = MemoryStore::new();
        let mut cascade = ResolutionEngine::new(account);
        let mut jar = MemoryJar::new();
        let mut mirror = MemorySession::new();
        let mut target = RecordingTarget::new();

        for op in ops {
            // Refusals are expected and fine; what matters is that the
            // store is consistent after every single operation.
            match op {
                Op::Create { name, primary, accent } => {
                    let _ = manager.create_preset(
                        &mut store,
                        &format!("preset-{name}"),
                        hex(primary),
                        hex(accent),
                    );
                }
                Op::Update { preset, primary, accent } => {
                    let presets = store.presets(account).unwrap();
                    if let Some(target_preset) = presets.get(preset % presets.len().max(1)) {
                        let _ = manager.update_preset(
                            &mut store,
                            target_preset.id,
                            hex(primary),
                            hex(accent),
                        );
                    }
                }
                Op::DeletePreset { preset } => {
                    let presets = store.presets(account).unwrap();
                    if let Some(target_preset) = presets.get(preset % presets.len().max(1)) {
                        let _ = manager.delete_preset(&mut store, target_preset.id);
                    }
                }
                Op::DeleteColor { color } => {
                    let colors = store.colors(account).unwrap();
                    if let Some(target_color) = colors.get(color % colors.len().max(1)) {
                        let _ = manager.delete_color(
                            &mut store,
                            &mut cascade,
                            &mut jar,
                            &mut mirror,
                            &mut target,
                            target_color.id(),
                        );
                    }
                }
                Op::Generate { primary, accent } => {
                    let mut generator = IndexedGenerator {
                        primary: hex(primary),
                        accent: hex(accent),
                    };
                    let _ = manager.generate_preset(&mut store, &mut generator, None);
                }
                Op::Activate { preset } => {
                    let presets = store.presets(account).unwrap();
                    if let Some(target_preset) = presets.get(preset % presets.len().max(1)) {
                        let snap = manager.resolve_snapshot(&store, target_preset).unwrap();
                        let _ = cascade.set_active(
                            &mut store,
                            &mut jar,
                            &mut mirror,
                            &mut target,
                            target_preset.id,
                            snap,
                        );
                    }
                }
            }
            check_invariants(&store, account)?;
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. refused deletes leave the store untouched
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn refused_delete_changes_nothing(primary in 0usize..6) {
        let account = AccountId::new();
        let manager = PresetLifecycleManager::new(account);
        let mut store = MemoryStore::new();
        let mut cascade = ResolutionEngine::new(account);
        let mut jar = MemoryJar::new();
        let mut mirror = MemorySession::new();
        let mut target = RecordingTarget::new();

        // Single color in both slots: deletion must be refused.
        let preset = manager
            .create_preset(&mut store, "solo", hex(primary), hex(primary))
            .unwrap();
        let colors_before = store.colors(account).unwrap();
        let presets_before = store.presets(account).unwrap();

        let result = manager.delete_color(
            &mut store,
            &mut cascade,
            &mut jar,
            &mut mirror,
            &mut target,
            preset.primary,
        );
        prop_assert!(result.is_err());
        prop_assert_eq!(store.colors(account).unwrap(), colors_before);
        prop_assert_eq!(store.presets(account).unwrap(), presets_before);
    }
}
