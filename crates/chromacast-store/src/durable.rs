#![forbid(unsafe_code)]

//! The durable tier: final arbiter of which preset is active.
//!
//! [`DurableStore`] is a trait seam; the host backs it with its real
//! database. Everything above this seam assumes only keyed CRUD plus the
//! single active-pointer row per account. All methods are fallible and the
//! engine treats every failure as recoverable: reads degrade to the last
//! painted value, writes surface as retryable.
//!
//! [`MemoryStore`] is the reference implementation. It carries read/write
//! failure injection switches so the degradation paths stay tested.

use ahash::AHashMap;
use chrono::{DateTime, Utc};

use chromacast_core::{
    AccountId, ActiveThemePointer, Color, ColorId, PresetId, StoreError, ThemePreset,
};

/// Keyed read/write of the cascade's rows. One implementor per backing
/// database; no method may be called on the critical render path.
pub trait DurableStore {
    fn color(&self, account: AccountId, id: ColorId) -> Result<Option<Color>, StoreError>;

    /// All colors owned by `account`, in unspecified order.
    fn colors(&self, account: AccountId) -> Result<Vec<Color>, StoreError>;

    /// Insert or overwrite a color row.
    fn put_color(&mut self, account: AccountId, color: Color) -> Result<(), StoreError>;

    /// Remove a color row. Referential integrity is the lifecycle manager's
    /// job, not the store's.
    fn remove_color(&mut self, account: AccountId, id: ColorId) -> Result<(), StoreError>;

    fn preset(&self, account: AccountId, id: PresetId) -> Result<Option<ThemePreset>, StoreError>;

    fn presets(&self, account: AccountId) -> Result<Vec<ThemePreset>, StoreError>;

    fn put_preset(&mut self, account: AccountId, preset: ThemePreset) -> Result<(), StoreError>;

    fn remove_preset(&mut self, account: AccountId, id: PresetId) -> Result<(), StoreError>;

    /// The account's active-pointer row, if one was ever created.
    fn active_pointer(&self, account: AccountId) -> Result<Option<ActiveThemePointer>, StoreError>;

    /// Create or rewrite the active-pointer row.
    fn set_active(&mut self, pointer: ActiveThemePointer) -> Result<(), StoreError>;
}

/// "List items newer than X" query for a live collection's initial load.
/// Implemented by whatever owns the collection's rows; `T` is the row type.
pub trait LiveQuery<T> {
    fn items_newer_than(
        &self,
        account: AccountId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<T>, StoreError>;
}

/// In-memory [`DurableStore`] for tests and backendless hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    colors: AHashMap<(AccountId, ColorId), Color>,
    presets: AHashMap<(AccountId, PresetId), ThemePreset>,
    pointers: AHashMap<AccountId, ActiveThemePointer>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail, to exercise the degrade-to-painted
    /// paths.
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make every subsequent write fail, to exercise the retryable-error
    /// paths.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn read_gate(&self) -> Result<(), StoreError> {
        if self.fail_reads {
            Err(StoreError::Read("injected read failure".into()))
        } else {
            Ok(())
        }
    }

    fn write_gate(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            Err(StoreError::Write("injected write failure".into()))
        } else {
            Ok(())
        }
    }
}

impl DurableStore for MemoryStore {
    fn color(&self, account: AccountId, id: ColorId) -> Result<Option<Color>, StoreError> {
        self.read_gate()?;
        Ok(self.colors.get(&(account, id)).cloned())
    }

    fn colors(&self, account: AccountId) -> Result<Vec<Color>, StoreError> {
        self.read_gate()?;
        let mut rows: Vec<Color> = self
            .colors
            .iter()
            .filter(|((a, _), _)| *a == account)
            .map(|(_, c)| c.clone())
            .collect();
        rows.sort_by_key(Color::id);
        Ok(rows)
    }

    fn put_color(&mut self, account: AccountId, color: Color) -> Result<(), StoreError> {
        self.write_gate()?;
        self.colors.insert((account, color.id()), color);
        Ok(())
    }

    fn remove_color(&mut self, account: AccountId, id: ColorId) -> Result<(), StoreError> {
        self.write_gate()?;
        self.colors.remove(&(account, id));
        Ok(())
    }

    fn preset(&self, account: AccountId, id: PresetId) -> Result<Option<ThemePreset>, StoreError> {
        self.read_gate()?;
        Ok(self.presets.get(&(account, id)).cloned())
    }

    fn presets(&self, account: AccountId) -> Result<Vec<ThemePreset>, StoreError> {
        self.read_gate()?;
        let mut rows: Vec<ThemePreset> = self
            .presets
            .iter()
            .filter(|((a, _), _)| *a == account)
            .map(|(_, p)| p.clone())
            .collect();
        rows.sort_by_key(|p| p.id);
        Ok(rows)
    }

    fn put_preset(&mut self, account: AccountId, preset: ThemePreset) -> Result<(), StoreError> {
        self.write_gate()?;
        self.presets.insert((account, preset.id), preset);
        Ok(())
    }

    fn remove_preset(&mut self, account: AccountId, id: PresetId) -> Result<(), StoreError> {
        self.write_gate()?;
        self.presets.remove(&(account, id));
        Ok(())
    }

    fn active_pointer(&self, account: AccountId) -> Result<Option<ActiveThemePointer>, StoreError> {
        self.read_gate()?;
        Ok(self.pointers.get(&account).copied())
    }

    fn set_active(&mut self, pointer: ActiveThemePointer) -> Result<(), StoreError> {
        self.write_gate()?;
        self.pointers.insert(pointer.account, pointer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromacast_core::{FontDescriptor, HexColor, PresetOrigin};

    fn color(name: &str, hex: &str) -> Color {
        Color::from_hex(ColorId::new(), name, hex.parse::<HexColor>().unwrap())
    }

    #[test]
    fn rows_are_scoped_to_their_account() {
        let mut store = MemoryStore::new();
        let (a, b) = (AccountId::new(), AccountId::new());
        let row = color("brand", "#1773CF");
        store.put_color(a, row.clone()).unwrap();

        assert_eq!(store.colors(a).unwrap().len(), 1);
        assert!(store.colors(b).unwrap().is_empty());
        assert_eq!(store.color(b, row.id()).unwrap(), None);
    }

    #[test]
    fn pointer_is_one_row_per_account() {
        let mut store = MemoryStore::new();
        let account = AccountId::new();
        let (p1, p2) = (PresetId::new(), PresetId::new());

        assert_eq!(store.active_pointer(account).unwrap(), None);
        store
            .set_active(ActiveThemePointer {
                account,
                active: p1,
            })
            .unwrap();
        store
            .set_active(ActiveThemePointer {
                account,
                active: p2,
            })
            .unwrap();
        assert_eq!(store.active_pointer(account).unwrap().unwrap().active, p2);
    }

    #[test]
    fn injected_failures_surface_as_store_errors() {
        let mut store = MemoryStore::new();
        let account = AccountId::new();
        store.fail_reads(true);
        assert!(matches!(store.colors(account), Err(StoreError::Read(_))));
        store.fail_reads(false);
        store.fail_writes(true);
        assert!(matches!(
            store.put_color(account, color("x", "#000000")),
            Err(StoreError::Write(_))
        ));
    }

    #[test]
    fn remove_of_absent_rows_is_a_no_op() {
        let mut store = MemoryStore::new();
        let account = AccountId::new();
        store.remove_color(account, ColorId::new()).unwrap();
        store.remove_preset(account, PresetId::new()).unwrap();
    }

    #[test]
    fn preset_round_trip() {
        let mut store = MemoryStore::new();
        let account = AccountId::new();
        let primary = color("p", "#FF0000");
        let accent = color("a", "#0000FF");
        let preset = ThemePreset {
            id: PresetId::new(),
            name: "Default".into(),
            primary: primary.id(),
            secondary: None,
            accent: accent.id(),
            font: FontDescriptor::default(),
            origin: PresetOrigin::Manual,
        };
        store.put_preset(account, preset.clone()).unwrap();
        assert_eq!(store.preset(account, preset.id).unwrap(), Some(preset));
    }
}
