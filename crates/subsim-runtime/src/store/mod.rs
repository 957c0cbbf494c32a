//! The protocol data store: per-device Modbus register banks and the global
//! MMS attribute map.
//!
//! The store itself is plain data. The [`Engine`](crate::Engine) wraps every
//! mutation with logging, traffic publication and GOOSE change detection.

#![allow(missing_docs)]

mod mms;
mod registers;

pub use mms::{is_sampled_value_path, MmsStore};
pub use registers::{RegisterBank, RegisterType, RegisterValue};

use indexmap::IndexMap;
use smol_str::SmolStr;

/// All live protocol values of one engine.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    banks: IndexMap<SmolStr, RegisterBank>,
    active: Option<SmolStr>,
    mms: MmsStore,
}

impl DataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a device's bank wholesale and focuses that device.
    pub fn load_profile(&mut self, device: &str, bank: RegisterBank) {
        self.banks.insert(SmolStr::new(device), bank);
        self.active = Some(SmolStr::new(device));
    }

    /// Focuses an existing bank; returns `false` for unknown devices.
    pub fn focus(&mut self, device: &str) -> bool {
        if self.banks.contains_key(device) {
            self.active = Some(SmolStr::new(device));
            true
        } else {
            false
        }
    }

    /// Device whose bank the un-keyed accessors act on.
    #[must_use]
    pub fn active_device(&self) -> Option<&SmolStr> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn bank(&self, device: &str) -> Option<&RegisterBank> {
        self.banks.get(device)
    }

    /// The device's bank, created empty on first use.
    pub fn bank_mut(&mut self, device: &str) -> &mut RegisterBank {
        self.banks.entry(SmolStr::new(device)).or_default()
    }

    #[must_use]
    pub fn has_bank(&self, device: &str) -> bool {
        self.banks.contains_key(device)
    }

    /// Drops a device's bank, clearing focus if it was active.
    pub fn remove_bank(&mut self, device: &str) -> Option<RegisterBank> {
        if self.active.as_deref() == Some(device) {
            self.active = None;
        }
        self.banks.shift_remove(device)
    }

    #[must_use]
    pub fn read_register(&self, device: &str, kind: RegisterType, address: u16) -> Option<RegisterValue> {
        self.banks.get(device)?.get(kind, address)
    }

    pub fn mms(&self) -> &MmsStore {
        &self.mms
    }

    pub fn mms_mut(&mut self) -> &mut MmsStore {
        &mut self.mms
    }

    /// Device ids with a register bank, in registration order.
    pub fn devices(&self) -> impl Iterator<Item = &SmolStr> {
        self.banks.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_profile_replaces_and_focuses() {
        let mut store = DataStore::new();
        store.load_profile(
            "gen1",
            RegisterBank::new().with(RegisterType::HoldingRegister, 1, 5_u16),
        );
        store.load_profile(
            "gen2",
            RegisterBank::new().with(RegisterType::HoldingRegister, 1, 6_u16),
        );
        assert_eq!(store.active_device().map(SmolStr::as_str), Some("gen2"));
        store.load_profile("gen1", RegisterBank::new());
        assert_eq!(store.read_register("gen1", RegisterType::HoldingRegister, 1), None);
        assert_eq!(
            store.read_register("gen2", RegisterType::HoldingRegister, 1),
            Some(RegisterValue::Word(6))
        );
    }

    #[test]
    fn removing_active_bank_clears_focus() {
        let mut store = DataStore::new();
        store.load_profile("gen1", RegisterBank::new());
        assert!(!store.focus("nope"));
        store.remove_bank("gen1");
        assert_eq!(store.active_device(), None);
    }
}
