//! IEC 61850 data attribute store.
//!
//! Paths are globally namespaced (`IED1LD0/XCBR1.Pos.stVal`), case-sensitive
//! and never renamed. Each path may be owned by the device that registered
//! it, which is how packets and cleanup are attributed.

#![allow(missing_docs)]

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::value::Value;

/// Logical nodes whose attributes travel as sampled values.
const SAMPLED_VALUE_NODES: [&str; 4] = ["MMXU", "MMXN", "TCTR", "TVTR"];

/// Path to value map with per-path ownership.
#[derive(Debug, Clone, Default)]
pub struct MmsStore {
    values: IndexMap<SmolStr, Value>,
    owners: IndexMap<SmolStr, SmolStr>,
}

impl MmsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn read(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }

    /// Stores a value and returns the previous one.
    pub fn write(&mut self, path: &str, value: Value) -> Option<Value> {
        match self.values.get_mut(path) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.values.insert(SmolStr::new(path), value);
                None
            }
        }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    /// Records `device` as owner of `path` unless another device already owns it.
    pub fn claim(&mut self, path: &str, device: &str) {
        if !self.owners.contains_key(path) {
            self.owners.insert(SmolStr::new(path), SmolStr::new(device));
        }
    }

    #[must_use]
    pub fn owner(&self, path: &str) -> Option<&SmolStr> {
        self.owners.get(path)
    }

    /// Device a packet about `path` is attributed to: the owner, else the
    /// logical device prefix before the first `/`.
    #[must_use]
    pub fn source_device(&self, path: &str) -> SmolStr {
        if let Some(owner) = self.owners.get(path) {
            return owner.clone();
        }
        SmolStr::new(path.split('/').next().unwrap_or(path))
    }

    /// Removes every path owned by `device`; returns how many were removed.
    pub fn remove_owned(&mut self, device: &str) -> usize {
        let owned: Vec<SmolStr> = self
            .owners
            .iter()
            .filter(|(_, owner)| owner.as_str() == device)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &owned {
            self.owners.shift_remove(path);
            self.values.shift_remove(path);
        }
        owned.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &SmolStr> {
        self.values.keys()
    }
}

/// `true` if `path` addresses a measurement or instrument transformer node.
#[must_use]
pub fn is_sampled_value_path(path: &str) -> bool {
    SAMPLED_VALUE_NODES.iter().any(|node| path.contains(node))
}
