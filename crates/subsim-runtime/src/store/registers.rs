//! Modbus register banks.

#![allow(missing_docs)]

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The four Modbus data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterType {
    /// Read/write bit.
    Coil,
    /// Read-only bit (to Modbus masters).
    #[serde(rename = "discrete")]
    DiscreteInput,
    /// Read-only word (to Modbus masters).
    #[serde(rename = "input")]
    InputRegister,
    /// Read/write word.
    #[serde(rename = "holding")]
    HoldingRegister,
}

impl RegisterType {
    /// Parses the configuration/wire spelling.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "coil" => Some(Self::Coil),
            "discrete" | "discrete_input" => Some(Self::DiscreteInput),
            "input" | "input_register" => Some(Self::InputRegister),
            "holding" | "holding_register" => Some(Self::HoldingRegister),
            _ => None,
        }
    }

    /// Coils and discrete inputs hold bits; the others hold words.
    #[must_use]
    pub fn is_bit(self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    /// Short prefix used in log messages.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Coil => "CO",
            Self::DiscreteInput => "DI",
            Self::InputRegister => "IR",
            Self::HoldingRegister => "HR",
        }
    }
}

/// A register value: a bit for coils/discrete inputs, a 16-bit word otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    /// Coil or discrete input state.
    Bit(bool),
    /// Input or holding register content.
    Word(u16),
}

impl RegisterValue {
    /// Converts to the representation `kind` stores.
    #[must_use]
    pub fn normalize(self, kind: RegisterType) -> Self {
        match (kind.is_bit(), self) {
            (true, Self::Word(word)) => Self::Bit(word != 0),
            (false, Self::Bit(bit)) => Self::Word(u16::from(bit)),
            (_, value) => value,
        }
    }

    /// Wraps any integer into a 16-bit word (two's complement).
    #[must_use]
    pub fn word_from_i64(value: i64) -> Self {
        Self::Word(value as u16)
    }

    #[must_use]
    pub fn as_bool(self) -> bool {
        match self {
            Self::Bit(bit) => bit,
            Self::Word(word) => word != 0,
        }
    }

    #[must_use]
    pub fn as_word(self) -> u16 {
        match self {
            Self::Bit(bit) => u16::from(bit),
            Self::Word(word) => word,
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit(bit) => write!(f, "{}", if *bit { "TRUE" } else { "FALSE" }),
            Self::Word(word) => write!(f, "{word}"),
        }
    }
}

impl From<bool> for RegisterValue {
    fn from(value: bool) -> Self {
        Self::Bit(value)
    }
}

impl From<u16> for RegisterValue {
    fn from(value: u16) -> Self {
        Self::Word(value)
    }
}

/// Register tables of one simulated Modbus server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterBank {
    coils: FxHashMap<u16, bool>,
    discrete_inputs: FxHashMap<u16, bool>,
    input_registers: FxHashMap<u16, u16>,
    holding_registers: FxHashMap<u16, u16>,
}

impl RegisterBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding, used for profiles.
    #[must_use]
    pub fn with(mut self, kind: RegisterType, address: u16, value: impl Into<RegisterValue>) -> Self {
        self.set(kind, address, value.into());
        self
    }

    /// Returns `None` for addresses that hold no simulated value yet.
    #[must_use]
    pub fn get(&self, kind: RegisterType, address: u16) -> Option<RegisterValue> {
        match kind {
            RegisterType::Coil => self.coils.get(&address).copied().map(RegisterValue::Bit),
            RegisterType::DiscreteInput => self
                .discrete_inputs
                .get(&address)
                .copied()
                .map(RegisterValue::Bit),
            RegisterType::InputRegister => self
                .input_registers
                .get(&address)
                .copied()
                .map(RegisterValue::Word),
            RegisterType::HoldingRegister => self
                .holding_registers
                .get(&address)
                .copied()
                .map(RegisterValue::Word),
        }
    }

    /// Stores a value and returns the previous one.
    pub fn set(
        &mut self,
        kind: RegisterType,
        address: u16,
        value: RegisterValue,
    ) -> Option<RegisterValue> {
        let value = value.normalize(kind);
        match kind {
            RegisterType::Coil => self
                .coils
                .insert(address, value.as_bool())
                .map(RegisterValue::Bit),
            RegisterType::DiscreteInput => self
                .discrete_inputs
                .insert(address, value.as_bool())
                .map(RegisterValue::Bit),
            RegisterType::InputRegister => self
                .input_registers
                .insert(address, value.as_word())
                .map(RegisterValue::Word),
            RegisterType::HoldingRegister => self
                .holding_registers
                .insert(address, value.as_word())
                .map(RegisterValue::Word),
        }
    }

    /// Number of populated addresses across all tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coils.len()
            + self.discrete_inputs.len()
            + self.input_registers.len()
            + self.holding_registers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All populated entries, sorted by table and address.
    #[must_use]
    pub fn entries(&self) -> Vec<(RegisterType, u16, RegisterValue)> {
        let mut entries: Vec<_> = self
            .coils
            .iter()
            .map(|(addr, v)| (RegisterType::Coil, *addr, RegisterValue::Bit(*v)))
            .chain(
                self.discrete_inputs
                    .iter()
                    .map(|(addr, v)| (RegisterType::DiscreteInput, *addr, RegisterValue::Bit(*v))),
            )
            .chain(
                self.input_registers
                    .iter()
                    .map(|(addr, v)| (RegisterType::InputRegister, *addr, RegisterValue::Word(*v))),
            )
            .chain(self.holding_registers.iter().map(|(addr, v)| {
                (RegisterType::HoldingRegister, *addr, RegisterValue::Word(*v))
            }))
            .collect();
        entries.sort_by_key(|(kind, addr, _)| (*kind, *addr));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_normalized_per_table() {
        let mut bank = RegisterBank::new();
        bank.set(RegisterType::Coil, 1, RegisterValue::Word(5));
        bank.set(RegisterType::HoldingRegister, 1, RegisterValue::Bit(true));
        assert_eq!(bank.get(RegisterType::Coil, 1), Some(RegisterValue::Bit(true)));
        assert_eq!(
            bank.get(RegisterType::HoldingRegister, 1),
            Some(RegisterValue::Word(1))
        );
        assert_eq!(bank.get(RegisterType::InputRegister, 1), None);
    }

    #[test]
    fn set_returns_previous_value() {
        let mut bank = RegisterBank::new().with(RegisterType::HoldingRegister, 7, 10_u16);
        assert_eq!(
            bank.set(RegisterType::HoldingRegister, 7, RegisterValue::Word(11)),
            Some(RegisterValue::Word(10))
        );
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn words_wrap_to_sixteen_bits() {
        assert_eq!(RegisterValue::word_from_i64(-1), RegisterValue::Word(65_535));
        assert_eq!(RegisterValue::word_from_i64(65_537), RegisterValue::Word(1));
    }

    #[test]
    fn entries_are_sorted() {
        let bank = RegisterBank::new()
            .with(RegisterType::HoldingRegister, 3, 1_u16)
            .with(RegisterType::Coil, 9, true)
            .with(RegisterType::HoldingRegister, 1, 2_u16);
        let keys: Vec<_> = bank.entries().into_iter().map(|(k, a, _)| (k, a)).collect();
        assert_eq!(
            keys,
            vec![
                (RegisterType::Coil, 9),
                (RegisterType::HoldingRegister, 1),
                (RegisterType::HoldingRegister, 3),
            ]
        );
    }
}
