//! Runtime values and the declared types of script variables.

#![allow(missing_docs)]

mod ops;

pub use ops::{apply_binary, apply_unary, expect_bool};

use std::fmt;

use serde::Serialize;
use smol_str::SmolStr;

use crate::error::RuntimeError;

/// A scalar value held by a script variable, a register or an MMS attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// No simulated value (unknown data attribute).
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(SmolStr),
}

impl Value {
    /// Name of the value's kind, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::Int(_) => "integer",
            Value::Real(_) => "REAL",
            Value::String(_) => "STRING",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value (booleans count as 0/1).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(v) => Some(f64::from(u8::from(*v))),
            Value::Int(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Null | Value::String(_) => None,
        }
    }

    /// Integer view of the value; reals are truncated toward zero.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(*v),
            Value::Real(v) if v.is_finite() => Some(v.trunc() as i64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(SmolStr::new(value))
    }
}

/// Width and signedness of an integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntType {
    pub bits: u32,
    pub signed: bool,
}

impl IntType {
    /// Wraps `value` into this type's range (two's complement).
    #[must_use]
    pub fn wrap(self, value: i64) -> i64 {
        if self.bits >= 64 {
            return value;
        }
        let mask = (1_i64 << self.bits) - 1;
        let raw = value & mask;
        if self.signed && raw >> (self.bits - 1) == 1 {
            raw - (1_i64 << self.bits)
        } else {
            raw
        }
    }
}

/// Declared type of a script variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Int(IntType),
    Real,
    String,
    /// Milliseconds.
    Time,
}

impl DataType {
    /// Resolves an elementary type name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let int = |bits, signed| Some(DataType::Int(IntType { bits, signed }));
        match name.to_ascii_uppercase().as_str() {
            "BOOL" => Some(DataType::Bool),
            "SINT" => int(8, true),
            "INT" => int(16, true),
            "DINT" => int(32, true),
            "LINT" => int(64, true),
            "USINT" | "BYTE" => int(8, false),
            "UINT" | "WORD" => int(16, false),
            "UDINT" | "DWORD" => int(32, false),
            "ULINT" | "LWORD" => int(64, false),
            "REAL" | "LREAL" => Some(DataType::Real),
            "STRING" => Some(DataType::String),
            "TIME" => Some(DataType::Time),
            _ => None,
        }
    }

    /// Initial value of a variable declared without an initializer.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            DataType::Bool => Value::Bool(false),
            DataType::Int(_) | DataType::Time => Value::Int(0),
            DataType::Real => Value::Real(0.0),
            DataType::String => Value::String(SmolStr::default()),
        }
    }

    /// Converts `value` for storage in a variable of this type.
    ///
    /// Reals assigned to integers are rounded; integers wrap to the declared
    /// width.
    pub fn coerce(self, value: Value) -> Result<Value, RuntimeError> {
        let mismatch = |value: &Value| {
            RuntimeError::TypeMismatch(SmolStr::new(format!(
                "cannot store {} in {}",
                value.kind_name(),
                self.name()
            )))
        };
        match (self, value) {
            (_, Value::Null) => Err(RuntimeError::NullValue("assignment".into())),
            (DataType::Bool, Value::Bool(v)) => Ok(Value::Bool(v)),
            (DataType::Bool, Value::Int(v)) => Ok(Value::Bool(v != 0)),
            (DataType::Int(ty), Value::Int(v)) => Ok(Value::Int(ty.wrap(v))),
            (DataType::Int(_), Value::Bool(v)) => Ok(Value::Int(i64::from(v))),
            (DataType::Int(ty), Value::Real(v)) => Ok(Value::Int(ty.wrap(round_to_i64(v)?))),
            (DataType::Real, Value::Real(v)) => Ok(Value::Real(v)),
            (DataType::Real, Value::Int(v)) => Ok(Value::Real(v as f64)),
            (DataType::String, Value::String(v)) => Ok(Value::String(v)),
            (DataType::Time, Value::Int(v)) => Ok(Value::Int(v)),
            (DataType::Time, Value::Real(v)) => Ok(Value::Int(round_to_i64(v)?)),
            (_, value) => Err(mismatch(&value)),
        }
    }

    /// Canonical type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Int(IntType { bits: 8, signed: true }) => "SINT",
            DataType::Int(IntType { bits: 16, signed: true }) => "INT",
            DataType::Int(IntType { bits: 32, signed: true }) => "DINT",
            DataType::Int(IntType { signed: true, .. }) => "LINT",
            DataType::Int(IntType { bits: 8, .. }) => "USINT",
            DataType::Int(IntType { bits: 16, .. }) => "UINT",
            DataType::Int(IntType { bits: 32, .. }) => "UDINT",
            DataType::Int(_) => "ULINT",
            DataType::Real => "REAL",
            DataType::String => "STRING",
            DataType::Time => "TIME",
        }
    }
}

/// Rounds half away from zero, faulting on values outside the `i64` range.
pub(crate) fn round_to_i64(value: f64) -> Result<i64, RuntimeError> {
    let rounded = value.round();
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Ok(rounded as i64)
    } else {
        Err(RuntimeError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_types_wrap() {
        let int = IntType {
            bits: 16,
            signed: true,
        };
        let word = IntType {
            bits: 16,
            signed: false,
        };
        assert_eq!(int.wrap(40_000), 40_000 - 65_536);
        assert_eq!(int.wrap(-1), -1);
        assert_eq!(word.wrap(-1), 65_535);
        assert_eq!(word.wrap(65_536 + 7), 7);
    }

    #[test]
    fn coercion_rounds_reals_into_integers() {
        let int = DataType::from_name("int").unwrap();
        assert_eq!(int.coerce(Value::Real(2.5)), Ok(Value::Int(3)));
        assert_eq!(int.coerce(Value::Real(-2.5)), Ok(Value::Int(-3)));
        assert_eq!(DataType::Real.coerce(Value::Int(7)), Ok(Value::Real(7.0)));
        assert!(matches!(
            DataType::Bool.coerce(Value::Null),
            Err(RuntimeError::NullValue(_))
        ));
        assert!(matches!(
            DataType::String.coerce(Value::Int(1)),
            Err(RuntimeError::TypeMismatch(_))
        ));
    }

    #[test]
    fn type_names_round_trip() {
        for name in ["BOOL", "SINT", "INT", "DINT", "LINT", "UINT", "REAL", "STRING", "TIME"] {
            assert_eq!(DataType::from_name(name).map(DataType::name), Some(name));
        }
        assert_eq!(DataType::from_name("WORD").map(DataType::name), Some("UINT"));
        assert_eq!(DataType::from_name("FB_Timer"), None);
    }

    #[test]
    fn display_matches_log_formatting() {
        assert_eq!(Value::Real(11.0).to_string(), "11");
        assert_eq!(Value::Real(0.25).to_string(), "0.25");
        assert_eq!(Value::Bool(true).to_string(), "TRUE");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
