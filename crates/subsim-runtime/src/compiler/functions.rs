//! Built-in functions and the `Device.*` call surface.

#![allow(missing_docs)]

use smol_str::SmolStr;

use crate::error::RuntimeError;
use crate::store::RegisterType;
use crate::value::{round_to_i64, Value};

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    #[must_use]
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exact(n) => count == n,
            Self::AtLeast(n) => count >= n,
        }
    }

    pub(crate) fn describe(self) -> SmolStr {
        match self {
            Self::Exact(n) => SmolStr::new(n.to_string()),
            Self::AtLeast(n) => SmolStr::new(format!("at least {n}")),
        }
    }
}

/// Pure numeric functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sqrt,
    Abs,
    Trunc,
    ToInt,
    ToReal,
    Min,
    Max,
    Limit,
    Shl,
    Shr,
}

impl Builtin {
    /// Case-insensitive lookup, including conversion aliases.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        let builtin = match name.to_ascii_uppercase().as_str() {
            "SQRT" => Self::Sqrt,
            "ABS" => Self::Abs,
            "TRUNC" => Self::Trunc,
            "TO_INT" | "REAL_TO_INT" | "LREAL_TO_INT" | "REAL_TO_DINT" => Self::ToInt,
            "TO_REAL" | "INT_TO_REAL" | "DINT_TO_REAL" | "UINT_TO_REAL" | "WORD_TO_REAL" => {
                Self::ToReal
            }
            "MIN" => Self::Min,
            "MAX" => Self::Max,
            "LIMIT" => Self::Limit,
            "SHL" => Self::Shl,
            "SHR" => Self::Shr,
            _ => return None,
        };
        Some(builtin)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sqrt => "SQRT",
            Self::Abs => "ABS",
            Self::Trunc => "TRUNC",
            Self::ToInt => "TO_INT",
            Self::ToReal => "TO_REAL",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Limit => "LIMIT",
            Self::Shl => "SHL",
            Self::Shr => "SHR",
        }
    }

    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Self::Sqrt | Self::Abs | Self::Trunc | Self::ToInt | Self::ToReal => Arity::Exact(1),
            Self::Min | Self::Max => Arity::AtLeast(2),
            Self::Limit => Arity::Exact(3),
            Self::Shl | Self::Shr => Arity::Exact(2),
        }
    }

    pub fn call(self, args: &[Value]) -> Result<Value, RuntimeError> {
        if args.iter().any(Value::is_null) {
            return Err(RuntimeError::NullValue(self.name().into()));
        }
        match self {
            Self::Sqrt => {
                let x = self.real(&args[0])?;
                if x < 0.0 {
                    return Err(self.invalid("negative operand"));
                }
                Ok(Value::Real(x.sqrt()))
            }
            Self::Abs => match &args[0] {
                Value::Int(v) => v.checked_abs().map(Value::Int).ok_or(RuntimeError::Overflow),
                other => Ok(Value::Real(self.real(other)?.abs())),
            },
            Self::Trunc => match &args[0] {
                Value::Int(v) => Ok(Value::Int(*v)),
                other => {
                    let x = self.real(other)?;
                    round_to_i64(x.trunc()).map(Value::Int)
                }
            },
            Self::ToInt => match &args[0] {
                Value::Int(v) => Ok(Value::Int(*v)),
                Value::Bool(v) => Ok(Value::Int(i64::from(*v))),
                other => round_to_i64(self.real(other)?).map(Value::Int),
            },
            Self::ToReal => Ok(Value::Real(self.real(&args[0])?)),
            Self::Min | Self::Max => {
                let mut best = args[0].clone();
                for candidate in &args[1..] {
                    let (a, b) = (self.real(&best)?, self.real(candidate)?);
                    let replace = if self == Self::Min { b < a } else { b > a };
                    if replace {
                        best = candidate.clone();
                    }
                }
                Ok(best)
            }
            Self::Limit => {
                let (low, value, high) = (&args[0], &args[1], &args[2]);
                let x = self.real(value)?;
                if x < self.real(low)? {
                    Ok(low.clone())
                } else if x > self.real(high)? {
                    Ok(high.clone())
                } else {
                    Ok(value.clone())
                }
            }
            Self::Shl | Self::Shr => {
                let (Value::Int(value), Value::Int(count)) = (&args[0], &args[1]) else {
                    return Err(self.invalid("expects integer operands"));
                };
                let count = u32::try_from(*count)
                    .ok()
                    .filter(|count| *count < 64)
                    .ok_or_else(|| self.invalid("shift count out of range"))?;
                Ok(Value::Int(if self == Self::Shl {
                    value << count
                } else {
                    value >> count
                }))
            }
        }
    }

    fn real(self, value: &Value) -> Result<f64, RuntimeError> {
        match value {
            Value::Int(_) | Value::Real(_) => value.as_f64().ok_or_else(|| self.invalid("not a number")),
            other => Err(RuntimeError::TypeMismatch(SmolStr::new(format!(
                "{} expects a number, got {}",
                self.name(),
                other.kind_name()
            )))),
        }
    }

    fn invalid(self, reason: &str) -> RuntimeError {
        RuntimeError::InvalidArgument {
            function: self.name().into(),
            reason: reason.into(),
        }
    }
}

/// Calls a program makes against its own device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    ReadInput,
    ReadRegister,
    ReadCoil,
    ReadDiscreteInput,
    WriteRegister,
    WriteCoil,
    SetDa,
    GetDa,
    Log,
}

impl DeviceCall {
    /// Case-insensitive lookup of the member name after `Device.`.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        let call = match name.to_ascii_lowercase().as_str() {
            "readinput" => Self::ReadInput,
            "readregister" => Self::ReadRegister,
            "readcoil" => Self::ReadCoil,
            "readdiscreteinput" => Self::ReadDiscreteInput,
            "writeregister" => Self::WriteRegister,
            "writecoil" => Self::WriteCoil,
            "setda" => Self::SetDa,
            "getda" => Self::GetDa,
            "log" => Self::Log,
            _ => return None,
        };
        Some(call)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadInput => "ReadInput",
            Self::ReadRegister => "ReadRegister",
            Self::ReadCoil => "ReadCoil",
            Self::ReadDiscreteInput => "ReadDiscreteInput",
            Self::WriteRegister => "WriteRegister",
            Self::WriteCoil => "WriteCoil",
            Self::SetDa => "SetDA",
            Self::GetDa => "GetDA",
            Self::Log => "Log",
        }
    }

    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Self::ReadInput
            | Self::ReadRegister
            | Self::ReadCoil
            | Self::ReadDiscreteInput
            | Self::GetDa => Arity::Exact(1),
            Self::WriteRegister | Self::WriteCoil | Self::SetDa => Arity::Exact(2),
            Self::Log => Arity::AtLeast(1),
        }
    }

    /// Calls that produce a value usable in expressions.
    #[must_use]
    pub fn returns_value(self) -> bool {
        matches!(
            self,
            Self::ReadInput | Self::ReadRegister | Self::ReadCoil | Self::ReadDiscreteInput | Self::GetDa
        )
    }

    /// Register table a read/write call addresses.
    #[must_use]
    pub fn register_type(self) -> Option<RegisterType> {
        match self {
            Self::ReadInput => Some(RegisterType::InputRegister),
            Self::ReadRegister | Self::WriteRegister => Some(RegisterType::HoldingRegister),
            Self::ReadCoil | Self::WriteCoil => Some(RegisterType::Coil),
            Self::ReadDiscreteInput => Some(RegisterType::DiscreteInput),
            Self::SetDa | Self::GetDa | Self::Log => None,
        }
    }
}
