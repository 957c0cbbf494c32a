//! Operator implementations.

use smol_str::SmolStr;
use subsim_syntax::ast::{BinaryOp, UnaryOp};

use super::Value;
use crate::error::RuntimeError;

fn mismatch(op: &str, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch(SmolStr::new(format!(
        "{} {op} {}",
        left.kind_name(),
        right.kind_name()
    )))
}

/// Interprets a value as a condition.
pub fn expect_bool(value: &Value, context: &str) -> Result<bool, RuntimeError> {
    match value {
        Value::Bool(v) => Ok(*v),
        Value::Null => Err(RuntimeError::NullValue(context.into())),
        other => Err(RuntimeError::TypeMismatch(SmolStr::new(format!(
            "{context} expects BOOL, got {}",
            other.kind_name()
        )))),
    }
}

pub fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (_, Value::Null) => Err(RuntimeError::NullValue("unary operator".into())),
        (UnaryOp::Neg, Value::Int(v)) => v.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow),
        (UnaryOp::Neg, Value::Real(v)) => Ok(Value::Real(-v)),
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnaryOp::Not, Value::Int(v)) => Ok(Value::Int(!v)),
        (op, value) => Err(RuntimeError::TypeMismatch(SmolStr::new(format!(
            "{} {}",
            match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "NOT",
            },
            value.kind_name()
        )))),
    }
}

pub fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right)?)),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right)?)),
        _ if left.is_null() || right.is_null() => Err(RuntimeError::NullValue(
            SmolStr::new(format!("'{}'", op.symbol())),
        )),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => logical_or_bitwise(op, left, right),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, &left, &right),
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::Mod
        | BinaryOp::Pow => arith(op, left, right),
    }
}

fn logical_or_bitwise(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            BinaryOp::And => a && b,
            BinaryOp::Or => a || b,
            _ => a ^ b,
        })),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            _ => a ^ b,
        })),
        (left, right) => Err(mismatch(op.symbol(), &left, &right)),
    }
}

fn values_equal(left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    Ok(match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
            left.as_f64() == right.as_f64()
        }
        _ => return Err(mismatch("=", left, right)),
    })
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(mismatch(op.symbol(), left, right));
            };
            match a.partial_cmp(&b) {
                Some(ordering) => ordering,
                // NaN compares false against everything.
                None => return Ok(Value::Bool(false)),
            }
        }
        _ => return Err(mismatch(op.symbol(), left, right)),
    };
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

fn arith(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(mismatch(op.symbol(), &left, &right));
            };
            real_arith(op, a, b)
        }
        _ => Err(mismatch(op.symbol(), &left, &right)),
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.checked_div(b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::ModuloByZero);
            }
            a.checked_rem(b)
        }
        _ => {
            // Negative exponents leave the integers.
            let Ok(exp) = u32::try_from(b) else {
                return real_arith(op, a as f64, b as f64);
            };
            a.checked_pow(exp)
        }
    };
    result.map(Value::Int).ok_or(RuntimeError::Overflow)
}

fn real_arith(op: BinaryOp, a: f64, b: f64) -> Result<Value, RuntimeError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::ModuloByZero);
            }
            a % b
        }
        _ => a.powf(b),
    };
    Ok(Value::Real(result))
}
