//! Text disassembly of a routine, used by `subsim check --listing`.

use std::fmt::Write as _;

use subsim_syntax::ast::UnaryOp;

use super::{CExpr, Routine, Slot, Step, Storage};
use crate::value::Value;

pub(super) fn render(routine: &Routine) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PROGRAM {}", routine.name().unwrap_or("<anonymous>"));
    let _ = writeln!(out, "slots:");
    for (index, slot) in routine.slots().iter().enumerate() {
        let storage = match slot.storage {
            Storage::Retained => "var",
            Storage::Constant => "const",
            Storage::Temp => "temp",
            Storage::Hidden => "hidden",
        };
        let _ = writeln!(
            out,
            "  {index:>3}  {storage:<6} {} : {} := {}",
            slot.name,
            slot.ty.name(),
            literal(&slot.init)
        );
    }
    let _ = writeln!(out, "steps:");
    let slots = routine.slots();
    for (pc, step) in routine.steps().iter().enumerate() {
        let text = match step {
            Step::Line(line) => format!("line {line}"),
            Step::Assign { slot, value } => {
                format!("{} := {}", slot_name(slots, *slot), expr(slots, value))
            }
            Step::Eval(value) => format!("eval {}", expr(slots, value)),
            Step::JumpIfFalse { cond, target } => {
                format!("jz {} -> {target:04}", expr(slots, cond))
            }
            Step::Jump(target) => format!("jmp {target:04}"),
            Step::Return => "ret".to_string(),
        };
        let _ = writeln!(out, "{pc:04}  {text}");
    }
    out
}

fn slot_name(slots: &[Slot], index: usize) -> &str {
    slots.get(index).map_or("?", |slot| slot.name.as_str())
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{text}'"),
        Value::Real(v) if v.fract() == 0.0 && v.is_finite() => format!("{v:.1}"),
        other => other.to_string(),
    }
}

fn expr(slots: &[Slot], value: &CExpr) -> String {
    match value {
        CExpr::Const(value) => literal(value),
        CExpr::Slot(index) => slot_name(slots, *index).to_string(),
        CExpr::Unary(UnaryOp::Neg, operand) => format!("-{}", expr(slots, operand)),
        CExpr::Unary(UnaryOp::Not, operand) => format!("NOT {}", expr(slots, operand)),
        CExpr::Binary(op, left, right) => format!(
            "({} {} {})",
            expr(slots, left),
            op.symbol(),
            expr(slots, right)
        ),
        CExpr::Builtin(builtin, args) => format!("{}({})", builtin.name(), args_list(slots, args)),
        CExpr::Device(call, args) => format!("Device.{}({})", call.name(), args_list(slots, args)),
    }
}

fn args_list(slots: &[Slot], args: &[CExpr]) -> String {
    args.iter()
        .map(|arg| expr(slots, arg))
        .collect::<Vec<_>>()
        .join(", ")
}
