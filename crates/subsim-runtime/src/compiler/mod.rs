//! Structured Text compiler.
//!
//! Source is parsed into an AST by `subsim-syntax`, then lowered in a single
//! pass into a flat [`Routine`]: a list of [`Step`]s addressed by a program
//! counter, with every variable resolved to a slot. Each statement begins
//! with a [`Step::Line`] marker, the point where a stepping debugger may
//! suspend the routine and report the line about to run.
//!
//! Compilation is all-or-nothing and deterministic: the same source always
//! yields an identical routine.

#![allow(missing_docs)]

mod codegen;
pub mod functions;
mod listing;

use smol_str::SmolStr;
use subsim_syntax::ast::{BinaryOp, UnaryOp};

use crate::error::CompileError;
use crate::value::{DataType, Value};

pub use functions::{Arity, Builtin, DeviceCall};

/// Where a slot's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// `VAR` / `VAR RETAIN`: survives across passes.
    Retained,
    /// `VAR CONSTANT`: initialized once, never assigned.
    Constant,
    /// `VAR_TEMP`: re-initialized at the start of every pass.
    Temp,
    /// Compiler-generated loop bound or CASE selector.
    Hidden,
}

impl Storage {
    /// Slots that are re-initialized when a pass starts.
    #[must_use]
    pub fn resets_each_pass(self) -> bool {
        matches!(self, Self::Temp | Self::Hidden)
    }
}

/// A resolved variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub name: SmolStr,
    pub ty: DataType,
    pub storage: Storage,
    pub init: Value,
}

/// Compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CExpr {
    Const(Value),
    Slot(usize),
    Unary(UnaryOp, Box<CExpr>),
    Binary(BinaryOp, Box<CExpr>, Box<CExpr>),
    Builtin(Builtin, Vec<CExpr>),
    Device(DeviceCall, Vec<CExpr>),
}

/// One instruction of a routine.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Statement boundary; the statement on `line` starts here.
    Line(u32),
    Assign { slot: usize, value: CExpr },
    /// Evaluate for side effects (call statements).
    Eval(CExpr),
    JumpIfFalse { cond: CExpr, target: usize },
    Jump(usize),
    /// End the pass early.
    Return,
}

/// A compiled program, shared by every instance created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    name: Option<SmolStr>,
    slots: Vec<Slot>,
    steps: Vec<Step>,
}

impl Routine {
    /// Program name from a `PROGRAM` wrapper, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Source lines that carry a statement, in program order.
    #[must_use]
    pub fn statement_lines(&self) -> Vec<u32> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Line(line) => Some(*line),
                _ => None,
            })
            .collect()
    }

    /// Initial slot values of a fresh instance.
    #[must_use]
    pub fn initial_values(&self) -> Vec<Value> {
        self.slots.iter().map(|slot| slot.init.clone()).collect()
    }

    /// Deterministic text disassembly.
    #[must_use]
    pub fn listing(&self) -> String {
        listing::render(self)
    }
}

/// Compiles Structured Text source into a routine.
pub fn compile(source: &str) -> Result<Routine, CompileError> {
    let program =
        subsim_syntax::parse(source).map_err(|err| CompileError::from_parse(err, source))?;
    codegen::Codegen::new(source).lower(&program)
}
