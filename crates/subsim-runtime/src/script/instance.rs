//! Execution of a compiled routine.

use std::sync::Arc;

use smol_str::SmolStr;

use super::DeviceContext;
use crate::compiler::{CExpr, DeviceCall, Routine, Step};
use crate::error::RuntimeError;
use crate::store::{RegisterType, RegisterValue};
use crate::value::{apply_binary, apply_unary, expect_bool, Value};

/// Why an instance stopped executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Line of the statement that raised the error.
    pub line: u32,
    pub error: RuntimeError,
}

/// Result of driving an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Stopped before the statement on `line`.
    Suspended { line: u32 },
    /// The pass ran to the end of the program body (or a `RETURN`).
    PassComplete,
    /// The instance is faulted and will not run until reloaded.
    Faulted,
}

/// One device's running copy of a routine.
///
/// Slot values persist across passes except `VAR_TEMP` and compiler
/// temporaries, which are re-initialized whenever a pass starts.
#[derive(Debug, Clone)]
pub struct ScriptInstance {
    routine: Arc<Routine>,
    values: Vec<Value>,
    pc: usize,
    in_pass: bool,
    /// Suspended on the line marker at `pc`; the next step runs that line.
    parked: bool,
    /// Statements plus backward jumps counted in the current pass.
    executed: u32,
    line: u32,
    last_yield_line: Option<u32>,
    fault: Option<Fault>,
    passes: u64,
}

impl ScriptInstance {
    #[must_use]
    pub fn new(routine: Arc<Routine>) -> Self {
        let values = routine.initial_values();
        Self {
            routine,
            values,
            pc: 0,
            in_pass: false,
            parked: false,
            executed: 0,
            line: 0,
            last_yield_line: None,
            fault: None,
            passes: 0,
        }
    }

    #[must_use]
    pub fn routine(&self) -> &Arc<Routine> {
        &self.routine
    }

    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Line the instance last suspended before (or started, when running freely).
    #[must_use]
    pub fn last_yield_line(&self) -> Option<u32> {
        self.last_yield_line
    }

    /// Completed passes.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// `true` while suspended in the middle of a pass.
    #[must_use]
    pub fn in_pass(&self) -> bool {
        self.in_pass
    }

    /// Current value of a declared variable (case-insensitive).
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.routine
            .slots()
            .iter()
            .position(|slot| slot.name.eq_ignore_ascii_case(name))
            .and_then(|index| self.values.get(index))
    }

    /// Declared variables and their values, compiler temporaries excluded.
    pub fn scope(&self) -> impl Iterator<Item = (&SmolStr, &Value)> {
        self.routine
            .slots()
            .iter()
            .zip(&self.values)
            .filter(|(slot, _)| slot.storage != crate::compiler::Storage::Hidden)
            .map(|(slot, value)| (&slot.name, value))
    }

    /// Runs the rest of the current pass, or a whole new one.
    pub fn run_pass(&mut self, ctx: &mut dyn DeviceContext, budget: u32) -> StepOutcome {
        self.drive(ctx, budget, false)
    }

    /// Stops before the next statement. When already stopped there, runs it
    /// and stops before the one after.
    pub fn step(&mut self, ctx: &mut dyn DeviceContext, budget: u32) -> StepOutcome {
        self.drive(ctx, budget, true)
    }

    fn begin_pass(&mut self) {
        let routine = Arc::clone(&self.routine);
        for (value, slot) in self.values.iter_mut().zip(routine.slots()) {
            if slot.storage.resets_each_pass() {
                *value = slot.init.clone();
            }
        }
        self.pc = 0;
        self.parked = false;
        self.executed = 0;
        self.in_pass = true;
    }

    fn finish_pass(&mut self) -> StepOutcome {
        self.pc = 0;
        self.parked = false;
        self.in_pass = false;
        self.passes += 1;
        StepOutcome::PassComplete
    }

    fn raise(&mut self, error: RuntimeError) -> StepOutcome {
        self.fault = Some(Fault {
            line: self.line,
            error,
        });
        self.in_pass = false;
        self.pc = 0;
        self.parked = false;
        StepOutcome::Faulted
    }

    fn count(&mut self, budget: u32) -> Result<(), RuntimeError> {
        self.executed += 1;
        if self.executed > budget {
            return Err(RuntimeError::StepBudgetExceeded { budget });
        }
        Ok(())
    }

    fn drive(&mut self, ctx: &mut dyn DeviceContext, budget: u32, single: bool) -> StepOutcome {
        if self.fault.is_some() {
            return StepOutcome::Faulted;
        }
        if !self.in_pass {
            self.begin_pass();
        }
        let routine = Arc::clone(&self.routine);
        loop {
            let Some(step) = routine.steps().get(self.pc) else {
                return self.finish_pass();
            };
            let result = match step {
                Step::Line(line) => {
                    if single && !self.parked {
                        self.parked = true;
                        self.last_yield_line = Some(*line);
                        return StepOutcome::Suspended { line: *line };
                    }
                    self.parked = false;
                    self.line = *line;
                    self.last_yield_line = Some(*line);
                    self.pc += 1;
                    self.count(budget)
                }
                Step::Assign { slot, value } => self.assign(*slot, value, ctx),
                Step::Eval(expr) => self.eval(expr, ctx).map(|_| self.pc += 1),
                Step::JumpIfFalse { cond, target } => self
                    .eval(cond, ctx)
                    .and_then(|cond| expect_bool(&cond, "condition"))
                    .and_then(|holds| {
                        if holds {
                            self.pc += 1;
                            Ok(())
                        } else {
                            self.jump(*target, budget)
                        }
                    }),
                Step::Jump(target) => self.jump(*target, budget),
                Step::Return => return self.finish_pass(),
            };
            if let Err(error) = result {
                return self.raise(error);
            }
        }
    }

    fn jump(&mut self, target: usize, budget: u32) -> Result<(), RuntimeError> {
        let backward = target <= self.pc;
        self.pc = target;
        if backward {
            self.count(budget)?;
        }
        Ok(())
    }

    fn assign(
        &mut self,
        slot: usize,
        value: &CExpr,
        ctx: &mut dyn DeviceContext,
    ) -> Result<(), RuntimeError> {
        let value = self.eval(value, ctx)?;
        let ty = self.routine.slots()[slot].ty;
        self.values[slot] = ty.coerce(value)?;
        self.pc += 1;
        Ok(())
    }

    fn eval(&self, expr: &CExpr, ctx: &mut dyn DeviceContext) -> Result<Value, RuntimeError> {
        match expr {
            CExpr::Const(value) => Ok(value.clone()),
            CExpr::Slot(index) => Ok(self.values[*index].clone()),
            CExpr::Unary(op, operand) => apply_unary(*op, self.eval(operand, ctx)?),
            CExpr::Binary(op, left, right) => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                apply_binary(*op, left, right)
            }
            CExpr::Builtin(builtin, args) => {
                let args = self.eval_args(args, ctx)?;
                builtin.call(&args)
            }
            CExpr::Device(call, args) => {
                let args = self.eval_args(args, ctx)?;
                device_call(*call, &args, ctx)
            }
        }
    }

    fn eval_args(
        &self,
        args: &[CExpr],
        ctx: &mut dyn DeviceContext,
    ) -> Result<Vec<Value>, RuntimeError> {
        args.iter().map(|arg| self.eval(arg, ctx)).collect()
    }
}

fn device_call(
    call: DeviceCall,
    args: &[Value],
    ctx: &mut dyn DeviceContext,
) -> Result<Value, RuntimeError> {
    let name = || SmolStr::new(format!("Device.{}", call.name()));
    match call {
        DeviceCall::ReadInput
        | DeviceCall::ReadRegister
        | DeviceCall::ReadCoil
        | DeviceCall::ReadDiscreteInput => {
            let kind = register_kind(call)?;
            let address = register_address(call, &args[0])?;
            let value = ctx.read_register(kind, address);
            Ok(if kind.is_bit() {
                Value::Bool(value.is_some_and(RegisterValue::as_bool))
            } else {
                Value::Int(i64::from(value.map_or(0, RegisterValue::as_word)))
            })
        }
        DeviceCall::WriteRegister => {
            let address = register_address(call, &args[0])?;
            let word = match &args[1] {
                Value::Null => return Err(RuntimeError::NullValue(name())),
                Value::Bool(bit) => RegisterValue::Word(u16::from(*bit)),
                Value::Int(_) | Value::Real(_) => {
                    RegisterValue::word_from_i64(args[1].as_i64().ok_or(RuntimeError::Overflow)?)
                }
                Value::String(_) => {
                    return Err(RuntimeError::TypeMismatch(SmolStr::new(format!(
                        "{} expects a number, got STRING",
                        name()
                    ))))
                }
            };
            ctx.write_register(RegisterType::HoldingRegister, address, word);
            Ok(Value::Null)
        }
        DeviceCall::WriteCoil => {
            let address = register_address(call, &args[0])?;
            let bit = match &args[1] {
                Value::Null => return Err(RuntimeError::NullValue(name())),
                Value::Bool(bit) => *bit,
                Value::Int(v) => *v != 0,
                other => {
                    return Err(RuntimeError::TypeMismatch(SmolStr::new(format!(
                        "{} expects BOOL, got {}",
                        name(),
                        other.kind_name()
                    ))))
                }
            };
            ctx.write_register(RegisterType::Coil, address, RegisterValue::Bit(bit));
            Ok(Value::Null)
        }
        DeviceCall::GetDa => {
            let path = da_path(call, &args[0])?;
            Ok(ctx.get_da(&path).unwrap_or(Value::Null))
        }
        DeviceCall::SetDa => {
            let path = da_path(call, &args[0])?;
            if args[1].is_null() {
                return Err(RuntimeError::NullValue(name()));
            }
            ctx.set_da(&path, args[1].clone());
            Ok(Value::Null)
        }
        DeviceCall::Log => {
            let message: String = args.iter().map(ToString::to_string).collect();
            ctx.log(&message);
            Ok(Value::Null)
        }
    }
}

fn register_kind(call: DeviceCall) -> Result<RegisterType, RuntimeError> {
    call.register_type().ok_or_else(|| RuntimeError::InvalidArgument {
        function: SmolStr::new(call.name()),
        reason: "not a register call".into(),
    })
}

fn register_address(call: DeviceCall, value: &Value) -> Result<u16, RuntimeError> {
    let invalid = |reason: String| RuntimeError::InvalidArgument {
        function: SmolStr::new(format!("Device.{}", call.name())),
        reason: reason.into(),
    };
    match value {
        Value::Int(address) => u16::try_from(*address)
            .map_err(|_| invalid(format!("register address {address} out of range 0..=65535"))),
        Value::Null => Err(RuntimeError::NullValue(SmolStr::new(format!(
            "Device.{}",
            call.name()
        )))),
        other => Err(invalid(format!("address must be an integer, got {}", other.kind_name()))),
    }
}

fn da_path(call: DeviceCall, value: &Value) -> Result<SmolStr, RuntimeError> {
    match value {
        Value::String(path) => Ok(path.clone()),
        other => Err(RuntimeError::InvalidArgument {
            function: SmolStr::new(format!("Device.{}", call.name())),
            reason: SmolStr::new(format!("path must be a STRING, got {}", other.kind_name())),
        }),
    }
}
