//! AST to step lowering.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use subsim_syntax::ast::{
    BinaryOp, CaseLabel, Expr, Literal, Program, Stmt, VarBlock, VarBlockKind, VarDecl,
};

use super::{Builtin, CExpr, DeviceCall, Routine, Slot, Step, Storage};
use crate::error::{CompileError, CompileErrorKind, RuntimeError};
use crate::value::{apply_binary, apply_unary, DataType, IntType, Value};

const LINT: DataType = DataType::Int(IntType {
    bits: 64,
    signed: true,
});

/// Placeholder target of a jump that is patched once its destination is known.
const UNPATCHED: usize = usize::MAX;

pub(super) struct Codegen<'src> {
    source: &'src str,
    slots: Vec<Slot>,
    names: FxHashMap<SmolStr, usize>,
    steps: Vec<Step>,
    /// Pending EXIT jumps, one list per enclosing loop.
    loops: Vec<Vec<usize>>,
    hidden: usize,
}

impl<'src> Codegen<'src> {
    pub(super) fn new(source: &'src str) -> Self {
        Self {
            source,
            slots: Vec::new(),
            names: FxHashMap::default(),
            steps: Vec::new(),
            loops: Vec::new(),
            hidden: 0,
        }
    }

    pub(super) fn lower(mut self, program: &Program) -> Result<Routine, CompileError> {
        for (block, decl) in program.declarations() {
            self.declare(block, decl)?;
        }
        self.lower_block(&program.body)?;
        Ok(Routine {
            name: program.name.clone(),
            slots: self.slots,
            steps: self.steps,
        })
    }

    fn error(&self, line: u32, kind: CompileErrorKind) -> CompileError {
        CompileError::new(line, self.source, kind)
    }

    // ---------------------------------------------------------------------
    // Declarations
    // ---------------------------------------------------------------------

    fn declare(&mut self, block: &VarBlock, decl: &VarDecl) -> Result<(), CompileError> {
        let ty = DataType::from_name(&decl.type_name).ok_or_else(|| {
            self.error(
                decl.line,
                CompileErrorKind::UnknownType(decl.type_name.clone()),
            )
        })?;
        let key = SmolStr::new(decl.name.to_ascii_lowercase());
        if self.names.contains_key(&key) {
            return Err(self.error(
                decl.line,
                CompileErrorKind::DuplicateVariable(decl.name.clone()),
            ));
        }
        let init = match &decl.init {
            Some(expr) => self.constant_initializer(decl, ty, expr)?,
            None => ty.default_value(),
        };
        let storage = if block.constant {
            Storage::Constant
        } else if block.kind == VarBlockKind::Temp {
            Storage::Temp
        } else {
            Storage::Retained
        };
        self.names.insert(key, self.slots.len());
        self.slots.push(Slot {
            name: decl.name.clone(),
            ty,
            storage,
            init,
        });
        Ok(())
    }

    fn constant_initializer(
        &self,
        decl: &VarDecl,
        ty: DataType,
        expr: &Expr,
    ) -> Result<Value, CompileError> {
        let invalid = |reason: String| {
            self.error(
                decl.line,
                CompileErrorKind::InvalidInitializer {
                    name: decl.name.clone(),
                    reason: reason.into(),
                },
            )
        };
        let compiled = self.lower_expr(expr, decl.line)?;
        let value = self
            .fold(&compiled)
            .ok_or_else(|| invalid("not a constant expression".to_string()))?
            .map_err(|err| invalid(err.to_string()))?;
        ty.coerce(value).map_err(|err| invalid(err.to_string()))
    }

    /// Evaluates an expression built only from literals, constants and pure
    /// functions. `None` if it depends on anything else.
    fn fold(&self, expr: &CExpr) -> Option<Result<Value, RuntimeError>> {
        match expr {
            CExpr::Const(value) => Some(Ok(value.clone())),
            CExpr::Slot(index) => {
                let slot = &self.slots[*index];
                (slot.storage == Storage::Constant).then(|| Ok(slot.init.clone()))
            }
            CExpr::Unary(op, operand) => {
                let value = self.fold(operand)?;
                Some(value.and_then(|value| apply_unary(*op, value)))
            }
            CExpr::Binary(op, left, right) => {
                let left = self.fold(left)?;
                let right = self.fold(right)?;
                Some(left.and_then(|left| apply_binary(*op, left, right?)))
            }
            CExpr::Builtin(builtin, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.fold(arg))
                    .collect::<Option<Vec<_>>>()?;
                Some(
                    args.into_iter()
                        .collect::<Result<Vec<_>, _>>()
                        .and_then(|args| builtin.call(&args)),
                )
            }
            CExpr::Device(..) => None,
        }
    }

    fn resolve(&self, name: &str, line: u32) -> Result<usize, CompileError> {
        self.names
            .get(name.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| self.error(line, CompileErrorKind::UndeclaredVariable(name.into())))
    }

    fn hidden_slot(&mut self) -> usize {
        let index = self.slots.len();
        self.slots.push(Slot {
            name: SmolStr::new(format!("$tmp{}", self.hidden)),
            ty: LINT,
            storage: Storage::Hidden,
            init: Value::Int(0),
        });
        self.hidden += 1;
        index
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn here(&self) -> usize {
        self.steps.len()
    }

    fn emit(&mut self, step: Step) -> usize {
        self.steps.push(step);
        self.steps.len() - 1
    }

    fn patch(&mut self, index: usize, destination: usize) {
        match &mut self.steps[index] {
            Step::Jump(target) | Step::JumpIfFalse { target, .. } => *target = destination,
            _ => {}
        }
    }

    fn lower_block(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        let line = stmt.line();
        let head = self.emit(Step::Line(line));
        match stmt {
            Stmt::Assign { target, value, .. } => {
                let slot = self.assign_target(target, line)?;
                let value = self.lower_expr(value, line)?;
                self.emit(Step::Assign { slot, value });
            }
            Stmt::Call { expr, .. } => {
                let call = self.lower_call(expr, line, false)?;
                self.emit(Step::Eval(call));
            }
            Stmt::If {
                condition,
                then_block,
                else_if,
                else_block,
                ..
            } => {
                let branches: Vec<(&Expr, &Vec<Stmt>)> = std::iter::once((condition, then_block))
                    .chain(else_if.iter().map(|(cond, block)| (cond, block)))
                    .collect();
                let mut end_jumps = Vec::new();
                for (index, (cond, block)) in branches.iter().enumerate() {
                    let cond = self.lower_expr(cond, line)?;
                    let skip = self.emit(Step::JumpIfFalse {
                        cond,
                        target: UNPATCHED,
                    });
                    self.lower_block(block)?;
                    if index + 1 < branches.len() || !else_block.is_empty() {
                        end_jumps.push(self.emit(Step::Jump(UNPATCHED)));
                    }
                    let next = self.here();
                    self.patch(skip, next);
                }
                self.lower_block(else_block)?;
                let end = self.here();
                for jump in end_jumps {
                    self.patch(jump, end);
                }
            }
            Stmt::Case {
                selector,
                arms,
                else_block,
                ..
            } => {
                let selector_slot = self.hidden_slot();
                let value = self.lower_expr(selector, line)?;
                self.emit(Step::Assign {
                    slot: selector_slot,
                    value,
                });
                let mut end_jumps = Vec::new();
                for (index, arm) in arms.iter().enumerate() {
                    let cond = case_condition(selector_slot, &arm.labels);
                    let skip = self.emit(Step::JumpIfFalse {
                        cond,
                        target: UNPATCHED,
                    });
                    self.lower_block(&arm.body)?;
                    if index + 1 < arms.len() || !else_block.is_empty() {
                        end_jumps.push(self.emit(Step::Jump(UNPATCHED)));
                    }
                    let next = self.here();
                    self.patch(skip, next);
                }
                self.lower_block(else_block)?;
                let end = self.here();
                for jump in end_jumps {
                    self.patch(jump, end);
                }
            }
            Stmt::For {
                control,
                start,
                end,
                step,
                body,
                ..
            } => {
                let control_slot = self.assign_target(&Expr::Name(control.clone()), line)?;
                if !matches!(self.slots[control_slot].ty, DataType::Int(_)) {
                    return Err(self.error(
                        line,
                        CompileErrorKind::Unsupported(SmolStr::new(format!(
                            "FOR over non-integer variable '{control}'"
                        ))),
                    ));
                }
                let start = self.lower_expr(start, line)?;
                self.emit(Step::Assign {
                    slot: control_slot,
                    value: start,
                });
                let end_slot = self.hidden_slot();
                let end = self.lower_expr(end, line)?;
                self.emit(Step::Assign {
                    slot: end_slot,
                    value: end,
                });
                let step_slot = self.hidden_slot();
                let step = match step {
                    Some(step) => self.lower_expr(step, line)?,
                    None => CExpr::Const(Value::Int(1)),
                };
                self.emit(Step::Assign {
                    slot: step_slot,
                    value: step,
                });

                let top = self.here();
                let exit = self.emit(Step::JumpIfFalse {
                    cond: for_condition(control_slot, end_slot, step_slot),
                    target: UNPATCHED,
                });
                self.loops.push(Vec::new());
                self.lower_block(body)?;
                self.emit(Step::Assign {
                    slot: control_slot,
                    value: binary(BinaryOp::Add, CExpr::Slot(control_slot), CExpr::Slot(step_slot)),
                });
                self.emit(Step::Jump(top));
                self.close_loop(exit);
            }
            Stmt::While {
                condition, body, ..
            } => {
                let cond = self.lower_expr(condition, line)?;
                let exit = self.emit(Step::JumpIfFalse {
                    cond,
                    target: UNPATCHED,
                });
                self.loops.push(Vec::new());
                self.lower_block(body)?;
                // Back to the line marker, so each condition check is a stop.
                self.emit(Step::Jump(head));
                self.close_loop(exit);
            }
            Stmt::Repeat { body, until, .. } => {
                let top = self.here();
                self.loops.push(Vec::new());
                self.lower_block(body)?;
                let cond = self.lower_expr(until, line)?;
                self.emit(Step::JumpIfFalse { cond, target: top });
                let end = self.here();
                for jump in self.loops.pop().unwrap_or_default() {
                    self.patch(jump, end);
                }
            }
            Stmt::Exit { .. } => {
                if self.loops.is_empty() {
                    return Err(self.error(line, CompileErrorKind::ExitOutsideLoop));
                }
                let jump = self.emit(Step::Jump(UNPATCHED));
                if let Some(exits) = self.loops.last_mut() {
                    exits.push(jump);
                }
            }
            Stmt::Return { .. } => {
                self.emit(Step::Return);
            }
        }
        Ok(())
    }

    /// Patches the loop's exit jump and every EXIT inside it to the current position.
    fn close_loop(&mut self, exit: usize) {
        let end = self.here();
        self.patch(exit, end);
        for jump in self.loops.pop().unwrap_or_default() {
            self.patch(jump, end);
        }
    }

    fn assign_target(&self, target: &Expr, line: u32) -> Result<usize, CompileError> {
        let Expr::Name(name) = target else {
            let text = target
                .dotted_path()
                .unwrap_or_else(|| subsim_syntax::line_index::line_text(self.source, line).to_string());
            return Err(self.error(
                line,
                CompileErrorKind::InvalidAssignmentTarget(SmolStr::new(text)),
            ));
        };
        let slot = self.resolve(name, line)?;
        if self.slots[slot].storage == Storage::Constant {
            return Err(self.error(line, CompileErrorKind::AssignToConstant(name.clone())));
        }
        Ok(slot)
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn lower_expr(&self, expr: &Expr, line: u32) -> Result<CExpr, CompileError> {
        Ok(match expr {
            Expr::Literal(literal) => CExpr::Const(match literal {
                Literal::Bool(v) => Value::Bool(*v),
                Literal::Int(v) | Literal::Time(v) => Value::Int(*v),
                Literal::Real(v) => Value::Real(*v),
                Literal::String(v) => Value::String(v.clone()),
            }),
            Expr::Name(name) => CExpr::Slot(self.resolve(name, line)?),
            Expr::Member { .. } => {
                let path = expr.dotted_path().unwrap_or_default();
                return Err(self.error(
                    line,
                    CompileErrorKind::Unsupported(SmolStr::new(format!("member access '{path}'"))),
                ));
            }
            Expr::Index { .. } => {
                return Err(self.error(line, CompileErrorKind::Unsupported("array indexing".into())));
            }
            Expr::Call { .. } => self.lower_call(expr, line, true)?,
            Expr::Unary { op, expr } => CExpr::Unary(*op, Box::new(self.lower_expr(expr, line)?)),
            Expr::Binary { op, left, right } => binary(
                *op,
                self.lower_expr(left, line)?,
                self.lower_expr(right, line)?,
            ),
        })
    }

    fn lower_call(&self, expr: &Expr, line: u32, as_value: bool) -> Result<CExpr, CompileError> {
        let Expr::Call { callee, args } = expr else {
            return Err(self.error(
                line,
                CompileErrorKind::Unsupported("expression statement".into()),
            ));
        };
        let compiled = args
            .iter()
            .map(|arg| self.lower_expr(arg, line))
            .collect::<Result<Vec<_>, _>>()?;
        let check_arity = |name: String, arity: super::Arity| {
            if arity.accepts(args.len()) {
                Ok(())
            } else {
                Err(self.error(
                    line,
                    CompileErrorKind::ArgumentCount {
                        name: name.into(),
                        expected: arity.describe(),
                        got: args.len(),
                    },
                ))
            }
        };
        match callee.as_ref() {
            Expr::Name(name) => {
                let builtin = Builtin::lookup(name).ok_or_else(|| {
                    self.error(line, CompileErrorKind::UnknownFunction(name.clone()))
                })?;
                check_arity(builtin.name().to_string(), builtin.arity())?;
                Ok(CExpr::Builtin(builtin, compiled))
            }
            Expr::Member { target, field }
                if matches!(target.as_ref(), Expr::Name(name) if name.eq_ignore_ascii_case("Device")) =>
            {
                let call = DeviceCall::lookup(field).ok_or_else(|| {
                    self.error(line, CompileErrorKind::UnknownDeviceCall(field.clone()))
                })?;
                check_arity(format!("Device.{}", call.name()), call.arity())?;
                if as_value && !call.returns_value() {
                    return Err(self.error(
                        line,
                        CompileErrorKind::Unsupported(SmolStr::new(format!(
                            "'Device.{}' used as a value",
                            call.name()
                        ))),
                    ));
                }
                Ok(CExpr::Device(call, compiled))
            }
            other => Err(self.error(
                line,
                CompileErrorKind::UnknownFunction(SmolStr::new(
                    other.dotted_path().unwrap_or_else(|| "<expression>".to_string()),
                )),
            )),
        }
    }
}

fn binary(op: BinaryOp, left: CExpr, right: CExpr) -> CExpr {
    CExpr::Binary(op, Box::new(left), Box::new(right))
}

fn int(value: i64) -> CExpr {
    CExpr::Const(Value::Int(value))
}

/// `(step >= 0 AND control <= end) OR (step < 0 AND control >= end)`
fn for_condition(control: usize, end: usize, step: usize) -> CExpr {
    let upward = binary(
        BinaryOp::And,
        binary(BinaryOp::Ge, CExpr::Slot(step), int(0)),
        binary(BinaryOp::Le, CExpr::Slot(control), CExpr::Slot(end)),
    );
    let downward = binary(
        BinaryOp::And,
        binary(BinaryOp::Lt, CExpr::Slot(step), int(0)),
        binary(BinaryOp::Ge, CExpr::Slot(control), CExpr::Slot(end)),
    );
    binary(BinaryOp::Or, upward, downward)
}

fn case_condition(selector: usize, labels: &[CaseLabel]) -> CExpr {
    let mut conditions = labels.iter().map(|label| match label {
        CaseLabel::Single(value) => binary(BinaryOp::Eq, CExpr::Slot(selector), int(*value)),
        CaseLabel::Range(low, high) => binary(
            BinaryOp::And,
            binary(BinaryOp::Ge, CExpr::Slot(selector), int(*low)),
            binary(BinaryOp::Le, CExpr::Slot(selector), int(*high)),
        ),
    });
    let first = conditions
        .next()
        .unwrap_or_else(|| CExpr::Const(Value::Bool(false)));
    conditions.fold(first, |acc, cond| binary(BinaryOp::Or, acc, cond))
}
