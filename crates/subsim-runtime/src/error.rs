//! Error types for compilation, script execution, configuration and the bridge.

#![allow(missing_docs)]

use smol_str::SmolStr;
use subsim_syntax::ParseError;
use thiserror::Error;

/// Faults raised while a script executes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Operand types do not fit the operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(SmolStr),

    /// A `NULL` value (unknown data attribute) reached an operation.
    #[error("NULL value used in {0}")]
    NullValue(SmolStr),

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Modulo by zero.
    #[error("modulo by zero")]
    ModuloByZero,

    /// Arithmetic overflow.
    #[error("arithmetic overflow")]
    Overflow,

    /// Invalid argument to a function or device call.
    #[error("invalid argument to {function}: {reason}")]
    InvalidArgument { function: SmolStr, reason: SmolStr },

    /// The pass executed more statements than the configured budget.
    #[error("step budget of {budget} statements exceeded")]
    StepBudgetExceeded { budget: u32 },
}

/// What went wrong during compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("{0}")]
    Syntax(SmolStr),

    #[error("unknown type '{0}'")]
    UnknownType(SmolStr),

    #[error("variable '{0}' declared twice")]
    DuplicateVariable(SmolStr),

    #[error("undeclared variable '{0}'")]
    UndeclaredVariable(SmolStr),

    #[error("invalid assignment target '{0}'")]
    InvalidAssignmentTarget(SmolStr),

    #[error("cannot assign to constant '{0}'")]
    AssignToConstant(SmolStr),

    #[error("unknown function '{0}'")]
    UnknownFunction(SmolStr),

    #[error("unknown device call 'Device.{0}'")]
    UnknownDeviceCall(SmolStr),

    #[error("'{name}' expects {expected} argument(s), got {got}")]
    ArgumentCount {
        name: SmolStr,
        expected: SmolStr,
        got: usize,
    },

    #[error("invalid initializer for '{name}': {reason}")]
    InvalidInitializer { name: SmolStr, reason: SmolStr },

    #[error("EXIT outside of a loop")]
    ExitOutsideLoop,

    #[error("{0} is not supported")]
    Unsupported(SmolStr),
}

/// A compilation failure, tagged with the offending source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind} (`{text}`)")]
pub struct CompileError {
    /// 1-based source line.
    pub line: u32,
    /// The trimmed source text of that line.
    pub text: SmolStr,
    pub kind: CompileErrorKind,
}

impl CompileError {
    #[must_use]
    pub fn new(line: u32, source: &str, kind: CompileErrorKind) -> Self {
        Self {
            line,
            text: SmolStr::new(subsim_syntax::line_index::line_text(source, line)),
            kind,
        }
    }

    pub(crate) fn from_parse(err: ParseError, source: &str) -> Self {
        Self::new(err.line, source, CompileErrorKind::Syntax(err.message))
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Read {
        path: SmolStr,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {message}")]
    Parse { path: SmolStr, message: SmolStr },

    #[error("invalid {key}: {message}")]
    Invalid { key: SmolStr, message: SmolStr },

    #[error("device '{device}': {source}")]
    Compile {
        device: SmolStr,
        #[source]
        source: CompileError,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<SmolStr>, message: impl Into<SmolStr>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Bridge connection and protocol failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("invalid relay url '{url}': {reason}")]
    InvalidUrl { url: SmolStr, reason: SmolStr },

    #[error("relay unreachable: {0}")]
    Connect(SmolStr),

    #[error("websocket handshake failed: {0}")]
    Handshake(SmolStr),

    #[error("bridge is not connected")]
    NotConnected,

    #[error("no adapter selected")]
    NoAdapterSelected,

    #[error("relay did not acknowledge within {0} ms")]
    AckTimeout(u64),

    #[error("relay error: {0}")]
    Relay(SmolStr),

    #[error("failed to spawn bridge worker: {0}")]
    ThreadSpawn(SmolStr),
}
