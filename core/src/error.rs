//! Error taxonomy
//!
//! Every failure in the engine is a named variant. Evaluation errors abort the
//! current evaluation (or scheduler task); reader and assembler errors abort
//! before anything runs.

use thiserror::Error;

use crate::machine::assembler::AssembleError;
use crate::reader::ReadError;

/* ===================== Evaluation Errors ===================== */

/// Failure raised while evaluating, stepping a frame, or executing bytecode
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Lookup exhausted the environment chain
    #[error("unbound symbol '{0}'")]
    UnboundSymbol(String),

    /// `set!` target not found in any enclosing scope
    #[error("set! on undefined symbol '{0}'")]
    SetOnUndefined(String),

    /// Attempt to invoke a value that is not a procedure
    #[error("cannot call {0}")]
    NotCallable(String),

    #[error("type mismatch in '{op}': {detail}")]
    TypeMismatch { op: String, detail: String },

    #[error("arity mismatch: expected {expected} argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("division by zero")]
    DivideByZero,

    /// Special form is missing operands or has the wrong shape
    #[error("malformed form: {0}")]
    MalformedForm(String),

    /// Reference evaluator nested deeper than the configured limit
    #[error("recursion limit of {0} exceeded")]
    RecursionLimit(usize),

    /// The machine fetched a word with no defined behaviour
    #[error("missing opcode {word} at pc {pc}")]
    MissingOpcode { word: i64, pc: usize },

    /// Out-of-range stack, code or data access inside the machine
    #[error("vm fault: {0}")]
    VmFault(String),

    /// Frame reached a (tag, flags) combination with no handler
    #[error("unimplemented step {0}")]
    UnimplementedStep(String),

    /// Machine stopped through HALTMSG
    #[error("halted: {0}")]
    Halted(String),

    #[error("output failed: {0}")]
    Output(String),
}

impl EvalError {
    pub fn type_mismatch(op: &str, detail: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            op: op.to_string(),
            detail: detail.into(),
        }
    }

    /// Error for a machine that stopped through HALTMSG with `message`
    ///
    /// Messages starting with `malformed form: ` are the evaluator program
    /// rejecting a special form and map to [`EvalError::MalformedForm`].
    pub fn from_halt(message: &str) -> Self {
        match message.strip_prefix(MALFORMED_HALT_PREFIX) {
            Some(detail) => EvalError::MalformedForm(detail.to_string()),
            None => EvalError::Halted(message.to_string()),
        }
    }
}

/// HALTMSG prefix for special forms with missing operands
pub const MALFORMED_HALT_PREFIX: &str = "malformed form: ";

pub type EvalResult<T> = Result<T, EvalError>;

/* ===================== Umbrella ===================== */

/// Any failure between source text and a result
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
