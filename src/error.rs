//! Error taxonomy for specification building, solving and strategy execution.
//!
//! [`Error::Unrealizable`] only surfaces through [`synthesize`][crate::synthesize];
//! the solver itself reports unrealizability as an
//! [`Outcome`][crate::solver::Outcome] so callers can branch on the verdict.

use crate::solver::SolverSnapshot;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("syntax error in '{text}' at offset {offset}: {message}")]
    SyntaxError {
        text: String,
        offset: usize,
        message: String,
    },

    #[error("variable '{0}' is already declared")]
    DuplicateVariable(String),

    #[error("invalid domain for variable '{name}': {reason}")]
    InvalidDomain { name: String, reason: String },

    #[error("unbound variable '{name}' in formula '{formula}'")]
    UnboundVariable { name: String, formula: String },

    #[error("type mismatch in formula '{formula}': {message}")]
    TypeMismatch { formula: String, message: String },

    #[error("invalid {section} formula '{formula}': {reason}")]
    InvalidFormula {
        section: String,
        formula: String,
        reason: String,
    },

    #[error("specification is unrealizable: {0}")]
    Unrealizable(String),

    #[error("no winning move from {0}")]
    NoWinningMove(String),

    #[error("input {0} violates the environment assumptions")]
    InputNotAllowed(String),

    #[error("iteration limit of {limit} exceeded in {}", snapshot.phase)]
    IterationLimitExceeded {
        limit: usize,
        snapshot: Box<SolverSnapshot>,
    },

    #[error("solver invariant violated: {0}")]
    InvariantViolation(String),

    #[error("malformed specification file, line {line}: {message}")]
    SpecFormat { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn syntax(text: &str, offset: usize, message: impl Into<String>) -> Self {
        Error::SyntaxError {
            text: text.to_string(),
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(formula: &str, message: impl Into<String>) -> Self {
        Error::TypeMismatch {
            formula: formula.to_string(),
            message: message.into(),
        }
    }
}
