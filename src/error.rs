//! Error types for the policy engine.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::parser::ParseError;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Budget that stopped a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// More solutions than the caller allowed
    Solutions(usize),
    /// More resolution steps than the caller allowed
    Inferences(u64),
    /// The query ran past its deadline
    Time(Duration),
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Solutions(n) => write!(f, "more than {n} solutions"),
            Limit::Inferences(n) => write!(f, "more than {n} inferences"),
            Limit::Time(d) => write!(f, "ran longer than {d:?}"),
        }
    }
}

/// Errors surfaced by loading, querying and configuring the engine.
///
/// A query with no solutions is not an error.
#[derive(Error, Debug)]
pub enum Error {
    /// The policy text is malformed; the previous policy stays active.
    #[error("policy syntax error at {0}")]
    PolicySyntax(ParseError),

    /// The query goal is malformed.
    #[error("goal syntax error at {0}")]
    GoalSyntax(ParseError),

    /// A query exceeded its budget.
    #[error("resolution stopped: {0}")]
    ResolutionLimit(Limit),

    /// A goal was an unbound variable at the time it was called.
    #[error("instantiation error: {0}")]
    Instantiation(String),

    /// A builtin got an argument of the wrong kind.
    #[error("type error: expected {expected}, found {found}")]
    Type {
        /// Kind of term the builtin needs
        expected: &'static str,
        /// Rendering of the offending term
        found: String,
    },

    /// Policy bytes are not valid UTF-8.
    #[error("policy is not valid UTF-8 after byte {offset}")]
    Encoding {
        /// Length of the valid prefix
        offset: usize,
    },

    /// Reading a policy stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration document could not be read.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
