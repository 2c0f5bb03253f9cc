//! Error types for query processing.
//!
//! Lex, parse, and validation errors abort the whole query; there is no
//! partial-success mode. [`PropertyNotFound`] is the one recoverable
//! error: it is raised per candidate during evaluation and only ever
//! causes that candidate to drop out of the match set.

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueryError {
    #[error("no literal matches remaining input at '{0}'")]
    Lex(String),

    #[error("expected {expected}, got {actual}")]
    ExpectedToken { expected: String, actual: String },

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("invalid value '{literal}': {reason}")]
    Validation { literal: String, reason: String },
}

impl QueryError {
    pub fn expected(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        QueryError::ExpectedToken {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn validation(literal: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::Validation {
            literal: literal.into(),
            reason: reason.into(),
        }
    }
}

/// Raised when property extraction finds nothing for a candidate.
/// Never propagates out of `run`; the candidate is excluded instead.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("property not found")]
pub struct PropertyNotFound;

pub type Result<T> = std::result::Result<T, QueryError>;
