//! Error types for arcfind
//!
//! Two error categories flow through the crate:
//!
//! - Query errors ([`ParseError`], [`EvalError`]) are fatal: the predicate
//!   is rejected, or the walk terminates on the first occurrence.
//! - Traversal errors ([`WalkError`]) are non-fatal by default: they are
//!   routed to the policy error sink and the walk continues with the next
//!   sibling, unless `stop_on_error` is set.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for arcfind
#[derive(Error, Debug)]
pub enum Error {
    /// Predicate rejected by the parser
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Predicate failed during evaluation
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Traversal failure promoted to fatal by `stop_on_error`
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejection of a predicate string. No recovery is attempted; the whole
/// query is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at byte {position})")]
pub struct ParseError {
    /// Byte offset into the query string
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Typed evaluation failures. These are query errors: the first one
/// terminates a running walk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Operands of incompatible types reached a comparison
    #[error("cannot compare {left} with {right} using '{op}'")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// A literal compared against `date` did not look like a date
    #[error("'{literal}' is not a date (expected YYYY, YYYY-MM or YYYY-MM-DD)")]
    MalformedDate { literal: String },

    /// A literal compared against `time` did not look like a time
    #[error("'{literal}' is not a time (expected HH:MM or HH:MM:SS)")]
    MalformedTime { literal: String },

    /// A LIKE/RLIKE pattern failed to compile
    #[error("invalid pattern '{pattern}': {reason}")]
    BadPattern { pattern: String, reason: String },
}

/// Non-fatal traversal failures, routed to the policy error sink
#[derive(Error, Debug)]
pub enum WalkError {
    /// Directory open or read failed
    #[error("failed to read directory '{path}': {reason}")]
    ReadDir { path: PathBuf, reason: String },

    /// Stat call failed
    #[error("failed to stat '{path}': {reason}")]
    Stat { path: PathBuf, reason: String },

    /// Archive could not be opened or enumerated
    #[error("failed to read archive '{path}': {reason}")]
    Archive { path: PathBuf, reason: String },

    /// Container kind recognized but its backend is not compiled in
    #[error("{kind} support is not compiled in (enable the '{feature}' feature): '{path}'")]
    MissingBackend {
        kind: &'static str,
        feature: &'static str,
        path: PathBuf,
    },
}

/// Result type alias for arcfind
pub type Result<T> = std::result::Result<T, Error>;
