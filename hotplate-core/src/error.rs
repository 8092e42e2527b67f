//! Error type shared by cells, the grid and the display mapping helpers.

use std::error::Error;
use std::fmt;

/// Errors raised by hotplate operations.
///
/// All of them are synchronous and local to the call that produced them.
/// Nothing is clamped or retried.
#[derive(Clone, Debug, PartialEq)]
pub enum HotplateError {
    /// A configuration value is outside its valid range
    /// (heat constant not in `(0.0, 1.0]`, empty grid dimension, ...).
    InvalidParameter {
        /// Which parameter was rejected.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// A grid coordinate lies outside the grid.
    OutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    /// An operation was invoked in a state that a correct caller never
    /// produces: stepping an unwired cell, starting an unwired grid,
    /// rewiring a running grid.
    PreconditionViolation {
        /// Description of the violated precondition.
        reason: String,
    },
    /// The OS refused to start an update thread.
    Spawn {
        /// Underlying I/O error message.
        reason: String,
    },
}

impl HotplateError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HotplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter '{name}': {reason}")
            }
            Self::OutOfRange {
                row,
                col,
                rows,
                cols,
            } => write!(
                f,
                "coordinate ({row}, {col}) is outside the {rows}x{cols} grid"
            ),
            Self::PreconditionViolation { reason } => {
                write!(f, "precondition violated: {reason}")
            }
            Self::Spawn { reason } => write!(f, "failed to spawn update thread: {reason}"),
        }
    }
}

impl Error for HotplateError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HotplateError>;
