//! Error types for the board stores.

use thiserror::Error;
use zaindb_core::CoreError;

/// Result type for board operations.
pub type BoardResult<T> = Result<T, BoardError>;

/// Errors raised by the board layer.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Engine error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An id filter expression could not be parsed.
    #[error("invalid id filter '{input}': {reason}")]
    InvalidFilter {
        /// The expression as given.
        input: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl BoardError {
    /// Creates an invalid filter error.
    pub fn invalid_filter(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
