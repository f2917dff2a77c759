//! Error types for ZainDB core.

use crate::state::ConnectionState;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ZainDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] zaindb_storage::StorageError),

    /// A journal frame could not be encoded.
    #[error("encoding error: {message}")]
    Encoding {
        /// Description of the failure.
        message: String,
    },

    /// Journal is corrupted or cannot be replayed.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The platform has no storage facility.
    #[error("storage is not supported on this platform")]
    NotSupported,

    /// An operation was issued while the connection was not open.
    #[error("database is not open (state: {state})")]
    NotOpen {
        /// State observed by the guard.
        state: ConnectionState,
    },

    /// A required argument was missing or empty.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the bad argument.
        message: String,
    },

    /// Table not found.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Name of the table.
        name: String,
    },

    /// Table already exists.
    #[error("table already exists: {name}")]
    TableExists {
        /// Name of the table.
        name: String,
    },

    /// Index not found.
    #[error("index not found: {name} on table {table}")]
    IndexNotFound {
        /// Table searched.
        table: String,
        /// Name of the index.
        name: String,
    },

    /// Index already exists.
    #[error("index already exists: {name} on table {table}")]
    IndexExists {
        /// Table holding the index.
        table: String,
        /// Name of the index.
        name: String,
    },

    /// Requested version is lower than the stored one.
    #[error("requested version {requested} is lower than stored version {stored}")]
    VersionMismatch {
        /// Version passed to open.
        requested: u32,
        /// Version found in the journal.
        stored: u32,
    },

    /// A uniqueness constraint was violated.
    #[error("constraint error: {message}")]
    Constraint {
        /// Description of the violation.
        message: String,
    },

    /// A record or key could not be used as given.
    #[error("data error: {message}")]
    Data {
        /// Description of the problem.
        message: String,
    },

    /// A record could not be converted to or from a stored value.
    #[error("record conversion failed: {message}")]
    Record {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }

    /// Creates an index not found error.
    pub fn index_not_found(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::IndexNotFound {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Creates a record conversion error.
    pub fn record(message: impl Into<String>) -> Self {
        Self::Record {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` for errors raised before any engine work is issued.
    ///
    /// Callback-style operations abort silently on these: the failure is
    /// logged and the callback is never invoked.
    #[must_use]
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            Self::NotOpen { .. } | Self::InvalidArgument { .. } | Self::NotSupported
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_errors_are_classified() {
        assert!(CoreError::NotSupported.is_guard());
        assert!(CoreError::invalid_argument("table name is empty").is_guard());
        assert!(CoreError::NotOpen {
            state: ConnectionState::Opening
        }
        .is_guard());
        assert!(!CoreError::constraint("duplicate key").is_guard());
        assert!(!CoreError::table_not_found("messages").is_guard());
    }

    #[test]
    fn messages_name_the_subject() {
        let err = CoreError::index_not_found("messages", "mail");
        assert_eq!(err.to_string(), "index not found: mail on table messages");

        let err = CoreError::NotOpen {
            state: ConnectionState::Failed { retries: 4 },
        };
        assert_eq!(
            err.to_string(),
            "database is not open (state: failed after 4 attempts)"
        );
    }
}
