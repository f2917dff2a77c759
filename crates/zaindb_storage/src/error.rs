//! Error types for byte stores.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing a byte store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the journal file.
    #[error("journal file is locked by another process: {path}")]
    Locked {
        /// Path of the locked file.
        path: PathBuf,
    },

    /// Attempted to grow the store through `truncate`.
    #[error("cannot truncate to {requested} bytes, store holds {size}")]
    TruncateBeyondEnd {
        /// The requested length.
        requested: u64,
        /// The current length.
        size: u64,
    },
}
