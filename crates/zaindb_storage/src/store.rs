//! Byte store trait definition.

use crate::error::StorageResult;

/// An append-only byte log holding one database journal.
///
/// # Invariants
///
/// - `append` returns the offset the bytes were written at
/// - `read_all` returns every byte appended and not truncated, in order
/// - `truncate` only shrinks; it is how a torn journal tail is dropped
/// - `replace` swaps the whole content at once; a crash leaves either the
///   old bytes or the new ones
/// - Stores must be `Send + Sync` so a database can live behind an `Arc`
pub trait ByteStore: Send + Sync {
    /// Returns the number of bytes held.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn len(&self) -> StorageResult<u64>;

    /// Returns `true` if nothing has been appended yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads the whole log.
    ///
    /// Journals are replayed in one pass when a database is first opened,
    /// so there is no partial-read API.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it starts at.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Makes every appended byte durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Shrinks the log to `new_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TruncateBeyondEnd`](crate::StorageError::TruncateBeyondEnd)
    /// if `new_len` is larger than the current length.
    fn truncate(&mut self, new_len: u64) -> StorageResult<()>;

    /// Replaces everything held with `data`.
    ///
    /// Used to rewrite a journal as a compact snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the new content cannot be written. The old
    /// content is left in place in that case.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;
}
