//! In-memory byte store.

use crate::error::{StorageError, StorageResult};
use crate::store::ByteStore;
use parking_lot::RwLock;
use std::sync::Arc;

/// A byte store that lives as long as the process.
///
/// Clones share the same buffer, which lets a factory hand the same
/// journal to every connection opened on one database name, the way a
/// browser keeps an origin's databases between page loads.
///
/// # Example
///
/// ```rust
/// use zaindb_storage::{ByteStore, MemoryStore};
///
/// let mut store = MemoryStore::new();
/// let view = store.clone();
/// store.append(b"abc").unwrap();
/// assert_eq!(view.len().unwrap(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding pre-existing journal bytes.
    ///
    /// Useful for replaying hand-built or damaged journals in tests.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }
}

impl ByteStore for MemoryStore {
    fn len(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        Ok(self.data.read().clone())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_len > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_len,
                size,
            });
        }
        data.truncate(new_len as usize);
        Ok(())
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        *self.data.write() = bytes.to_vec();
        Ok(())
    }
}
