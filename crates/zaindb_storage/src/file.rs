//! File-backed byte store.

use crate::error::{StorageError, StorageResult};
use crate::store::ByteStore;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Extension of the file a journal is rewritten into before the rename.
const TEMP_EXTENSION: &str = "tmp";

/// A journal file on disk.
///
/// The file is exclusively locked for as long as the store is alive, so
/// two processes can never interleave frames in one journal. A second
/// open fails with [`StorageError::Locked`], which the engine treats as a
/// transient open failure.
///
/// # Durability
///
/// - `append` writes through to the OS
/// - `sync` calls `File::sync_all()`
/// - `replace` writes a locked temporary file, syncs it, and renames it
///   over the journal
///
/// # Example
///
/// ```no_run
/// use zaindb_storage::{ByteStore, FileStore};
/// use std::path::Path;
///
/// let mut store = FileStore::open(Path::new("messages.zdb")).unwrap();
/// store.append(b"frame").unwrap();
/// store.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
}

impl FileStore {
    /// Opens or creates the journal at `path` and locks it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or
    /// [`StorageError::Locked`] if another process holds it.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
        })
    }

    /// Opens the journal, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be opened and locked.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStore for FileStore {
    fn len(&self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let file = self.file.get_mut();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        file.flush()?;
        self.size += data.len() as u64;

        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.get_mut().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        if new_len > self.size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_len,
                size: self.size,
            });
        }

        let file = self.file.get_mut();
        file.set_len(new_len)?;
        file.sync_all()?;
        self.size = new_len;

        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let temp_path = self.path.with_extension(TEMP_EXTENSION);
        let file = match write_locked(&temp_path, data) {
            Ok(file) => file,
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                return Err(e);
            }
        };
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }

        let old = std::mem::replace(self.file.get_mut(), file);
        let _ = FileExt::unlock(&old);
        self.size = data.len() as u64;

        sync_directory(&self.path)
    }
}

/// Creates `path` holding exactly `data`, synced and exclusively locked.
fn write_locked(path: &Path, data: &[u8]) -> StorageResult<File> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    if file.try_lock_exclusive().is_err() {
        return Err(StorageError::Locked {
            path: path.to_path_buf(),
        });
    }
    file.write_all(data)?;
    file.sync_all()?;
    Ok(file)
}

/// Makes a rename in the parent directory of `path` durable.
#[cfg(unix)]
fn sync_directory(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> StorageResult<()> {
    Ok(())
}

impl Drop for FileStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&*self.file.get_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.zdb");

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.zdb");

        let mut store = FileStore::open(&path).unwrap();
        assert_eq!(store.append(b"one").unwrap(), 0);
        assert_eq!(store.append(b"two").unwrap(), 3);
        assert_eq!(store.read_all().unwrap(), b"onetwo");
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.zdb");

        {
            let mut store = FileStore::open(&path).unwrap();
            store.append(b"durable").unwrap();
            store.sync().unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 7);
        assert_eq!(store.read_all().unwrap(), b"durable");
    }

    #[test]
    fn create_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("db.zdb");

        let store = FileStore::open_with_create_dirs(&path).unwrap();
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn truncate_shrinks_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.zdb");

        let mut store = FileStore::open(&path).unwrap();
        store.append(b"good-torn").unwrap();
        store.truncate(4).unwrap();
        assert_eq!(store.read_all().unwrap(), b"good");
        assert!(store.truncate(100).is_err());
    }

    #[test]
    fn replace_rewrites_and_keeps_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.zdb");

        let mut store = FileStore::open(&path).unwrap();
        store.append(b"long-history-of-frames").unwrap();
        store.replace(b"snap").unwrap();
        assert_eq!(store.len().unwrap(), 4);
        assert_eq!(store.read_all().unwrap(), b"snap");
        assert!(!dir.path().join("db.tmp").exists());

        store.append(b"+1").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StorageError::Locked { .. })
        ));
        drop(store);

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.read_all().unwrap(), b"snap+1");
    }
}
