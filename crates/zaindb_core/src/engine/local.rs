//! The bundled factory: in-memory tables, journaled per database when
//! backed by a directory.

use crate::engine::catalog::DatabaseCore;
use crate::engine::connection::{Connection, OpenRequest};
use crate::engine::DatabaseFactory;
use crate::error::{CoreError, CoreResult};
use crate::journal::DEFAULT_CHECKPOINT_BYTES;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use zaindb_storage::FileStore;

/// Journal file extension.
const JOURNAL_EXTENSION: &str = "zdb";

/// Where a [`LocalFactory`] keeps its journals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Databases live in memory, are never journaled, and vanish with
    /// the factory.
    Memory,
    /// One `<name>.zdb` file per database under this directory.
    Directory(PathBuf),
}

/// Opens databases held in memory and journaled to a [`Location`].
///
/// A database is loaded once, on its first open, and shared by every
/// later connection to the same name.
///
/// # Example
///
/// ```rust
/// use zaindb_core::{DatabaseFactory, KeyPath, LocalFactory};
///
/// let factory = LocalFactory::in_memory();
/// let conn = factory
///     .open("demo", 1)
///     .unwrap()
///     .upgrade(|change| change.create_table("notes", KeyPath::Single("id".into()), true))
///     .unwrap();
/// assert_eq!(conn.table_names(), vec!["notes".to_string()]);
/// ```
#[derive(Debug)]
pub struct LocalFactory {
    location: Location,
    sync_on_commit: bool,
    checkpoint_bytes: u64,
    databases: Mutex<HashMap<String, Arc<DatabaseCore>>>,
}

impl LocalFactory {
    /// Creates a factory for `location`.
    #[must_use]
    pub fn new(location: Location) -> Self {
        Self {
            location,
            sync_on_commit: true,
            checkpoint_bytes: DEFAULT_CHECKPOINT_BYTES,
            databases: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a factory whose databases live in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Location::Memory)
    }

    /// Creates a factory keeping one journal file per database in `dir`.
    #[must_use]
    pub fn in_directory(dir: impl Into<PathBuf>) -> Self {
        Self::new(Location::Directory(dir.into()))
    }

    /// Sets whether every commit is synced to disk.
    #[must_use]
    pub fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the journal size below which no checkpoint is taken.
    ///
    /// Past it, a journal is rewritten as a snapshot whenever it has
    /// doubled since its last checkpoint. Defaults to
    /// [`DEFAULT_CHECKPOINT_BYTES`].
    #[must_use]
    pub fn checkpoint_bytes(mut self, bytes: u64) -> Self {
        self.checkpoint_bytes = bytes;
        self
    }

    /// Returns where journals are kept.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Path of the journal for `name`, for directory factories.
    #[must_use]
    pub fn database_path(&self, name: &str) -> Option<PathBuf> {
        match &self.location {
            Location::Memory => None,
            Location::Directory(dir) => Some(journal_path(dir, name)),
        }
    }

    /// Forgets a database and removes its journal.
    ///
    /// Connections that are still open keep working on their copy, but
    /// nothing they write survives.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal file exists but cannot be removed.
    pub fn delete_database(&self, name: &str) -> CoreResult<()> {
        let removed = self.databases.lock().remove(name);
        drop(removed);

        if let Some(path) = self.database_path(name) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(zaindb_storage::StorageError::from(e).into()),
            }
        }
        info!(db = name, "database deleted");
        Ok(())
    }

    fn load(&self, name: &str) -> CoreResult<Arc<DatabaseCore>> {
        let mut databases = self.databases.lock();
        if let Some(core) = databases.get(name) {
            return Ok(Arc::clone(core));
        }

        let core = match &self.location {
            Location::Memory => DatabaseCore::ephemeral(name),
            Location::Directory(dir) => {
                let store = FileStore::open_with_create_dirs(&journal_path(dir, name))?;
                DatabaseCore::load(
                    name,
                    Box::new(store),
                    self.sync_on_commit,
                    self.checkpoint_bytes,
                )?
            }
        };
        let core = Arc::new(core);
        debug!(db = name, location = ?self.location, "database loaded");

        databases.insert(name.to_string(), Arc::clone(&core));
        Ok(core)
    }
}

impl DatabaseFactory for LocalFactory {
    fn open(&self, name: &str, version: u32) -> CoreResult<OpenRequest> {
        if name.is_empty() {
            return Err(CoreError::invalid_argument("database name is empty"));
        }
        if version == 0 {
            return Err(CoreError::invalid_argument("database version must be at least 1"));
        }

        let core = self.load(name)?;
        let stored = core.catalog.read().version;
        if version < stored {
            return Err(CoreError::VersionMismatch {
                requested: version,
                stored,
            });
        }

        Ok(OpenRequest::new(Connection { core }, stored, version))
    }
}

fn journal_path(dir: &Path, name: &str) -> PathBuf {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{stem}.{JOURNAL_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Source;
    use crate::key::{Key, KeyPath};
    use crate::range::KeyRange;
    use ciborium::Value;
    use tempfile::tempdir;

    fn note(text: &str) -> Value {
        Value::Map(vec![(Value::Text("text".into()), Value::Text(text.into()))])
    }

    fn open_notes(factory: &LocalFactory) -> Connection {
        factory
            .open("notes", 1)
            .unwrap()
            .upgrade(|change| {
                change.create_table("notes", KeyPath::Single("id".into()), true)?;
                change.create_index("notes", "text", KeyPath::Single("text".into()))
            })
            .unwrap()
    }

    fn texts(conn: &Connection) -> Vec<String> {
        conn.open_cursor("notes", Source::Table, None)
            .unwrap()
            .filter_map(|entry| {
                KeyPath::Single("text".into())
                    .evaluate(&entry.value)
                    .and_then(|k| match k {
                        Key::String(s) => Some(s),
                        _ => None,
                    })
            })
            .collect()
    }

    #[test]
    fn rejects_bad_arguments() {
        let factory = LocalFactory::in_memory();
        assert!(matches!(
            factory.open("notes", 0),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            factory.open("", 1),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn fresh_database_needs_upgrade() {
        let factory = LocalFactory::in_memory();
        let request = factory.open("notes", 3).unwrap();
        assert_eq!(request.old_version(), 0);
        assert!(request.needs_upgrade());

        let conn = request.finish().unwrap();
        assert_eq!(conn.version(), 3);
        assert!(!factory.open("notes", 3).unwrap().needs_upgrade());
    }

    #[test]
    fn downgrade_is_a_version_mismatch() {
        let factory = LocalFactory::in_memory();
        factory.open("notes", 2).unwrap().finish().unwrap();
        assert!(matches!(
            factory.open("notes", 1),
            Err(CoreError::VersionMismatch {
                requested: 1,
                stored: 2
            })
        ));
    }

    #[test]
    fn failed_upgrade_changes_nothing() {
        let factory = LocalFactory::in_memory();
        let result = factory.open("notes", 1).unwrap().upgrade(|change| {
            change.create_table("notes", KeyPath::None, false)?;
            change.create_index("missing", "x", KeyPath::Single("x".into()))
        });
        assert!(matches!(result, Err(CoreError::TableNotFound { .. })));

        let request = factory.open("notes", 1).unwrap();
        assert_eq!(request.old_version(), 0);
        assert!(request.finish().unwrap().table_names().is_empty());
    }

    #[test]
    fn failed_transaction_is_rolled_back() {
        let factory = LocalFactory::in_memory();
        let conn = open_notes(&factory);

        let result = conn.write(&["notes"], |txn| {
            txn.add("notes", note("first"), None)?;
            txn.add("notes", Value::Bool(false), None)
        });
        assert!(result.is_err());
        assert!(texts(&conn).is_empty());
        assert_eq!(conn.count("notes").unwrap(), 0);
    }

    #[test]
    fn failed_transaction_undoes_every_kind_of_change() {
        let factory = LocalFactory::in_memory();
        let conn = open_notes(&factory);
        conn.write(&["notes"], |txn| {
            for text in ["a", "b", "c"] {
                txn.add("notes", note(text), None)?;
            }
            Ok(())
        })
        .unwrap();

        let result: CoreResult<()> = conn.write(&["notes"], |txn| {
            let changed = Value::Map(vec![
                (Value::Text("id".into()), Value::Integer(1.into())),
                (Value::Text("text".into()), Value::Text("changed".into())),
            ]);
            txn.put("notes", changed, None)?;
            txn.delete("notes", &KeyRange::only(Key::from(2)))?;
            txn.add("notes", note("extra"), None)?;
            txn.clear("notes")?;
            txn.add("notes", note("after-clear"), None)?;
            Err(CoreError::invalid_operation("abandoned"))
        });
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));

        assert_eq!(texts(&conn), vec!["a", "b", "c"]);
        let changed = conn
            .open_cursor(
                "notes",
                Source::Index("text"),
                Some(&KeyRange::only(Key::from("changed"))),
            )
            .unwrap()
            .count();
        assert_eq!(changed, 0);
        let by_text: Vec<Key> = conn
            .open_cursor("notes", Source::Index("text"), None)
            .unwrap()
            .map(|entry| entry.primary_key)
            .collect();
        assert_eq!(by_text, vec![Key::from(1), Key::from(2), Key::from(3)]);

        let key = conn
            .write(&["notes"], |txn| txn.add("notes", note("d"), None))
            .unwrap();
        assert_eq!(key, Key::from(4));
    }

    #[test]
    fn memory_databases_are_not_journaled() {
        let factory = LocalFactory::in_memory();
        let conn = open_notes(&factory);
        conn.write(&["notes"], |txn| txn.add("notes", note("a"), None))
            .unwrap();
        assert_eq!(conn.journal_size(), None);
        conn.checkpoint().unwrap();
    }

    #[test]
    fn write_scope_is_enforced() {
        let factory = LocalFactory::in_memory();
        let conn = open_notes(&factory);

        assert!(matches!(
            conn.write(&[], |_| Ok(())),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            conn.write(&["ghosts"], |_| Ok(())),
            Err(CoreError::TableNotFound { .. })
        ));
    }

    #[test]
    fn index_cursor_and_missing_index() {
        let factory = LocalFactory::in_memory();
        let conn = open_notes(&factory);
        conn.write(&["notes"], |txn| {
            txn.add("notes", note("b"), None)?;
            txn.add("notes", note("a"), None)
        })
        .unwrap();

        let by_text: Vec<Key> = conn
            .open_cursor("notes", Source::Index("text"), None)
            .unwrap()
            .map(|entry| entry.primary_key)
            .collect();
        assert_eq!(by_text, vec![Key::from(2), Key::from(1)]);

        assert!(matches!(
            conn.open_cursor("notes", Source::Index("nope"), None),
            Err(CoreError::IndexNotFound { .. })
        ));
    }

    #[test]
    fn journal_survives_restart() {
        let dir = tempdir().unwrap();

        {
            let factory = LocalFactory::in_directory(dir.path());
            let conn = open_notes(&factory);
            conn.write(&["notes"], |txn| {
                txn.add("notes", note("kept"), None)?;
                txn.add("notes", note("gone"), None)?;
                txn.delete("notes", &KeyRange::only(Key::from(2)))
            })
            .unwrap();
        }

        let factory = LocalFactory::in_directory(dir.path());
        let request = factory.open("notes", 1).unwrap();
        assert!(!request.needs_upgrade());
        let conn = request.finish().unwrap();
        assert_eq!(texts(&conn), vec!["kept".to_string()]);
        assert_eq!(conn.index_names("notes").unwrap(), vec!["text".to_string()]);

        let key = conn
            .write(&["notes"], |txn| txn.add("notes", note("next"), None))
            .unwrap();
        assert_eq!(key, Key::from(3));
    }

    #[test]
    fn cleared_journal_shrinks_and_keeps_generator() {
        let dir = tempdir().unwrap();
        let body = "x".repeat(100);
        let grown = {
            let factory = LocalFactory::in_directory(dir.path())
                .sync_on_commit(false)
                .checkpoint_bytes(4096);
            let conn = open_notes(&factory);
            for _ in 0..200 {
                conn.write(&["notes"], |txn| txn.add("notes", note(&body), None))
                    .unwrap();
            }
            let grown = conn.journal_size().unwrap();
            conn.write(&["notes"], |txn| txn.clear("notes")).unwrap();
            conn.checkpoint().unwrap();
            assert!(conn.journal_size().unwrap() < grown / 10);

            conn.write(&["notes"], |txn| {
                for _ in 0..100 {
                    txn.add("notes", note(&body), None)?;
                }
                txn.clear("notes")
            })
            .unwrap();
            grown
        };

        let factory = LocalFactory::in_directory(dir.path()).checkpoint_bytes(4096);
        let conn = factory.open("notes", 1).unwrap().finish().unwrap();
        assert!(conn.journal_size().unwrap() < grown / 10);
        assert_eq!(conn.count("notes").unwrap(), 0);
        assert_eq!(conn.index_names("notes").unwrap(), vec!["text".to_string()]);

        let key = conn
            .write(&["notes"], |txn| txn.add("notes", note("next"), None))
            .unwrap();
        assert_eq!(key, Key::from(301));
    }

    #[test]
    fn second_factory_on_same_directory_is_locked_out() {
        let dir = tempdir().unwrap();
        let first = LocalFactory::in_directory(dir.path());
        let _conn = open_notes(&first);

        let second = LocalFactory::in_directory(dir.path());
        assert!(matches!(
            second.open("notes", 1),
            Err(CoreError::Storage(zaindb_storage::StorageError::Locked { .. }))
        ));
    }

    #[test]
    fn delete_database_starts_over() {
        let dir = tempdir().unwrap();
        let factory = LocalFactory::in_directory(dir.path());
        open_notes(&factory);
        let path = factory.database_path("notes").unwrap();
        assert!(path.exists());

        factory.delete_database("notes").unwrap();
        assert!(!path.exists());
        assert_eq!(factory.open("notes", 1).unwrap().old_version(), 0);
    }

    #[test]
    fn names_are_sanitized() {
        let path = journal_path(Path::new("/tmp"), "zain/Log Store");
        assert_eq!(path, PathBuf::from("/tmp/zain_Log_Store.zdb"));
    }
}
