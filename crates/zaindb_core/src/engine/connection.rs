//! Connections, open requests, and the two kinds of transaction.

use crate::engine::catalog::{Catalog, DatabaseCore};
use crate::engine::cursor::Cursor;
use crate::engine::table::Table;
use crate::engine::undo::{rollback, Undo};
use crate::engine::Source;
use crate::error::{CoreError, CoreResult};
use crate::journal::JournalOp;
use crate::key::{Key, KeyPath};
use crate::range::KeyRange;
use ciborium::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// The result of asking a factory for a database.
///
/// If the requested version is above the stored one the caller must run
/// [`OpenRequest::upgrade`] before it gets a connection.
#[derive(Debug)]
pub struct OpenRequest {
    connection: Connection,
    old_version: u32,
    new_version: u32,
}

impl OpenRequest {
    pub(crate) fn new(connection: Connection, old_version: u32, new_version: u32) -> Self {
        Self {
            connection,
            old_version,
            new_version,
        }
    }

    /// Version currently stored; 0 for a database that did not exist.
    #[must_use]
    pub const fn old_version(&self) -> u32 {
        self.old_version
    }

    /// Version requested by the caller.
    #[must_use]
    pub const fn new_version(&self) -> u32 {
        self.new_version
    }

    /// Returns `true` if the schema must be upgraded first.
    #[must_use]
    pub const fn needs_upgrade(&self) -> bool {
        self.new_version > self.old_version
    }

    /// Runs a version-change transaction, then returns the connection.
    ///
    /// `f` sees the schema as it is and may add tables and indexes. The
    /// changes and the new version are journaled together; if `f` fails
    /// nothing is applied. When no upgrade is needed `f` is not called.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, a journal write error, or
    /// [`CoreError::VersionMismatch`] if another connection upgraded past
    /// the requested version in the meantime.
    pub fn upgrade<F>(self, f: F) -> CoreResult<Connection>
    where
        F: FnOnce(&mut VersionChange<'_>) -> CoreResult<()>,
    {
        if !self.needs_upgrade() {
            return Ok(self.connection);
        }

        let core = Arc::clone(&self.connection.core);
        let mut catalog = core.catalog.write();
        if catalog.version > self.new_version {
            return Err(CoreError::VersionMismatch {
                requested: self.new_version,
                stored: catalog.version,
            });
        }
        if catalog.version == self.new_version {
            return Ok(self.connection);
        }

        let mut working = catalog.clone();
        let mut change = VersionChange {
            catalog: &mut working,
            ops: vec![JournalOp::SetVersion {
                version: self.new_version,
            }],
            old_version: self.old_version,
            new_version: self.new_version,
        };
        f(&mut change)?;
        let ops = change.ops;
        working.version = self.new_version;

        core.commit(&ops, &working)?;
        *catalog = working;

        info!(
            db = %core.name,
            from = self.old_version,
            to = self.new_version,
            "schema upgraded"
        );
        drop(catalog);
        Ok(self.connection)
    }

    /// Completes the request, running an empty upgrade if one is needed.
    ///
    /// # Errors
    ///
    /// See [`OpenRequest::upgrade`].
    pub fn finish(self) -> CoreResult<Connection> {
        self.upgrade(|_| Ok(()))
    }
}

/// Schema changes allowed while a database is being upgraded.
pub struct VersionChange<'a> {
    catalog: &'a mut Catalog,
    ops: Vec<JournalOp>,
    old_version: u32,
    new_version: u32,
}

impl VersionChange<'_> {
    /// Version before the upgrade.
    #[must_use]
    pub const fn old_version(&self) -> u32 {
        self.old_version
    }

    /// Version after the upgrade.
    #[must_use]
    pub const fn new_version(&self) -> u32 {
        self.new_version
    }

    /// Returns `true` if the table already exists.
    #[must_use]
    pub fn contains_table(&self, name: &str) -> bool {
        self.catalog.tables.contains_key(name)
    }

    /// Names of the existing tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.catalog.tables.keys().cloned().collect()
    }

    /// Creates a table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableExists`] if the name is taken, or
    /// [`CoreError::Data`] for a key generator on a compound key path.
    pub fn create_table(
        &mut self,
        name: &str,
        key_path: KeyPath,
        auto_increment: bool,
    ) -> CoreResult<()> {
        if name.is_empty() {
            return Err(CoreError::invalid_argument("table name is empty"));
        }
        self.record(JournalOp::CreateTable {
            name: name.to_string(),
            key_path,
            auto_increment,
        })
    }

    /// Creates an index on an existing table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableNotFound`] or [`CoreError::IndexExists`].
    pub fn create_index(&mut self, table: &str, name: &str, key_path: KeyPath) -> CoreResult<()> {
        self.record(JournalOp::CreateIndex {
            table: table.to_string(),
            name: name.to_string(),
            key_path,
        })
    }

    fn record(&mut self, op: JournalOp) -> CoreResult<()> {
        self.catalog.apply(op.clone())?;
        self.ops.push(op);
        Ok(())
    }
}

/// A connection to one open database.
///
/// Connections are cheap to clone; every clone sees the same tables.
#[derive(Clone)]
pub struct Connection {
    pub(crate) core: Arc<DatabaseCore>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.core.name)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Current schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.core.catalog.read().version
    }

    /// Names of all tables, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.core.catalog.read().tables.keys().cloned().collect()
    }

    /// Names of the indexes on `table`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableNotFound`] if the table does not exist.
    pub fn index_names(&self, table: &str) -> CoreResult<Vec<String>> {
        let catalog = self.core.catalog.read();
        catalog
            .tables
            .get(table)
            .map(Table::index_names)
            .ok_or_else(|| CoreError::table_not_found(table))
    }

    /// Number of records in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableNotFound`] if the table does not exist.
    pub fn count(&self, table: &str) -> CoreResult<usize> {
        let catalog = self.core.catalog.read();
        catalog
            .tables
            .get(table)
            .map(Table::len)
            .ok_or_else(|| CoreError::table_not_found(table))
    }

    /// Opens a read cursor over a table or one of its indexes.
    ///
    /// `None` scans everything; an empty range yields nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableNotFound`] or [`CoreError::IndexNotFound`].
    pub fn open_cursor(
        &self,
        table: &str,
        source: Source<'_>,
        range: Option<&KeyRange>,
    ) -> CoreResult<Cursor> {
        let catalog = self.core.catalog.read();
        let t = catalog
            .tables
            .get(table)
            .ok_or_else(|| CoreError::table_not_found(table))?;

        let entries = match source {
            Source::Table => t.scan(range),
            Source::Index(name) => t
                .scan_index(name, range)
                .ok_or_else(|| CoreError::index_not_found(table, name))?,
        };
        Ok(Cursor::new(entries))
    }

    /// Runs a read-write transaction over `scope`.
    ///
    /// Changes are applied in place under the catalog lock, with an undo
    /// record for each. If `f` succeeds the changes are journaled; if `f`
    /// or the journal write fails they are undone before the lock is
    /// released, so readers never see them.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty scope,
    /// [`CoreError::TableNotFound`] for an unknown table, the error from
    /// `f`, or a journal write error.
    pub fn write<R, F>(&self, scope: &[&str], f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> CoreResult<R>,
    {
        if scope.is_empty() {
            return Err(CoreError::invalid_argument("transaction scope is empty"));
        }

        let mut catalog = self.core.catalog.write();
        if let Some(missing) = scope.iter().find(|name| !catalog.tables.contains_key(**name)) {
            return Err(CoreError::table_not_found(*missing));
        }

        let mut txn = WriteTxn {
            tables: &mut catalog.tables,
            scope,
            ops: Vec::new(),
            undo: Vec::new(),
        };
        let result = f(&mut txn);
        let WriteTxn { ops, undo, .. } = txn;

        let committed = result.and_then(|output| {
            self.core.commit(&ops, &catalog)?;
            Ok(output)
        });
        if committed.is_err() {
            rollback(&mut catalog.tables, undo);
        }
        committed
    }

    /// Rewrites the journal as a snapshot of the current tables.
    ///
    /// Happens on its own once the journal has doubled since the last
    /// checkpoint; this forces one. Does nothing for in-memory databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written. The previous
    /// journal is kept in that case.
    pub fn checkpoint(&self) -> CoreResult<()> {
        let catalog = self.core.catalog.read();
        self.core.checkpoint(&catalog)
    }

    /// Size of the journal in bytes, `None` for in-memory databases.
    #[must_use]
    pub fn journal_size(&self) -> Option<u64> {
        self.core.journal_size()
    }
}

/// Operations available inside [`Connection::write`].
pub struct WriteTxn<'a> {
    tables: &'a mut BTreeMap<String, Table>,
    scope: &'a [&'a str],
    ops: Vec<JournalOp>,
    undo: Vec<Undo>,
}

impl WriteTxn<'_> {
    /// Inserts a record. `key` is only given for tables with out-of-line keys.
    ///
    /// Returns the record's primary key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Constraint`] if the key exists, or
    /// [`CoreError::Data`] if no valid key can be found or generated.
    pub fn add(&mut self, table: &str, value: Value, key: Option<Key>) -> CoreResult<Key> {
        self.store(table, value, key, false)
    }

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Data`] if no valid key can be found or generated.
    pub fn put(&mut self, table: &str, value: Value, key: Option<Key>) -> CoreResult<Key> {
        self.store(table, value, key, true)
    }

    fn store(
        &mut self,
        table: &str,
        mut value: Value,
        key: Option<Key>,
        overwrite: bool,
    ) -> CoreResult<Key> {
        let t = scoped(self.tables, self.scope, table)?;
        let generator = t.next_key();
        let stored = match t.assign_key(&mut value, key) {
            Ok(key) => t
                .store(key.clone(), value.clone(), overwrite)
                .map(|previous| (key, previous)),
            Err(e) => Err(e),
        };
        if t.next_key() != generator {
            self.undo.push(Undo::Generator {
                table: table.to_string(),
                next_key: generator,
            });
        }

        let (key, previous) = stored?;
        self.undo.push(Undo::Record {
            table: table.to_string(),
            key: key.clone(),
            previous,
        });
        self.ops.push(JournalOp::Put {
            table: table.to_string(),
            key: key.clone(),
            value,
        });
        Ok(key)
    }

    /// Deletes every record whose primary key is in `range`.
    ///
    /// Returns how many records were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not in scope.
    pub fn delete(&mut self, table: &str, range: &KeyRange) -> CoreResult<usize> {
        let t = scoped(self.tables, self.scope, table)?;
        let keys = t.keys_in(Some(range));
        for key in &keys {
            if let Some(previous) = t.remove(key) {
                self.undo.push(Undo::Record {
                    table: table.to_string(),
                    key: key.clone(),
                    previous: Some(previous),
                });
            }
        }
        self.ops.extend(keys.iter().map(|key| JournalOp::Delete {
            table: table.to_string(),
            key: key.clone(),
        }));
        Ok(keys.len())
    }

    /// Removes every record from `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not in scope.
    pub fn clear(&mut self, table: &str) -> CoreResult<()> {
        let records = scoped(self.tables, self.scope, table)?.take_records();
        self.undo.push(Undo::Refill {
            table: table.to_string(),
            records,
        });
        self.ops.push(JournalOp::Clear {
            table: table.to_string(),
        });
        Ok(())
    }
}

fn scoped<'t>(
    tables: &'t mut BTreeMap<String, Table>,
    scope: &[&str],
    name: &str,
) -> CoreResult<&'t mut Table> {
    if !scope.contains(&name) {
        return Err(CoreError::invalid_operation(format!(
            "table {name} is not in the transaction scope"
        )));
    }
    tables
        .get_mut(name)
        .ok_or_else(|| CoreError::table_not_found(name))
}
