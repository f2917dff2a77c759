//! Shared per-database state: the table catalog and its journal.

use crate::engine::table::Table;
use crate::error::{CoreError, CoreResult};
use crate::journal::{Journal, JournalOp};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use zaindb_storage::ByteStore;

/// Version and tables of one database.
#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    pub(crate) version: u32,
    pub(crate) tables: BTreeMap<String, Table>,
}

impl Catalog {
    pub(crate) fn table_mut(&mut self, name: &str) -> CoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| CoreError::table_not_found(name))
    }

    /// Applies one journaled change.
    pub(crate) fn apply(&mut self, op: JournalOp) -> CoreResult<()> {
        match op {
            JournalOp::SetVersion { version } => self.version = version,
            JournalOp::CreateTable {
                name,
                key_path,
                auto_increment,
            } => {
                if self.tables.contains_key(&name) {
                    return Err(CoreError::TableExists { name });
                }
                let table = Table::new(key_path, auto_increment)?;
                self.tables.insert(name, table);
            }
            JournalOp::CreateIndex {
                table,
                name,
                key_path,
            } => self.table_mut(&table)?.create_index(&table, &name, key_path)?,
            JournalOp::Put { table, key, value } => {
                self.table_mut(&table)?.store(key, value, true)?;
            }
            JournalOp::Delete { table, key } => {
                self.table_mut(&table)?.remove(&key);
            }
            JournalOp::Clear { table } => self.table_mut(&table)?.clear(),
            JournalOp::SetGenerator { table, next_key } => {
                self.table_mut(&table)?.restore_generator(next_key);
            }
        }
        Ok(())
    }

    /// Operations that rebuild this catalog from nothing.
    pub(crate) fn snapshot(&self) -> Vec<JournalOp> {
        let mut ops = vec![JournalOp::SetVersion {
            version: self.version,
        }];
        for (name, table) in &self.tables {
            table.snapshot(name, &mut ops);
        }
        ops
    }
}

/// One database as held by a factory; shared by all its connections.
///
/// Lock order is catalog, then journal.
#[derive(Debug)]
pub(crate) struct DatabaseCore {
    pub(crate) name: String,
    pub(crate) catalog: RwLock<Catalog>,
    /// `None` for databases that only live in memory.
    journal: Option<Mutex<Journal>>,
}

impl DatabaseCore {
    /// Creates an empty database that is never journaled.
    pub(crate) fn ephemeral(name: &str) -> Self {
        Self {
            name: name.to_string(),
            catalog: RwLock::new(Catalog::default()),
            journal: None,
        }
    }

    /// Rebuilds a database by replaying its journal.
    pub(crate) fn load(
        name: &str,
        store: Box<dyn ByteStore>,
        sync_on_commit: bool,
        checkpoint_bytes: u64,
    ) -> CoreResult<Self> {
        let (journal, committed) = Journal::open(store, sync_on_commit)?;
        let journal = journal.checkpoint_bytes(checkpoint_bytes);

        let mut catalog = Catalog::default();
        let transactions = committed.len();
        for (i, ops) in committed.into_iter().enumerate() {
            for op in ops {
                catalog.apply(op).map_err(|e| {
                    CoreError::journal_corruption(format!("replaying transaction {i}: {e}"))
                })?;
            }
        }

        debug!(
            db = name,
            version = catalog.version,
            tables = catalog.tables.len(),
            transactions,
            "journal replayed"
        );

        let core = Self {
            name: name.to_string(),
            catalog: RwLock::new(catalog),
            journal: Some(Mutex::new(journal)),
        };
        core.checkpoint_if_due(&core.catalog.read());
        Ok(core)
    }

    /// Journals one transaction.
    ///
    /// `after` is the catalog with `ops` already applied; it becomes the
    /// new journal content when a checkpoint is due.
    pub(crate) fn commit(&self, ops: &[JournalOp], after: &Catalog) -> CoreResult<()> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        if ops.is_empty() {
            return Ok(());
        }

        let mut journal = journal.lock();
        journal.commit(ops)?;
        debug!(
            db = %self.name,
            ops = ops.len(),
            journal_bytes = journal.size().unwrap_or_default(),
            "transaction committed"
        );
        if journal.needs_checkpoint() {
            self.checkpoint_journal(&mut journal, after);
        }
        Ok(())
    }

    /// Rewrites the journal as a snapshot of `catalog`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written; the old
    /// journal stays in place.
    pub(crate) fn checkpoint(&self, catalog: &Catalog) -> CoreResult<()> {
        match &self.journal {
            Some(journal) => journal.lock().checkpoint(&catalog.snapshot()),
            None => Ok(()),
        }
    }

    /// Size of the journal in bytes, `None` when there is none.
    pub(crate) fn journal_size(&self) -> Option<u64> {
        self.journal
            .as_ref()
            .and_then(|journal| journal.lock().size().ok())
    }

    fn checkpoint_if_due(&self, catalog: &Catalog) {
        if let Some(journal) = &self.journal {
            let mut journal = journal.lock();
            if journal.needs_checkpoint() {
                self.checkpoint_journal(&mut journal, catalog);
            }
        }
    }

    /// Checkpoint failures are logged; the full journal stays valid.
    fn checkpoint_journal(&self, journal: &mut Journal, catalog: &Catalog) {
        if let Err(e) = journal.checkpoint(&catalog.snapshot()) {
            warn!(db = %self.name, "journal checkpoint failed: {e}");
        }
    }
}
