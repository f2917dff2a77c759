//! The offline log store.

use crate::clock::local_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};
use zaindb_core::{
    Completion, Config, CoreError, CoreResult, DatabaseFactory, EngineEvent, EventSink, Key,
    RecordStore, SchemaDescriptor, StorageEngine,
};

/// Log database name.
pub const LOG_DB: &str = "ZainLog-DB";
/// Log table name.
pub const LOG_TABLE: &str = "ZainLog-Table";
/// Version stamped on entries unless configured otherwise.
pub const DEFAULT_LOG_VERSION: &str = "1.1.1";

const LOG_DB_VERSION: u32 = 1;
const LOG_INDEXES: &[&str] = &["id", "from", "level", "msg", "version", "time"];

/// One log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Assigned on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// What produced the entry, usually a database name.
    pub from: String,
    /// Severity, 0 (debug) to 3 (error).
    pub level: i64,
    /// The message.
    pub msg: String,
    /// Application version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Local time the entry was reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl LogEntry {
    /// An unstamped entry.
    pub fn new(from: impl Into<String>, level: i64, msg: impl Into<String>) -> Self {
        Self {
            id: None,
            from: from.into(),
            level,
            msg: msg.into(),
            version: None,
            time: None,
        }
    }
}

/// Stores [`LogEntry`]s.
///
/// [`report`](Self::report) is fire-and-forget: it waits for the log
/// database in the background, so it can be called while the database is
/// still opening. [`settled`](Self::settled) waits for those writes.
///
/// The store is also an [`EventSink`], which is how the message engine's
/// diagnostics end up in the log.
#[derive(Clone)]
pub struct LogStore {
    records: RecordStore<LogEntry>,
    version: Arc<str>,
    pending: Arc<watch::Sender<usize>>,
}

impl fmt::Debug for LogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("records", &self.records)
            .field("version", &self.version)
            .field("pending", &*self.pending.borrow())
            .finish()
    }
}

impl LogStore {
    /// The log table's schema.
    #[must_use]
    pub fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(LOG_TABLE)
            .key_path("id")
            .auto_increment(true)
            .indexes_from(LOG_INDEXES)
    }

    /// Opens the log database, stamping entries with `version`.
    pub fn open(factory: Arc<dyn DatabaseFactory>, config: Config, version: &str) -> Self {
        let engine = StorageEngine::builder(LOG_DB, LOG_DB_VERSION)
            .schema(Self::schema())
            .config(config)
            .open(factory);
        let (pending, _) = watch::channel(0);
        Self {
            records: RecordStore::new(engine, LOG_TABLE),
            version: Arc::from(version),
            pending: Arc::new(pending),
        }
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &StorageEngine {
        self.records.engine()
    }

    /// Reports an entry in the background.
    ///
    /// The entry is stamped with the configured version and the current
    /// time and written once the log database is open. It is dropped if
    /// the database fails to open.
    pub fn report(&self, from: impl Into<String>, level: i64, msg: impl Into<String>) {
        let entry = self.stamp(LogEntry::new(from, level, msg));
        let Ok(handle) = Handle::try_current() else {
            warn!(db = LOG_DB, "no Tokio runtime available; log entry dropped");
            return;
        };

        self.pending.send_modify(|n| *n += 1);
        let store = self.clone();
        handle.spawn(async move {
            let state = store.engine().ready().await;
            if state.is_open() {
                if let Err(e) = store.records.try_insert([entry]).await {
                    warn!(db = LOG_DB, error = %e, "failed to write log entry");
                }
            } else {
                debug!(db = LOG_DB, %state, "log database unavailable; entry dropped");
            }
            store.pending.send_modify(|n| *n = n.saturating_sub(1));
        });
    }

    /// Reports an entry and waits for it to be stored.
    ///
    /// # Errors
    ///
    /// Fails if the log database is not open or the write fails.
    pub async fn try_report(
        &self,
        from: impl Into<String>,
        level: i64,
        msg: impl Into<String>,
    ) -> CoreResult<Key> {
        let entry = self.stamp(LogEntry::new(from, level, msg));
        self.engine().ready().await;
        let mut keys = self.records.try_insert([entry]).await?;
        keys.pop()
            .ok_or_else(|| CoreError::invalid_operation("insert returned no key"))
    }

    /// Waits until every background [`report`](Self::report) has finished.
    pub async fn settled(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Number of background reports still in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Reads every entry in id order.
    pub fn list<F>(&self, on_result: F)
    where
        F: FnOnce(Vec<LogEntry>) + Send + 'static,
    {
        self.records.list(on_result);
    }

    /// Deletes the entry with `id`.
    pub fn remove<F>(&self, id: i64, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.records.remove(id, on_complete);
    }

    /// Stores an edited entry.
    pub fn replace<F>(&self, entry: LogEntry, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.records.replace(entry, on_complete);
    }

    /// Removes every entry.
    pub fn clear<F>(&self, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.records.clear(on_complete);
    }

    /// Reads every entry in id order.
    ///
    /// # Errors
    ///
    /// Fails if the log database is not open.
    pub async fn fetch_all(&self) -> CoreResult<Vec<LogEntry>> {
        self.records.fetch_all().await
    }

    /// Deletes the entry with `id`.
    ///
    /// # Errors
    ///
    /// Fails if the log database is not open or the write fails.
    pub async fn try_remove(&self, id: i64) -> CoreResult<usize> {
        self.records.try_remove(id).await
    }

    /// Stores an edited entry.
    ///
    /// # Errors
    ///
    /// Fails if the log database is not open or the write fails.
    pub async fn try_replace(&self, entry: LogEntry) -> CoreResult<Key> {
        self.records.try_replace(entry).await
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Fails if the log database is not open or the write fails.
    pub async fn try_clear(&self) -> CoreResult<()> {
        self.records.try_clear().await
    }

    fn stamp(&self, mut entry: LogEntry) -> LogEntry {
        entry.version = Some(self.version.to_string());
        entry.time = Some(local_timestamp());
        entry
    }
}

impl EventSink for LogStore {
    fn record(&self, event: EngineEvent) {
        self.report(event.source, event.level.code(), event.message);
    }
}
