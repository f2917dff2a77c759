//! The storage engine: one versioned connection and the operations on it.

use crate::config::Config;
use crate::engine::{Connection, DatabaseFactory, Source, VersionChange};
use crate::error::{CoreError, CoreResult};
use crate::event::{EngineEvent, EventLevel, EventSink};
use crate::key::Key;
use crate::range::{KeyRange, RangeSpec};
use crate::record::{from_value, to_value};
use crate::schema::SchemaDescriptor;
use crate::state::ConnectionState;
use ciborium::Value;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Callback run each time an open attempt succeeds.
pub type OpenCallback = Arc<dyn Fn() + Send + Sync>;

/// Outcome of a callback-style mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The transaction committed.
    Complete {
        /// Table written.
        table: String,
    },
    /// The transaction failed and was rolled back.
    Error {
        /// Table written.
        table: String,
        /// Description of the failure.
        message: String,
    },
}

impl Completion {
    fn from_result<T>(table: String, result: CoreResult<T>) -> Self {
        match result {
            Ok(_) => Self::Complete { table },
            Err(e) => Self::Error {
                table,
                message: e.to_string(),
            },
        }
    }

    /// Returns `true` if the transaction committed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Table the operation targeted.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Complete { table } | Self::Error { table, .. } => table,
        }
    }
}

/// Builder for a [`StorageEngine`].
pub struct EngineBuilder {
    name: String,
    version: u32,
    schemas: Vec<SchemaDescriptor>,
    config: Config,
    sink: Option<Arc<dyn EventSink>>,
}

impl EngineBuilder {
    /// Adds a table declaration.
    #[must_use]
    pub fn schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Adds several table declarations.
    #[must_use]
    pub fn schemas(mut self, schemas: impl IntoIterator<Item = SchemaDescriptor>) -> Self {
        self.schemas.extend(schemas);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Mirrors engine diagnostics into `sink`.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Creates the engine and starts opening the database.
    ///
    /// Invalid or duplicate table declarations are logged and skipped. A
    /// repeated index name only drops the repeat; the table keeps its
    /// first index of that name. Must be called from within a Tokio
    /// runtime; without one the engine settles in
    /// [`ConnectionState::Failed`].
    pub fn open(self, factory: Arc<dyn DatabaseFactory>) -> StorageEngine {
        let mut seen = HashSet::new();
        let schemas = self
            .schemas
            .into_iter()
            .map(|mut schema| {
                for index in schema.dedup_indexes() {
                    warn!(
                        db = %self.name,
                        table = %schema.table_name,
                        index = %index.name,
                        "skipping duplicate index"
                    );
                }
                schema
            })
            .filter(|schema| match schema.validate() {
                Err(e) => {
                    warn!(db = %self.name, table = %schema.table_name, "skipping table: {e}");
                    false
                }
                Ok(()) if !seen.insert(schema.table_name.clone()) => {
                    warn!(db = %self.name, table = %schema.table_name, "skipping duplicate table");
                    false
                }
                Ok(()) => true,
            })
            .collect();

        let (state, _) = watch::channel(ConnectionState::Closed);
        let engine = StorageEngine {
            inner: Arc::new(Inner {
                name: self.name,
                version: self.version,
                schemas,
                config: self.config,
                factory,
                link: Mutex::new(Link::default()),
                state,
                on_open: Mutex::new(None),
                sink: self.sink,
            }),
        };
        engine.start();
        engine
    }
}

/// Owns one connection to a named, versioned database.
///
/// The engine opens the database as soon as it is built, creating the
/// declared tables on first use and retrying failed opens up to
/// [`Config::max_open_retries`] times. Clones share the same connection.
///
/// Every operation comes in two forms:
///
/// - A callback form that returns immediately and reports later on a
///   spawned task. If the database is not open, or an argument is empty,
///   the call is logged and the callback is never run. Mutation failures
///   arrive as [`Completion::Error`]; read failures as an empty vector.
/// - An `async fn try_*` form returning [`CoreResult`].
#[derive(Clone)]
pub struct StorageEngine {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    version: u32,
    schemas: Vec<SchemaDescriptor>,
    config: Config,
    factory: Arc<dyn DatabaseFactory>,
    link: Mutex<Link>,
    state: watch::Sender<ConnectionState>,
    on_open: Mutex<Option<OpenCallback>>,
    sink: Option<Arc<dyn EventSink>>,
}

#[derive(Default)]
struct Link {
    connection: Option<Connection>,
    retries: u32,
    attempt_in_flight: bool,
}

impl fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEngine")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl StorageEngine {
    /// Starts building an engine for database `name` at `version`.
    pub fn builder(name: impl Into<String>, version: u32) -> EngineBuilder {
        EngineBuilder {
            name: name.into(),
            version,
            schemas: Vec::new(),
            config: Config::default(),
            sink: None,
        }
    }

    /// Creates an engine with the default configuration and starts opening.
    pub fn open(
        factory: Arc<dyn DatabaseFactory>,
        name: impl Into<String>,
        version: u32,
        schemas: Vec<SchemaDescriptor>,
    ) -> Self {
        Self::builder(name, version).schemas(schemas).open(factory)
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Requested schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// The open connection, if any.
    #[must_use]
    pub fn connection(&self) -> Option<Connection> {
        self.inner.link.lock().connection.clone()
    }

    /// Registers the callback run when an open attempt succeeds.
    ///
    /// Only one callback is kept; registering again replaces it. An engine
    /// that is already open does not run it; use [`StorageEngine::ready`].
    pub fn on_open_success<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.on_open.lock() = Some(Arc::new(callback));
    }

    /// Waits until the engine is open, has failed, or is unsupported.
    pub async fn ready(&self) -> ConnectionState {
        let mut rx = self.inner.state.subscribe();
        let settled = rx.wait_for(ConnectionState::is_settled).await.map(|state| *state);
        settled.unwrap_or_else(|_| self.state())
    }

    fn start(&self) {
        if !self.inner.factory.is_supported() {
            self.inner.state.send_replace(ConnectionState::Unsupported);
            self.inner.emit(
                EventLevel::Error,
                None,
                "storage is not supported on this platform; operations are disabled".into(),
            );
            return;
        }
        self.request_open();
    }

    /// Spawns an open attempt unless one is already running.
    fn request_open(&self) -> bool {
        {
            let mut link = self.inner.link.lock();
            if link.attempt_in_flight {
                return false;
            }
            link.attempt_in_flight = true;
            self.inner.state.send_replace(ConnectionState::Opening);
        }

        let inner = Arc::clone(&self.inner);
        let spawned = self.inner.spawn(async move { inner.run_open().await });
        if !spawned {
            let mut link = self.inner.link.lock();
            link.attempt_in_flight = false;
            self.inner
                .state
                .send_replace(ConnectionState::Failed { retries: link.retries });
        }
        spawned
    }

    /// Returns the connection, or explains why there is none.
    fn connect(&self, op: &str) -> CoreResult<Connection> {
        let state = self.state();
        if state.is_open() {
            if let Some(connection) = self.connection() {
                return Ok(connection);
            }
        }

        if state == ConnectionState::Unsupported {
            debug!(db = %self.inner.name, op, "storage unsupported, operation ignored");
            return Err(CoreError::NotSupported);
        }

        if self.inner.config.reconnect_on_guard && state.is_recoverable() && self.request_open() {
            self.inner.emit(
                EventLevel::Info,
                None,
                format!("{op} found the database {state}; reopening"),
            );
        }
        self.inner.emit(
            EventLevel::Warn,
            None,
            format!("{op} skipped: database is {state}"),
        );
        Err(CoreError::NotOpen { state })
    }

    fn reject(&self, op: &str, table: &str, err: CoreError) -> CoreError {
        self.inner
            .emit(EventLevel::Warn, Some(table), format!("{op} rejected: {err}"));
        err
    }

    fn check_table(&self, op: &str, table: &str) -> CoreResult<()> {
        if table.trim().is_empty() {
            return Err(self.reject(op, table, CoreError::invalid_argument("table name is empty")));
        }
        Ok(())
    }

    fn prepare_add<T, I>(&self, table: &str, records: I) -> CoreResult<(Connection, Vec<Value>)>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        self.check_table("add", table)?;
        let values = records
            .into_iter()
            .map(|record| to_value(&record))
            .collect::<CoreResult<Vec<_>>>()
            .map_err(|e| self.reject("add", table, e))?;
        if values.is_empty() {
            return Err(self.reject("add", table, CoreError::invalid_argument("no records to add")));
        }
        let connection = self.connect("add")?;
        Ok((connection, values))
    }

    fn prepare_scan(&self, op: &str, table: &str, index: Option<&str>) -> CoreResult<Connection> {
        self.check_table(op, table)?;
        if index.is_some_and(|name| name.trim().is_empty()) {
            return Err(self.reject(op, table, CoreError::invalid_argument("index name is empty")));
        }
        self.connect(op)
    }

    fn prepare_write(&self, op: &str, table: &str) -> CoreResult<Connection> {
        self.check_table(op, table)?;
        self.connect(op)
    }

    fn lower_range(&self, table: &str, index: &str, range: Option<RangeSpec>) -> Option<KeyRange> {
        let spec = range?;
        let lowered = spec.to_key_range();
        if lowered.is_none() {
            self.inner.emit(
                EventLevel::Debug,
                Some(table),
                format!("{} range on {index} has a falsy bound; scanning everything", spec.kind()),
            );
        }
        lowered
    }

    fn spawn_scan<T, F>(
        &self,
        op: &str,
        table: &str,
        index: Option<&str>,
        range: Option<KeyRange>,
        on_result: F,
    ) where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Vec<T>) + Send + 'static,
    {
        let Ok(connection) = self.prepare_scan(op, table, index) else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        let index = index.map(str::to_string);
        self.inner.spawn(async move {
            let records = inner
                .run_scan(connection, &table, index.as_deref(), range.as_ref())
                .await
                .unwrap_or_default();
            on_result(records);
        });
    }

    fn spawn_mutation<R, Fut, F>(&self, table: &str, work: Fut, on_complete: F)
    where
        R: Send + 'static,
        Fut: Future<Output = CoreResult<R>> + Send + 'static,
        F: FnOnce(Completion) + Send + 'static,
    {
        let table = table.to_string();
        self.inner.spawn(async move {
            let result = work.await;
            on_complete(Completion::from_result(table, result));
        });
    }

    /// Inserts records in one transaction.
    ///
    /// Either every record is stored or none is. `on_complete` runs once.
    pub fn add<T, I, F>(&self, table: &str, records: I, on_complete: F)
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
        F: FnOnce(Completion) + Send + 'static,
    {
        let Ok((connection, values)) = self.prepare_add(table, records) else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let owned = table.to_string();
        self.spawn_mutation(
            table,
            async move { inner.run_add(connection, &owned, values).await },
            on_complete,
        );
    }

    /// Inserts records in one transaction and returns their keys.
    ///
    /// # Errors
    ///
    /// Returns a guard error if the database is not open or the batch is
    /// empty, [`CoreError::Record`] if a record cannot be serialized, or
    /// the engine error that aborted the transaction.
    pub async fn try_add<T, I>(&self, table: &str, records: I) -> CoreResult<Vec<Key>>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let (connection, values) = self.prepare_add(table, records)?;
        self.inner.run_add(connection, table, values).await
    }

    /// Reads every record of `table` in primary key order.
    pub fn read_all<T, F>(&self, table: &str, on_result: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Vec<T>) + Send + 'static,
    {
        self.spawn_scan("read_all", table, None, None, on_result);
    }

    /// Reads every record of `table` in primary key order.
    ///
    /// # Errors
    ///
    /// Returns a guard error, [`CoreError::TableNotFound`], or
    /// [`CoreError::Record`] if a stored value does not match `T`.
    pub async fn try_read_all<T>(&self, table: &str) -> CoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let connection = self.prepare_scan("read_all", table, None)?;
        self.inner.run_scan(connection, table, None, None).await
    }

    /// Reads the records whose `index` key equals `value`.
    ///
    /// For a composite index pass an array key, e.g.
    /// `Key::array(["alice", "a@x.com"])`.
    pub fn search_exact<T, F>(&self, table: &str, index: &str, value: impl Into<Key>, on_result: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Vec<T>) + Send + 'static,
    {
        let range = KeyRange::only(value.into());
        self.spawn_scan("search_exact", table, Some(index), Some(range), on_result);
    }

    /// Reads the records whose `index` key equals `value`.
    ///
    /// # Errors
    ///
    /// Returns a guard error, [`CoreError::TableNotFound`],
    /// [`CoreError::IndexNotFound`], or [`CoreError::Record`].
    pub async fn try_search_exact<T>(
        &self,
        table: &str,
        index: &str,
        value: impl Into<Key>,
    ) -> CoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let range = KeyRange::only(value.into());
        let connection = self.prepare_scan("search_exact", table, Some(index))?;
        self.inner
            .run_scan(connection, table, Some(index), Some(&range))
            .await
    }

    /// Reads the records whose `index` key falls in `range`, in index order.
    ///
    /// With no range, or a range whose needed bound is falsy (`0` or `""`),
    /// every record is returned.
    pub fn search_range<T, F>(
        &self,
        table: &str,
        index: &str,
        range: Option<RangeSpec>,
        on_result: F,
    ) where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Vec<T>) + Send + 'static,
    {
        let range = self.lower_range(table, index, range);
        self.spawn_scan("search_range", table, Some(index), range, on_result);
    }

    /// Reads the records whose `index` key falls in `range`.
    ///
    /// # Errors
    ///
    /// Returns a guard error, [`CoreError::TableNotFound`],
    /// [`CoreError::IndexNotFound`], or [`CoreError::Record`].
    pub async fn try_search_range<T>(
        &self,
        table: &str,
        index: &str,
        range: Option<RangeSpec>,
    ) -> CoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let range = self.lower_range(table, index, range);
        let connection = self.prepare_scan("search_range", table, Some(index))?;
        self.inner
            .run_scan(connection, table, Some(index), range.as_ref())
            .await
    }

    /// Deletes the record with primary key `key`, or every record in a range.
    pub fn delete_by_key<F>(&self, table: &str, key: impl Into<KeyRange>, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let Ok(connection) = self.prepare_write("delete", table) else {
            return;
        };
        let range = key.into();
        let inner = Arc::clone(&self.inner);
        let owned = table.to_string();
        self.spawn_mutation(
            table,
            async move { inner.run_delete(connection, &owned, &range).await },
            on_complete,
        );
    }

    /// Deletes by key or range and returns how many records went.
    ///
    /// # Errors
    ///
    /// Returns a guard error or the engine error.
    pub async fn try_delete(&self, table: &str, key: impl Into<KeyRange>) -> CoreResult<usize> {
        let connection = self.prepare_write("delete", table)?;
        self.inner.run_delete(connection, table, &key.into()).await
    }

    /// Stores `record`, replacing any record with the same key.
    pub fn update<T, F>(&self, table: &str, record: T, on_complete: F)
    where
        T: Serialize,
        F: FnOnce(Completion) + Send + 'static,
    {
        let Ok((connection, value)) = self.prepare_update(table, &record) else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let owned = table.to_string();
        self.spawn_mutation(
            table,
            async move { inner.run_put(connection, &owned, value).await },
            on_complete,
        );
    }

    /// Stores `record`, replacing any record with the same key, and
    /// returns its key.
    ///
    /// # Errors
    ///
    /// Returns a guard error, [`CoreError::Record`], or the engine error.
    pub async fn try_update<T: Serialize>(&self, table: &str, record: T) -> CoreResult<Key> {
        let (connection, value) = self.prepare_update(table, &record)?;
        self.inner.run_put(connection, table, value).await
    }

    fn prepare_update<T: Serialize>(&self, table: &str, record: &T) -> CoreResult<(Connection, Value)> {
        self.check_table("update", table)?;
        let value = to_value(record).map_err(|e| self.reject("update", table, e))?;
        let connection = self.connect("update")?;
        Ok((connection, value))
    }

    /// Removes every record from `table`. The key generator is not reset.
    pub fn clear_table<F>(&self, table: &str, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let Ok(connection) = self.prepare_write("clear", table) else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let owned = table.to_string();
        self.spawn_mutation(
            table,
            async move { inner.run_clear(connection, &owned).await },
            on_complete,
        );
    }

    /// Removes every record from `table`.
    ///
    /// # Errors
    ///
    /// Returns a guard error or the engine error.
    pub async fn try_clear(&self, table: &str) -> CoreResult<()> {
        let connection = self.prepare_write("clear", table)?;
        self.inner.run_clear(connection, table).await
    }
}

impl Inner {
    fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
                true
            }
            Err(_) => {
                error!(db = %self.name, "no Tokio runtime available; task dropped");
                false
            }
        }
    }

    fn emit(&self, level: EventLevel, table: Option<&str>, message: String) {
        let table_field = table.unwrap_or("-");
        match level {
            EventLevel::Debug => debug!(db = %self.name, table = table_field, "{message}"),
            EventLevel::Info => info!(db = %self.name, table = table_field, "{message}"),
            EventLevel::Warn => warn!(db = %self.name, table = table_field, "{message}"),
            EventLevel::Error => error!(db = %self.name, table = table_field, "{message}"),
        }

        if level < self.config.event_level {
            return;
        }
        if let Some(sink) = &self.sink {
            let message = match table {
                Some(table) => format!("{table}: {message}"),
                None => message,
            };
            sink.record(EngineEvent {
                source: self.name.clone(),
                level,
                message,
            });
        }
    }

    async fn run_open(&self) {
        loop {
            self.state.send_replace(ConnectionState::Opening);
            tokio::task::yield_now().await;

            match self.attempt().await {
                Ok(connection) => {
                    self.opened(connection);
                    return;
                }
                Err(err) => {
                    let retries = {
                        let mut link = self.link.lock();
                        link.retries += 1;
                        link.retries
                    };
                    self.emit(
                        EventLevel::Error,
                        None,
                        format!("open attempt {retries} failed: {err}"),
                    );

                    if retries > self.config.max_open_retries {
                        {
                            let mut link = self.link.lock();
                            link.attempt_in_flight = false;
                            self.state.send_replace(ConnectionState::Failed { retries });
                        }
                        self.emit(
                            EventLevel::Error,
                            None,
                            format!("giving up after {retries} failed opens"),
                        );
                        return;
                    }

                    if !self.config.retry_delay.is_zero() {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }
    }

    async fn attempt(&self) -> CoreResult<Connection> {
        let request = self.factory.open(&self.name, self.version)?;
        if !request.needs_upgrade() {
            return request.finish();
        }

        self.state.send_replace(ConnectionState::UpgradeInProgress);
        self.emit(
            EventLevel::Info,
            None,
            format!(
                "upgrading from version {} to {}",
                request.old_version(),
                request.new_version()
            ),
        );
        tokio::task::yield_now().await;

        request.upgrade(|change| self.create_schema(change))
    }

    fn create_schema(&self, change: &mut VersionChange<'_>) -> CoreResult<()> {
        for schema in &self.schemas {
            if change.contains_table(&schema.table_name) {
                continue;
            }
            change.create_table(
                &schema.table_name,
                schema.primary_key.clone(),
                schema.auto_increment,
            )?;
            for index in &schema.indexes {
                change.create_index(&schema.table_name, &index.name, index.key_path())?;
            }
            self.emit(
                EventLevel::Info,
                Some(&schema.table_name),
                format!("table created with {} indexes", schema.indexes.len()),
            );
        }
        Ok(())
    }

    fn opened(&self, connection: Connection) {
        let version = connection.version();
        {
            let mut link = self.link.lock();
            link.connection = Some(connection);
            link.retries = 0;
            link.attempt_in_flight = false;
            self.state.send_replace(ConnectionState::Open);
        }
        self.emit(
            EventLevel::Info,
            None,
            format!("database opened at version {version}"),
        );

        let callback = self.on_open.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    async fn run_add(
        &self,
        connection: Connection,
        table: &str,
        values: Vec<Value>,
    ) -> CoreResult<Vec<Key>> {
        tokio::task::yield_now().await;
        let result = connection.write(&[table], |txn| {
            values
                .into_iter()
                .map(|value| txn.add(table, value, None))
                .collect::<CoreResult<Vec<_>>>()
        });

        match &result {
            Ok(keys) => {
                for key in keys {
                    self.emit(EventLevel::Debug, Some(table), format!("record {key} added"));
                }
                self.emit(
                    EventLevel::Info,
                    Some(table),
                    format!("{} record(s) added", keys.len()),
                );
            }
            Err(e) => self.emit(EventLevel::Error, Some(table), format!("add failed: {e}")),
        }
        result
    }

    async fn run_scan<T>(
        &self,
        connection: Connection,
        table: &str,
        index: Option<&str>,
        range: Option<&KeyRange>,
    ) -> CoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        tokio::task::yield_now().await;
        let source = index.map_or(Source::Table, Source::Index);

        let result = async {
            let cursor = connection.open_cursor(table, source, range)?;
            let mut records = Vec::with_capacity(cursor.len());
            for entry in cursor {
                records.push(from_value(&entry.value)?);
                tokio::task::yield_now().await;
            }
            Ok::<_, CoreError>(records)
        }
        .await;

        let over = index.unwrap_or("primary key");
        match &result {
            Ok(records) => self.emit(
                EventLevel::Debug,
                Some(table),
                format!("cursor over {over} finished with {} record(s)", records.len()),
            ),
            Err(e) => self.emit(
                EventLevel::Error,
                Some(table),
                format!("read over {over} failed: {e}"),
            ),
        }
        result
    }

    async fn run_delete(
        &self,
        connection: Connection,
        table: &str,
        range: &KeyRange,
    ) -> CoreResult<usize> {
        tokio::task::yield_now().await;
        let result = connection.write(&[table], |txn| txn.delete(table, range));
        match &result {
            Ok(count) => self.emit(
                EventLevel::Info,
                Some(table),
                format!("{count} record(s) deleted"),
            ),
            Err(e) => self.emit(EventLevel::Error, Some(table), format!("delete failed: {e}")),
        }
        result
    }

    async fn run_put(&self, connection: Connection, table: &str, value: Value) -> CoreResult<Key> {
        tokio::task::yield_now().await;
        let result = connection.write(&[table], |txn| txn.put(table, value, None));
        match &result {
            Ok(key) => self.emit(EventLevel::Info, Some(table), format!("record {key} updated")),
            Err(e) => self.emit(EventLevel::Error, Some(table), format!("update failed: {e}")),
        }
        result
    }

    async fn run_clear(&self, connection: Connection, table: &str) -> CoreResult<()> {
        tokio::task::yield_now().await;
        let result = connection.write(&[table], |txn| txn.clear(table));
        match &result {
            Ok(()) => self.emit(EventLevel::Info, Some(table), "table cleared".into()),
            Err(e) => self.emit(EventLevel::Error, Some(table), format!("clear failed: {e}")),
        }
        result
    }
}
