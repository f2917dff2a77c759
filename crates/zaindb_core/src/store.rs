//! Typed access to one table.

use crate::database::{Completion, StorageEngine};
use crate::error::CoreResult;
use crate::key::Key;
use crate::range::RangeSpec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Binds a record type to one table of a [`StorageEngine`].
///
/// The store keeps no state of its own; every call goes straight to the
/// engine with the bound table name.
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use zaindb_core::{LocalFactory, RecordStore, SchemaDescriptor, StorageEngine};
/// # #[derive(serde::Serialize, serde::Deserialize)] struct Note { id: Option<i64> }
/// # async fn demo() -> zaindb_core::CoreResult<()> {
/// let engine = StorageEngine::open(
///     Arc::new(LocalFactory::in_memory()),
///     "notes-db",
///     1,
///     vec![SchemaDescriptor::new("notes").key_path("id").auto_increment(true)],
/// );
/// engine.ready().await;
///
/// let notes: RecordStore<Note> = RecordStore::new(engine, "notes");
/// notes.try_insert([Note { id: None }]).await?;
/// assert_eq!(notes.fetch_all().await?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct RecordStore<T> {
    engine: StorageEngine,
    table: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            table: self.table.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for RecordStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("engine", &self.engine)
            .field("table", &self.table)
            .finish()
    }
}

impl<T> RecordStore<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Binds `table` of `engine`.
    pub fn new(engine: StorageEngine, table: impl Into<String>) -> Self {
        Self {
            engine,
            table: table.into(),
            _record: PhantomData,
        }
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    /// The bound table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Inserts records in one transaction.
    pub fn insert<I, F>(&self, records: I, on_complete: F)
    where
        I: IntoIterator<Item = T>,
        F: FnOnce(Completion) + Send + 'static,
    {
        self.engine.add(&self.table, records, on_complete);
    }

    /// Reads every record in key order.
    pub fn list<F>(&self, on_result: F)
    where
        F: FnOnce(Vec<T>) + Send + 'static,
    {
        self.engine.read_all(&self.table, on_result);
    }

    /// Deletes the record with primary key `key`.
    pub fn remove<F>(&self, key: impl Into<Key>, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.engine.delete_by_key(&self.table, key.into(), on_complete);
    }

    /// Stores a full record, replacing the one with the same key.
    pub fn replace<F>(&self, record: T, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.engine.update(&self.table, record, on_complete);
    }

    /// Removes every record.
    pub fn clear<F>(&self, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.engine.clear_table(&self.table, on_complete);
    }

    /// Reads the records whose `index` key equals `value`.
    pub fn search_exact<F>(&self, index: &str, value: impl Into<Key>, on_result: F)
    where
        F: FnOnce(Vec<T>) + Send + 'static,
    {
        self.engine
            .search_exact(&self.table, index, value, on_result);
    }

    /// Reads the records whose `index` key falls in `range`.
    pub fn search_range<F>(&self, index: &str, range: Option<RangeSpec>, on_result: F)
    where
        F: FnOnce(Vec<T>) + Send + 'static,
    {
        self.engine
            .search_range(&self.table, index, range, on_result);
    }

    /// Inserts records in one transaction and returns their keys.
    ///
    /// # Errors
    ///
    /// See [`StorageEngine::try_add`].
    pub async fn try_insert<I>(&self, records: I) -> CoreResult<Vec<Key>>
    where
        I: IntoIterator<Item = T>,
    {
        self.engine.try_add(&self.table, records).await
    }

    /// Reads every record in key order.
    ///
    /// # Errors
    ///
    /// See [`StorageEngine::try_read_all`].
    pub async fn fetch_all(&self) -> CoreResult<Vec<T>> {
        self.engine.try_read_all(&self.table).await
    }

    /// Reads the records whose `index` key equals `value`.
    ///
    /// # Errors
    ///
    /// See [`StorageEngine::try_search_exact`].
    pub async fn find_exact(&self, index: &str, value: impl Into<Key>) -> CoreResult<Vec<T>> {
        self.engine
            .try_search_exact(&self.table, index, value)
            .await
    }

    /// Reads the records whose `index` key falls in `range`.
    ///
    /// # Errors
    ///
    /// See [`StorageEngine::try_search_range`].
    pub async fn find_range(&self, index: &str, range: Option<RangeSpec>) -> CoreResult<Vec<T>> {
        self.engine
            .try_search_range(&self.table, index, range)
            .await
    }

    /// Deletes the record with primary key `key`.
    ///
    /// # Errors
    ///
    /// See [`StorageEngine::try_delete`].
    pub async fn try_remove(&self, key: impl Into<Key>) -> CoreResult<usize> {
        self.engine.try_delete(&self.table, key.into()).await
    }

    /// Stores a full record and returns its key.
    ///
    /// # Errors
    ///
    /// See [`StorageEngine::try_update`].
    pub async fn try_replace(&self, record: T) -> CoreResult<Key> {
        self.engine.try_update(&self.table, record).await
    }

    /// Removes every record.
    ///
    /// # Errors
    ///
    /// See [`StorageEngine::try_clear`].
    pub async fn try_clear(&self) -> CoreResult<()> {
        self.engine.try_clear(&self.table).await
    }
}
