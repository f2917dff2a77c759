//! Test fixtures and engine helpers.
//!
//! Provides ready-to-use boards and engines for tests, in memory or in a
//! temporary directory that is removed on drop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use zaindb_board::{AppContext, BoardConfig};
use zaindb_core::{
    ConnectionState, DatabaseFactory, EventSink, LocalFactory, SchemaDescriptor, StorageEngine,
    Value,
};

/// A board with automatic cleanup.
pub struct TestBoard {
    /// The board.
    pub app: AppContext,
    config: BoardConfig,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestBoard {
    /// Opens an in-memory board and waits for both databases.
    pub async fn memory() -> Self {
        Self::open(BoardConfig::default(), None).await
    }

    /// Opens a board journaled to a fresh temporary directory.
    pub async fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = BoardConfig::default()
            .in_directory(temp_dir.path())
            .sync_on_commit(false);
        Self::open(config, Some(temp_dir)).await
    }

    async fn open(config: BoardConfig, temp_dir: Option<TempDir>) -> Self {
        let app = AppContext::open(config.clone());
        let states = app.ready().await;
        assert_eq!(
            states,
            (ConnectionState::Open, ConnectionState::Open),
            "test board failed to open"
        );
        Self {
            app,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the journal directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes the board and opens it again from its journals.
    ///
    /// Pending log reports are flushed first. An in-memory board comes
    /// back empty.
    pub async fn reopen(self) -> Self {
        let Self {
            app,
            config,
            _temp_dir: temp_dir,
        } = self;
        app.logs().settled().await;
        drop(app);
        Self::open(config, temp_dir).await
    }
}

impl std::ops::Deref for TestBoard {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.app
    }
}

/// Opens an engine and waits for it to settle.
pub async fn open_engine(
    factory: Arc<dyn DatabaseFactory>,
    name: &str,
    version: u32,
    schemas: Vec<SchemaDescriptor>,
    sink: Option<Arc<dyn EventSink>>,
) -> StorageEngine {
    let mut builder = StorageEngine::builder(name, version).schemas(schemas);
    if let Some(sink) = sink {
        builder = builder.event_sink(sink);
    }
    let engine = builder.open(factory);
    engine.ready().await;
    engine
}

/// Creates a factory journaling to a fresh temporary directory.
///
/// Keep the returned directory alive for as long as the factory is used.
pub fn temp_factory() -> (Arc<LocalFactory>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let factory = LocalFactory::in_directory(temp_dir.path()).sync_on_commit(false);
    (Arc::new(factory), temp_dir)
}

/// Journal path of database `name` in `dir`.
pub fn journal_path(dir: &Path, name: &str) -> PathBuf {
    LocalFactory::in_directory(dir)
        .database_path(name)
        .expect("directory factory has paths")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use zaindb_core::IndexSpec;

    /// Table used by [`numbered_engine`].
    pub const ITEMS: &str = "items";

    /// Schema of the `items` table: key path `id`, auto-increment, indexes
    /// on `id`, `label`, `group` and the composite `group,label`.
    pub fn items_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(ITEMS)
            .key_path("id")
            .auto_increment(true)
            .index(IndexSpec::single("id"))
            .index(IndexSpec::single("label"))
            .index(IndexSpec::single("group"))
            .index(IndexSpec::composite(["group", "label"]))
    }

    /// An item record without an id.
    pub fn item(label: &str, group: &str) -> Value {
        Value::Map(vec![
            (Value::Text("label".into()), Value::Text(label.into())),
            (Value::Text("group".into()), Value::Text(group.into())),
        ])
    }

    /// An in-memory engine holding items `1..=count`.
    ///
    /// Item `n` is labelled `item-n` and grouped by parity.
    pub async fn numbered_engine(count: usize) -> StorageEngine {
        let engine = open_engine(
            Arc::new(LocalFactory::in_memory()),
            "numbered",
            1,
            vec![items_schema()],
            None,
        )
        .await;
        if count == 0 {
            return engine;
        }
        let items: Vec<Value> = (1..=count)
            .map(|n| item(&format!("item-{n}"), if n % 2 == 0 { "even" } else { "odd" }))
            .collect();
        engine
            .try_add(ITEMS, items)
            .await
            .expect("Failed to seed items");
        engine
    }
}
