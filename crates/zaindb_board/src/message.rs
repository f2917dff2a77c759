//! The message board store.

use crate::clock::local_timestamp;
use crate::filter::{Criterion, MessageFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use zaindb_core::{
    Completion, Config, CoreError, CoreResult, DatabaseFactory, EventSink, Key, RecordStore,
    SchemaDescriptor, StorageEngine,
};

/// Message database name.
pub const MESSAGE_DB: &str = "ZainMessage-DB";
/// Message table name.
pub const MESSAGE_TABLE: &str = "Message-Table";

const MESSAGE_DB_VERSION: u32 = 1;
const MESSAGE_INDEXES: &[&str] = &["id", "name", "mail", "content", "time", "name,mail"];

const DEFAULT_NAME: &str = "zain";
const DEFAULT_MAIL: &str = "2384439266@qq.com";
const DEFAULT_CONTENT: &str = "嗨，哈喽！点击编辑，可以设置署名联系邮件和留言内容哦。";

/// A message on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Assigned on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Author name.
    pub name: String,
    /// Contact mail.
    pub mail: String,
    /// Body.
    pub content: String,
    /// Creation time in local format.
    pub time: String,
}

impl Message {
    /// A new message stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        mail: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            mail: mail.into(),
            content: content.into(),
            time: local_timestamp(),
        }
    }

    /// The message a fresh "create" places on the board, ready for editing.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new(DEFAULT_NAME, DEFAULT_MAIL, DEFAULT_CONTENT)
    }
}

/// Stores and searches [`Message`]s.
#[derive(Debug, Clone)]
pub struct MessageStore {
    records: RecordStore<Message>,
}

impl MessageStore {
    /// The message table's schema.
    #[must_use]
    pub fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(MESSAGE_TABLE)
            .key_path("id")
            .auto_increment(true)
            .indexes_from(MESSAGE_INDEXES)
    }

    /// Opens the message database. Diagnostics go to `sink` when given.
    pub fn open(
        factory: Arc<dyn DatabaseFactory>,
        config: Config,
        sink: Option<Arc<dyn EventSink>>,
    ) -> Self {
        let mut builder = StorageEngine::builder(MESSAGE_DB, MESSAGE_DB_VERSION)
            .schema(Self::schema())
            .config(config);
        if let Some(sink) = sink {
            builder = builder.event_sink(sink);
        }
        Self {
            records: RecordStore::new(builder.open(factory), MESSAGE_TABLE),
        }
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &StorageEngine {
        self.records.engine()
    }

    /// Adds a placeholder message.
    pub fn create<F>(&self, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.records.insert([Message::placeholder()], on_complete);
    }

    /// Reads every message in id order.
    pub fn list<F>(&self, on_result: F)
    where
        F: FnOnce(Vec<Message>) + Send + 'static,
    {
        self.records.list(on_result);
    }

    /// Deletes the message with `id`.
    pub fn remove<F>(&self, id: i64, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.records.remove(id, on_complete);
    }

    /// Stores an edited message.
    pub fn replace<F>(&self, message: Message, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.records.replace(message, on_complete);
    }

    /// Removes every message.
    pub fn clear<F>(&self, on_complete: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.records.clear(on_complete);
    }

    /// Searches by the filter's leading criterion.
    ///
    /// An empty filter searches nothing and never calls `on_result`.
    pub fn search<F>(&self, filter: &MessageFilter, on_result: F)
    where
        F: FnOnce(Vec<Message>) + Send + 'static,
    {
        match filter.criterion() {
            Some(Criterion::Exact { index, value }) => {
                self.records.search_exact(index, value, on_result);
            }
            Some(Criterion::Range(range)) => self.records.search_range("id", Some(range), on_result),
            None => info!(db = MESSAGE_DB, "empty message filter, nothing to search"),
        }
    }

    /// Adds a placeholder message and returns its id.
    ///
    /// # Errors
    ///
    /// Fails if the database is not open or the write fails.
    pub async fn try_create(&self) -> CoreResult<Key> {
        self.try_add(Message::placeholder()).await
    }

    /// Adds `message` and returns its id.
    ///
    /// # Errors
    ///
    /// Fails if the database is not open or the write fails.
    pub async fn try_add(&self, message: Message) -> CoreResult<Key> {
        let mut keys = self.records.try_insert([message]).await?;
        keys.pop()
            .ok_or_else(|| CoreError::invalid_operation("insert returned no key"))
    }

    /// Reads every message in id order.
    ///
    /// # Errors
    ///
    /// Fails if the database is not open.
    pub async fn fetch_all(&self) -> CoreResult<Vec<Message>> {
        self.records.fetch_all().await
    }

    /// Deletes the message with `id`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Fails if the database is not open or the write fails.
    pub async fn try_remove(&self, id: i64) -> CoreResult<usize> {
        self.records.try_remove(id).await
    }

    /// Stores an edited message and returns its id.
    ///
    /// # Errors
    ///
    /// Fails if the database is not open or the write fails.
    pub async fn try_replace(&self, message: Message) -> CoreResult<Key> {
        self.records.try_replace(message).await
    }

    /// Removes every message.
    ///
    /// # Errors
    ///
    /// Fails if the database is not open or the write fails.
    pub async fn try_clear(&self) -> CoreResult<()> {
        self.records.try_clear().await
    }

    /// Searches by the filter's leading criterion.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidArgument`] for an empty filter, or if
    /// the database is not open.
    pub async fn find(&self, filter: &MessageFilter) -> CoreResult<Vec<Message>> {
        match filter.criterion() {
            Some(Criterion::Exact { index, value }) => self.records.find_exact(index, value).await,
            Some(Criterion::Range(range)) => self.records.find_range("id", Some(range)).await,
            None => Err(CoreError::invalid_argument("empty message filter")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::IdFilter;
    use tokio::sync::oneshot;
    use zaindb_core::{ConnectionState, LocalFactory};

    async fn store() -> MessageStore {
        let store = MessageStore::open(
            Arc::new(LocalFactory::in_memory()),
            Config::default(),
            None,
        );
        assert_eq!(store.engine().ready().await, ConnectionState::Open);
        store
    }

    async fn seed(store: &MessageStore) {
        for (name, mail, content) in [
            ("ann", "ann@x.io", "first"),
            ("bob", "bob@x.io", "second"),
            ("ann", "ann@y.io", "third"),
        ] {
            store.try_add(Message::new(name, mail, content)).await.unwrap();
        }
    }

    fn ids(messages: &[Message]) -> Vec<i64> {
        messages.iter().filter_map(|m| m.id).collect()
    }

    #[test]
    fn schema_matches_board_layout() {
        let schema = MessageStore::schema();
        assert_eq!(schema.table_name, MESSAGE_TABLE);
        assert!(schema.auto_increment);
        assert_eq!(schema.indexes.len(), 6);
        assert!(schema.validate().is_ok());
    }

    #[tokio::test]
    async fn create_adds_placeholder() {
        let store = store().await;
        let (tx, rx) = oneshot::channel();
        store.create(move |done| {
            let _ = tx.send(done);
        });
        assert!(rx.await.unwrap().is_complete());

        let all = store.fetch_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, Some(1));
        assert_eq!(all[0].name, "zain");
        assert_eq!(all[0].mail, "2384439266@qq.com");
    }

    #[tokio::test]
    async fn search_by_name_and_mail() {
        let store = store().await;
        seed(&store).await;

        let by_name = store
            .find(&MessageFilter::default().name("ann"))
            .await
            .unwrap();
        assert_eq!(ids(&by_name), vec![1, 3]);

        let both = store
            .find(&MessageFilter::default().name("ann").mail("ann@y.io"))
            .await
            .unwrap();
        assert_eq!(ids(&both), vec![3]);

        let content = store
            .find(&MessageFilter::default().content("second"))
            .await
            .unwrap();
        assert_eq!(ids(&content), vec![2]);
    }

    #[tokio::test]
    async fn search_by_id_range() {
        let store = store().await;
        seed(&store).await;

        let filter = MessageFilter::default().id_filter("(1, ~]".parse().unwrap());
        assert_eq!(ids(&store.find(&filter).await.unwrap()), vec![2, 3]);

        let filter = MessageFilter::default().id_filter(IdFilter::between(1, 3, false, true));
        assert_eq!(ids(&store.find(&filter).await.unwrap()), vec![1, 2]);

        let filter = MessageFilter::default().id_filter(IdFilter::only(0));
        assert_eq!(ids(&store.find(&filter).await.unwrap()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn search_callback_receives_matches() {
        let store = store().await;
        seed(&store).await;

        let (tx, rx) = oneshot::channel();
        store.search(&MessageFilter::default().mail("bob@x.io"), move |found| {
            let _ = tx.send(found);
        });
        assert_eq!(ids(&rx.await.unwrap()), vec![2]);
    }

    #[tokio::test]
    async fn empty_filter_is_rejected() {
        let store = store().await;
        let err = store.find(&MessageFilter::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));

        let (tx, rx) = oneshot::channel::<Vec<Message>>();
        store.search(&MessageFilter::default(), move |found| {
            let _ = tx.send(found);
        });
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn edit_and_remove() {
        let store = store().await;
        seed(&store).await;

        let mut first = store.fetch_all().await.unwrap().remove(0);
        first.content = "edited".into();
        store.try_replace(first).await.unwrap();
        let found = store
            .find(&MessageFilter::default().content("edited"))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1]);

        assert_eq!(store.try_remove(2).await.unwrap(), 1);
        assert_eq!(ids(&store.fetch_all().await.unwrap()), vec![1, 3]);

        store.try_clear().await.unwrap();
        assert!(store.fetch_all().await.unwrap().is_empty());
        assert_eq!(store.try_create().await.unwrap(), Key::from(4));
    }
}
