//! Application wiring.

use crate::config::BoardConfig;
use crate::error::BoardResult;
use crate::log::{LogEntry, LogStore};
use crate::message::{Message, MessageStore};
use std::sync::Arc;
use zaindb_core::{ConnectionState, DatabaseFactory, EventSink};

/// Both stores, opened over one factory.
///
/// The log store receives the message engine's events, so opening,
/// upgrades and every mutation of the board leave a log entry.
#[derive(Debug, Clone)]
pub struct AppContext {
    messages: MessageStore,
    logs: LogStore,
}

/// The current contents of both stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Every message in id order.
    pub messages: Vec<Message>,
    /// Every log entry in id order.
    pub logs: Vec<LogEntry>,
}

impl AppContext {
    /// Opens both stores from `config`.
    ///
    /// Must be called inside a Tokio runtime; opening continues in the
    /// background.
    pub fn open(config: BoardConfig) -> Self {
        let factory: Arc<dyn DatabaseFactory> = Arc::new(config.factory());
        Self::with_factory(factory, &config)
    }

    /// Opens both stores through `factory`, ignoring `config.location`.
    pub fn with_factory(factory: Arc<dyn DatabaseFactory>, config: &BoardConfig) -> Self {
        let logs = LogStore::open(Arc::clone(&factory), config.engine.clone(), &config.log_version);
        let sink: Arc<dyn EventSink> = Arc::new(logs.clone());
        let messages = MessageStore::open(factory, config.engine.clone(), Some(sink));
        Self { messages, logs }
    }

    /// The message store.
    #[must_use]
    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    /// The log store.
    #[must_use]
    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    /// Waits for both databases to settle; returns (messages, logs) states.
    pub async fn ready(&self) -> (ConnectionState, ConnectionState) {
        tokio::join!(self.messages.engine().ready(), self.logs.engine().ready())
    }

    /// Reads both stores.
    ///
    /// Messages are read first; the logs are read once every pending
    /// report has landed, so they include the entries for the messages
    /// just shown.
    ///
    /// # Errors
    ///
    /// Fails if either database is not open.
    pub async fn snapshot(&self) -> BoardResult<Snapshot> {
        let messages = self.messages.fetch_all().await?;
        self.logs.settled().await;
        let logs = self.logs.fetch_all().await?;
        Ok(Snapshot { messages, logs })
    }
}
