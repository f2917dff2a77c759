//! Board configuration.

use crate::log::DEFAULT_LOG_VERSION;
use std::path::PathBuf;
use zaindb_core::{Config, LocalFactory, Location};

/// Configuration for an [`AppContext`](crate::AppContext).
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Where both databases keep their journals.
    pub location: Location,

    /// Version stamped on every log entry.
    pub log_version: String,

    /// Engine lifecycle settings shared by both databases.
    pub engine: Config,

    /// Whether every commit is synced to disk.
    pub sync_on_commit: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            location: Location::Memory,
            log_version: DEFAULT_LOG_VERSION.to_string(),
            engine: Config::default(),
            sync_on_commit: true,
        }
    }
}

impl BoardConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps journals in `dir`.
    #[must_use]
    pub fn in_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.location = Location::Directory(dir.into());
        self
    }

    /// Sets the version stamped on log entries.
    #[must_use]
    pub fn log_version(mut self, version: impl Into<String>) -> Self {
        self.log_version = version.into();
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn engine(mut self, config: Config) -> Self {
        self.engine = config;
        self
    }

    /// Sets whether commits are synced.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Builds the factory both stores open through.
    #[must_use]
    pub fn factory(&self) -> LocalFactory {
        LocalFactory::new(self.location.clone()).sync_on_commit(self.sync_on_commit)
    }
}
