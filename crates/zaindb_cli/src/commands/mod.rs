//! CLI command implementations.

pub mod logs;
pub mod messages;

use clap::ValueEnum;
use serde::Serialize;
use std::path::Path;
use tracing::debug;
use zaindb_board::{AppContext, BoardConfig};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One line per record.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Opens both databases under `path` and waits until they are usable.
pub async fn open(path: &Path, log_version: &str) -> Result<AppContext, Box<dyn std::error::Error>> {
    let config = BoardConfig::new()
        .in_directory(path)
        .log_version(log_version);
    debug!(path = %path.display(), log_version, "opening board");
    let app = AppContext::open(config);

    let (messages, logs) = app.ready().await;
    if !messages.is_open() {
        return Err(format!("message database unavailable at {path:?} ({messages})").into());
    }
    if !logs.is_open() {
        return Err(format!("log database unavailable at {path:?} ({logs})").into());
    }
    Ok(app)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
