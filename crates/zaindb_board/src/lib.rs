//! # ZainDB Board
//!
//! Two record stores built on [`zaindb_core`]:
//!
//! - [`MessageStore`]: a message board (`ZainMessage-DB`) with name, mail,
//!   content, time and id-range search
//! - [`LogStore`]: an offline log (`ZainLog-DB`) that also records the
//!   message engine's diagnostics
//!
//! [`AppContext`] wires both together over one factory.
//!
//! ```rust,no_run
//! use zaindb_board::{AppContext, BoardConfig, MessageFilter};
//!
//! # async fn demo() -> zaindb_board::BoardResult<()> {
//! let app = AppContext::open(BoardConfig::default());
//! app.ready().await;
//!
//! app.messages().try_create().await?;
//! let filter = MessageFilter::default().name("zain");
//! let found = app.messages().find(&filter).await?;
//!
//! let snapshot = app.snapshot().await?;
//! println!("{} messages, {} log entries", snapshot.messages.len(), snapshot.logs.len());
//! # let _ = found;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod context;
mod error;
mod filter;
mod log;
mod message;

pub use clock::{format_timestamp, local_timestamp};
pub use config::BoardConfig;
pub use context::{AppContext, Snapshot};
pub use error::{BoardError, BoardResult};
pub use filter::{Criterion, IdFilter, MessageFilter};
pub use log::{LogEntry, LogStore, DEFAULT_LOG_VERSION, LOG_DB, LOG_TABLE};
pub use message::{Message, MessageStore, MESSAGE_DB, MESSAGE_TABLE};
