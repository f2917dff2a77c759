//! # ZainDB Core
//!
//! A small object-store wrapper with IndexedDB semantics.
//!
//! This crate provides:
//! - [`Key`], [`KeyRange`] and the typed [`RangeSpec`] query algebra
//! - [`SchemaDescriptor`] for declaring tables and (composite) indexes
//! - A local engine ([`LocalFactory`], [`Connection`], [`Cursor`]) that keeps
//!   tables in memory and optionally journals them to disk
//! - [`StorageEngine`], which owns one versioned connection, creates the
//!   schema on upgrade, retries failed opens and runs CRUD and range queries
//! - [`RecordStore`], a typed façade bound to one table
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zaindb_core::{IndexSpec, LocalFactory, RangeSpec, SchemaDescriptor, StorageEngine};
//!
//! # #[derive(serde::Serialize, serde::Deserialize)] struct Note { id: Option<i64>, title: String }
//! # async fn demo() {
//! let schema = SchemaDescriptor::new("notes")
//!     .key_path("id")
//!     .auto_increment(true)
//!     .index(IndexSpec::single("id"));
//! let engine = StorageEngine::open(Arc::new(LocalFactory::in_memory()), "notes-db", 1, vec![schema]);
//! engine.ready().await;
//!
//! engine.add("notes", [Note { id: None, title: "hi".into() }], |_| {});
//! let range = RangeSpec::Bound { lower: 1.into(), upper: 10.into(), lower_exclusive: false, upper_exclusive: true };
//! engine.search_range("notes", "id", Some(range), |notes: Vec<Note>| println!("{}", notes.len()));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
pub mod engine;
mod error;
mod event;
mod journal;
mod key;
mod range;
mod record;
mod schema;
mod state;
mod store;

pub use config::Config;
pub use database::{Completion, EngineBuilder, StorageEngine};
pub use engine::{
    Connection, Cursor, CursorEntry, DatabaseFactory, LocalFactory, Location, OpenRequest, Source,
    VersionChange, WriteTxn,
};
pub use error::{CoreError, CoreResult};
pub use event::{EngineEvent, EventLevel, EventSink};
pub use journal::DEFAULT_CHECKPOINT_BYTES;
pub use key::{Key, KeyPath};
pub use range::{KeyRange, RangeKind, RangeSpec};
pub use record::{from_value, to_value};
pub use schema::{IndexSpec, SchemaDescriptor};
pub use state::ConnectionState;
pub use store::RecordStore;

/// Structured record value as stored by the engine.
pub use ciborium::Value;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
