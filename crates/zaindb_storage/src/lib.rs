//! # ZainDB Storage
//!
//! Byte stores that hold a database journal.
//!
//! A store is an **append-only byte log**. It never interprets what it
//! holds: framing, checksums and replay belong to `zaindb_core`.
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - Process-lifetime storage; clones share the same bytes
//! - [`FileStore`] - One file per database, exclusively locked while open
//!
//! ## Example
//!
//! ```rust
//! use zaindb_storage::{ByteStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! store.append(b"frame-1").unwrap();
//! store.append(b"frame-2").unwrap();
//! assert_eq!(store.read_all().unwrap(), b"frame-1frame-2");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::ByteStore;
