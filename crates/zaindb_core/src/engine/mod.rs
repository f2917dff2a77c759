//! The object-store engine.
//!
//! A [`DatabaseFactory`] hands out [`OpenRequest`]s for named, versioned
//! databases. Once a request is finished (after an upgrade if the version
//! went up) the caller holds a [`Connection`], which runs read cursors and
//! read-write transactions.
//!
//! ```text
//! factory.open(name, version) ─> OpenRequest ─upgrade(f)─> Connection
//!                                                          ├─ open_cursor ─> Cursor
//!                                                          └─ write(scope, f) ─> WriteTxn
//! ```
//!
//! [`LocalFactory`] is the bundled implementation: tables live in memory
//! and, for directory factories, are journaled to a
//! [`ByteStore`](zaindb_storage::ByteStore).

mod catalog;
mod connection;
mod cursor;
mod local;
mod table;
mod undo;

pub use connection::{Connection, OpenRequest, VersionChange, WriteTxn};
pub use cursor::{Cursor, CursorEntry};
pub use local::{LocalFactory, Location};

use crate::error::CoreResult;
use std::sync::Arc;

/// What a cursor walks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source<'a> {
    /// The table itself, in primary key order.
    Table,
    /// A named index, in (index key, primary key) order.
    Index(&'a str),
}

/// Opens named, versioned databases.
pub trait DatabaseFactory: Send + Sync {
    /// Returns `false` if the platform has no storage facility at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Requests a database at `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, or if `version`
    /// is below the stored version.
    fn open(&self, name: &str, version: u32) -> CoreResult<OpenRequest>;
}

impl<F: DatabaseFactory + ?Sized> DatabaseFactory for Arc<F> {
    fn is_supported(&self) -> bool {
        (**self).is_supported()
    }

    fn open(&self, name: &str, version: u32) -> CoreResult<OpenRequest> {
        (**self).open(name, version)
    }
}
