//! Cursors over table and index scans.

use crate::key::Key;
use ciborium::Value;

/// One position of a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorEntry {
    /// Key of the source: the index key for index scans, else the primary key.
    pub key: Key,
    /// Primary key of the record.
    pub primary_key: Key,
    /// The stored record.
    pub value: Value,
}

/// A snapshot of a scan, iterated in ascending key order.
///
/// The entries are captured when the cursor is opened; writes committed
/// afterwards do not affect it.
#[derive(Debug)]
pub struct Cursor {
    entries: std::vec::IntoIter<CursorEntry>,
}

impl Cursor {
    pub(crate) fn new(entries: Vec<CursorEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for Cursor {
    type Item = CursorEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Cursor {}
