//! Undo records for write transactions applied in place.

use crate::engine::table::Table;
use crate::key::Key;
use ciborium::Value;
use std::collections::BTreeMap;

/// The inverse of one change made inside a write transaction.
#[derive(Debug)]
pub(crate) enum Undo {
    /// Put `previous` back under `key`, or drop the key if it was absent.
    Record {
        table: String,
        key: Key,
        previous: Option<Value>,
    },
    /// Refill a table emptied by a clear.
    Refill {
        table: String,
        records: BTreeMap<Key, Value>,
    },
    /// Move a key generator back.
    Generator { table: String, next_key: i64 },
}

/// Reverts `log`, newest change first.
pub(crate) fn rollback(tables: &mut BTreeMap<String, Table>, log: Vec<Undo>) {
    for undo in log.into_iter().rev() {
        match undo {
            Undo::Record {
                table,
                key,
                previous,
            } => {
                if let Some(t) = tables.get_mut(&table) {
                    match previous {
                        Some(value) => t.put_back(key, value),
                        None => {
                            t.remove(&key);
                        }
                    }
                }
            }
            Undo::Refill { table, records } => {
                if let Some(t) = tables.get_mut(&table) {
                    for (key, value) in records {
                        t.put_back(key, value);
                    }
                }
            }
            Undo::Generator { table, next_key } => {
                if let Some(t) = tables.get_mut(&table) {
                    t.restore_generator(next_key);
                }
            }
        }
    }
}
