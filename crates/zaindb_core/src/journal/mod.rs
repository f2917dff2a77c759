//! Durable change journal.
//!
//! Every committed transaction and schema upgrade is appended to a
//! [`ByteStore`](zaindb_storage::ByteStore) as framed CBOR. Opening a
//! database replays the journal to rebuild its tables. Once the journal
//! has outgrown its last checkpoint it is rewritten as one transaction
//! that recreates the current tables.

mod record;
mod writer;

pub use record::JournalOp;
pub use writer::{Journal, DEFAULT_CHECKPOINT_BYTES};
