//! Journal writer and replay.

use crate::error::{CoreError, CoreResult};
use crate::journal::record::{decode_frames, encode_frame, Frame, FrameRef, JournalOp};
use tracing::{error, info, warn};
use zaindb_storage::ByteStore;

/// Journal size below which no checkpoint is taken.
pub const DEFAULT_CHECKPOINT_BYTES: u64 = 1024 * 1024;

/// Append-only change log for one database.
///
/// Each transaction is written as a single append of
/// `Begin, Op.., Commit`. Replay only applies groups that reached their
/// `Commit`, so a crash mid-append loses that transaction and nothing else.
///
/// A write that fails is cut off again before the error is returned, so
/// later commits never land behind a torn frame. If even that fails the
/// journal refuses every further commit.
pub struct Journal {
    store: Box<dyn ByteStore>,
    next_txid: u64,
    sync_on_commit: bool,
    checkpoint_bytes: u64,
    /// Size right after the last checkpoint.
    base_len: u64,
    poisoned: bool,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("next_txid", &self.next_txid)
            .field("sync_on_commit", &self.sync_on_commit)
            .field("checkpoint_bytes", &self.checkpoint_bytes)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl Journal {
    /// Opens a journal and returns the committed transactions it holds.
    ///
    /// A damaged tail is truncated away with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or truncated.
    pub fn open(
        mut store: Box<dyn ByteStore>,
        sync_on_commit: bool,
    ) -> CoreResult<(Self, Vec<Vec<JournalOp>>)> {
        let bytes = store.read_all()?;
        let decoded = decode_frames(&bytes);

        if let Some(damage) = &decoded.damage {
            warn!(
                valid = decoded.valid_len,
                total = bytes.len(),
                "dropping damaged journal tail {damage}"
            );
            store.truncate(decoded.valid_len as u64)?;
        }

        let mut committed = Vec::new();
        let mut open: Option<(u64, Vec<JournalOp>)> = None;
        let mut max_txid = 0;

        for frame in decoded.frames {
            match frame {
                Frame::Begin { txid } => {
                    if open.is_some() {
                        warn!(txid, "transaction began before the previous one committed");
                    }
                    max_txid = max_txid.max(txid);
                    open = Some((txid, Vec::new()));
                }
                Frame::Op(op) => match open.as_mut() {
                    Some((_, ops)) => ops.push(op),
                    None => warn!("skipping journal operation outside a transaction"),
                },
                Frame::Commit { txid } => match open.take() {
                    Some((begun, ops)) if begun == txid => committed.push(ops),
                    _ => warn!(txid, "skipping commit without a matching begin"),
                },
            }
        }

        let journal = Self {
            store,
            next_txid: max_txid + 1,
            sync_on_commit,
            checkpoint_bytes: DEFAULT_CHECKPOINT_BYTES,
            base_len: 0,
            poisoned: false,
        };
        Ok((journal, committed))
    }

    /// Sets the size the journal may reach before a checkpoint is due.
    #[must_use]
    pub fn checkpoint_bytes(mut self, bytes: u64) -> Self {
        self.checkpoint_bytes = bytes;
        self
    }

    /// Durably appends one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, the append or the sync fails. The
    /// transaction is not in the journal in that case.
    pub fn commit(&mut self, ops: &[JournalOp]) -> CoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.ensure_writable()?;

        let data = encode_group(self.next_txid, ops)?;
        let start = self.store.len()?;
        let written = match self.store.append(&data) {
            Ok(_) if self.sync_on_commit => self.store.sync(),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.cut_back(start);
            return Err(e.into());
        }

        self.next_txid += 1;
        Ok(())
    }

    /// Returns `true` once the journal has outgrown its last checkpoint.
    ///
    /// A checkpoint is due when the journal is larger than both the
    /// configured threshold and twice its size after the last checkpoint.
    #[must_use]
    pub fn needs_checkpoint(&self) -> bool {
        let limit = self.checkpoint_bytes.max(self.base_len.saturating_mul(2));
        matches!(self.store.len(), Ok(size) if size > limit)
    }

    /// Rewrites the whole journal as one transaction holding `snapshot`.
    ///
    /// `snapshot` must rebuild the current state from nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be encoded or written; the
    /// previous journal is kept in that case.
    pub fn checkpoint(&mut self, snapshot: &[JournalOp]) -> CoreResult<()> {
        self.ensure_writable()?;

        let data = encode_group(self.next_txid, snapshot)?;
        let before = self.store.len()?;
        self.store.replace(&data)?;
        self.next_txid += 1;
        self.base_len = data.len() as u64;

        info!(before, after = self.base_len, ops = snapshot.len(), "journal checkpointed");
        Ok(())
    }

    /// Returns the size of the journal in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot report its size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.store.len()?)
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.poisoned {
            return Err(CoreError::invalid_operation(
                "journal holds a torn write that could not be removed",
            ));
        }
        Ok(())
    }

    /// Drops whatever a failed write left behind `len`.
    fn cut_back(&mut self, len: u64) {
        match self.store.truncate(len) {
            Ok(()) => warn!(len, "failed journal write rolled back"),
            Err(e) => {
                error!(len, "cannot roll back failed journal write, refusing commits: {e}");
                self.poisoned = true;
            }
        }
    }
}

/// Encodes `Begin, Op.., Commit` for one transaction.
fn encode_group(txid: u64, ops: &[JournalOp]) -> CoreResult<Vec<u8>> {
    let mut data = Vec::new();
    encode_frame(&FrameRef::Begin { txid }, &mut data)?;
    for op in ops {
        encode_frame(&FrameRef::Op(op), &mut data)?;
    }
    encode_frame(&FrameRef::Commit { txid }, &mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::record::HEADER_SIZE;
    use crate::key::Key;
    use ciborium::Value;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use zaindb_storage::{MemoryStore, StorageError, StorageResult};

    #[derive(Default)]
    struct Faults {
        tear_append: bool,
        fail_sync: bool,
        fail_truncate: bool,
    }

    /// A memory store that fails on demand.
    #[derive(Clone, Default)]
    struct FaultyStore {
        inner: MemoryStore,
        faults: Arc<Mutex<Faults>>,
    }

    fn broken(what: &str) -> StorageError {
        StorageError::Io(io::Error::other(what.to_string()))
    }

    impl ByteStore for FaultyStore {
        fn len(&self) -> StorageResult<u64> {
            self.inner.len()
        }

        fn read_all(&self) -> StorageResult<Vec<u8>> {
            self.inner.read_all()
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if std::mem::take(&mut self.faults.lock().tear_append) {
                self.inner.append(&data[..data.len() / 2])?;
                return Err(broken("disk full"));
            }
            self.inner.append(data)
        }

        fn sync(&mut self) -> StorageResult<()> {
            if std::mem::take(&mut self.faults.lock().fail_sync) {
                return Err(broken("sync failed"));
            }
            self.inner.sync()
        }

        fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
            if self.faults.lock().fail_truncate {
                return Err(broken("read-only"));
            }
            self.inner.truncate(new_len)
        }

        fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
            self.inner.replace(data)
        }
    }

    fn put(n: i64) -> JournalOp {
        JournalOp::Put {
            table: "logs".into(),
            key: Key::from(n),
            value: Value::Integer(n.into()),
        }
    }

    #[test]
    fn committed_groups_replay() {
        let store = MemoryStore::new();
        {
            let (mut journal, replay) = Journal::open(Box::new(store.clone()), true).unwrap();
            assert!(replay.is_empty());
            journal.commit(&[put(1), put(2)]).unwrap();
            journal.commit(&[JournalOp::Clear { table: "logs".into() }]).unwrap();
            journal.commit(&[]).unwrap();
        }

        let (journal, replay) = Journal::open(Box::new(store), true).unwrap();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0], vec![put(1), put(2)]);
        assert_eq!(journal.next_txid, 3);
    }

    #[test]
    fn uncommitted_group_is_ignored() {
        let mut bytes = Vec::new();
        let op = put(9);
        encode_frame(&FrameRef::Begin { txid: 1 }, &mut bytes).unwrap();
        encode_frame(&FrameRef::Op(&op), &mut bytes).unwrap();

        let store = MemoryStore::with_data(bytes.clone());
        let (_, replay) = Journal::open(Box::new(store.clone()), false).unwrap();
        assert!(replay.is_empty());
        assert_eq!(store.len().unwrap(), bytes.len() as u64);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let store = MemoryStore::new();
        {
            let (mut journal, _) = Journal::open(Box::new(store.clone()), false).unwrap();
            journal.commit(&[put(1)]).unwrap();
        }
        let good = store.len().unwrap();

        let mut torn = store.clone();
        torn.append(&b"ZJNL"[..]).unwrap();
        torn.append(&[0u8; HEADER_SIZE]).unwrap();

        let (journal, replay) = Journal::open(Box::new(store.clone()), false).unwrap();
        assert_eq!(replay, vec![vec![put(1)]]);
        assert_eq!(journal.size().unwrap(), good);
    }

    #[test]
    fn torn_append_does_not_hide_later_commits() {
        let store = FaultyStore::default();
        let (mut journal, _) = Journal::open(Box::new(store.clone()), false).unwrap();
        journal.commit(&[put(1)]).unwrap();
        let good = store.len().unwrap();

        store.faults.lock().tear_append = true;
        assert!(journal.commit(&[put(2)]).is_err());
        assert_eq!(store.len().unwrap(), good);

        journal.commit(&[put(3)]).unwrap();
        journal.commit(&[put(4)]).unwrap();

        let (_, replay) = Journal::open(Box::new(store.inner.clone()), false).unwrap();
        assert_eq!(replay, vec![vec![put(1)], vec![put(3)], vec![put(4)]]);
    }

    #[test]
    fn failed_sync_is_not_replayed() {
        let store = FaultyStore::default();
        let (mut journal, _) = Journal::open(Box::new(store.clone()), true).unwrap();

        store.faults.lock().fail_sync = true;
        assert!(journal.commit(&[put(1)]).is_err());
        journal.commit(&[put(2)]).unwrap();

        let (_, replay) = Journal::open(Box::new(store.inner.clone()), true).unwrap();
        assert_eq!(replay, vec![vec![put(2)]]);
    }

    #[test]
    fn unremovable_torn_write_refuses_commits() {
        let store = FaultyStore::default();
        let (mut journal, _) = Journal::open(Box::new(store.clone()), false).unwrap();

        {
            let mut faults = store.faults.lock();
            faults.tear_append = true;
            faults.fail_truncate = true;
        }
        assert!(journal.commit(&[put(1)]).is_err());

        store.faults.lock().fail_truncate = false;
        assert!(matches!(
            journal.commit(&[put(2)]),
            Err(CoreError::InvalidOperation { .. })
        ));

        let (_, replay) = Journal::open(Box::new(store.inner.clone()), false).unwrap();
        assert!(replay.is_empty());
    }

    #[test]
    fn checkpoint_replaces_history() {
        let store = MemoryStore::new();
        let (journal, _) = Journal::open(Box::new(store.clone()), false).unwrap();
        let mut journal = journal.checkpoint_bytes(64);
        for n in 1..=20 {
            journal.commit(&[put(n)]).unwrap();
        }
        journal
            .commit(&[JournalOp::Clear { table: "logs".into() }])
            .unwrap();
        assert!(journal.needs_checkpoint());

        let generator = JournalOp::SetGenerator {
            table: "logs".into(),
            next_key: 21,
        };
        let before = journal.size().unwrap();
        journal.checkpoint(&[generator.clone()]).unwrap();
        assert!(journal.size().unwrap() < before);
        assert!(!journal.needs_checkpoint());

        journal.commit(&[put(21)]).unwrap();
        let (reopened, replay) = Journal::open(Box::new(store), false).unwrap();
        assert_eq!(replay, vec![vec![generator], vec![put(21)]]);
        assert_eq!(reopened.next_txid, journal.next_txid);
    }
}
