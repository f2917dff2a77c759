//! Fault injection.
//!
//! Factories that fail in controlled ways, and a sink that records what
//! the engine reported about it.

use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use zaindb_core::{
    CoreError, CoreResult, DatabaseFactory, EngineEvent, EventLevel, EventSink, LocalFactory,
    OpenRequest,
};
use zaindb_storage::StorageError;

/// A factory whose first `failures` opens fail with an I/O error.
///
/// Later opens go to the wrapped [`LocalFactory`].
#[derive(Debug)]
pub struct FlakyFactory {
    inner: LocalFactory,
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyFactory {
    /// Fails the first `failures` opens of an in-memory factory.
    pub fn new(failures: usize) -> Self {
        Self::wrap(LocalFactory::in_memory(), failures)
    }

    /// Fails every open.
    pub fn always() -> Self {
        Self::new(usize::MAX)
    }

    /// Fails the first `failures` opens of `inner`.
    pub fn wrap(inner: LocalFactory, failures: usize) -> Self {
        Self {
            inner,
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of opens attempted so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl DatabaseFactory for FlakyFactory {
    fn open(&self, name: &str, version: u32) -> CoreResult<OpenRequest> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            let err = io::Error::other(format!("injected open failure #{}", attempt + 1));
            return Err(CoreError::Storage(StorageError::Io(err)));
        }
        self.inner.open(name, version)
    }
}

/// A factory for a platform without storage.
#[derive(Debug, Default)]
pub struct UnsupportedFactory {
    opens: AtomicUsize,
}

impl UnsupportedFactory {
    /// Creates the factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `open` was called; the engine should never call it.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DatabaseFactory for UnsupportedFactory {
    fn is_supported(&self) -> bool {
        false
    }

    fn open(&self, _name: &str, _version: u32) -> CoreResult<OpenRequest> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Err(CoreError::NotSupported)
    }
}

/// An [`EventSink`] that keeps every event.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the events received so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    /// Number of events at `level`.
    pub fn count(&self, level: EventLevel) -> usize {
        self.events.lock().iter().filter(|e| e.level == level).count()
    }

    /// Returns true if any event message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.events.lock().iter().any(|e| e.message.contains(needle))
    }
}

impl EventSink for CollectingSink {
    fn record(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}
