//! Engine events forwarded to an application sink.

use std::fmt;

/// Severity of an [`EngineEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventLevel {
    /// Per-record detail.
    Debug,
    /// Lifecycle milestones.
    Info,
    /// Guard rejections.
    Warn,
    /// Failed opens and transactions.
    Error,
}

impl EventLevel {
    /// Numeric code stored alongside persisted events.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Warn => 2,
            Self::Error => 3,
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One diagnostic emitted by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    /// Name of the database that emitted the event.
    pub source: String,
    /// Severity.
    pub level: EventLevel,
    /// Human-readable description.
    pub message: String,
}

/// Receives engine events in addition to `tracing` output.
///
/// Implementations must not block: `record` is called from inside engine
/// operations.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: EngineEvent);
}
