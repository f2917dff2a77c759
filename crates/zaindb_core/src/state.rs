//! Connection lifecycle states.

use std::fmt;

/// Where a [`StorageEngine`](crate::StorageEngine) is in its open lifecycle.
///
/// ```text
/// Closed ──open──> Opening ──needs upgrade──> UpgradeInProgress ──> Open
///                     │ failure, retries left: back to Opening
///                     └ failure, retries exhausted: Failed
/// Closed ──no storage on platform──> Unsupported
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No open has been requested yet.
    #[default]
    Closed,
    /// An open attempt is in flight.
    Opening,
    /// The schema is being created or extended.
    UpgradeInProgress,
    /// Connection is usable.
    Open,
    /// Every open attempt failed.
    Failed {
        /// Number of failed attempts.
        retries: u32,
    },
    /// The platform has no storage facility.
    Unsupported,
}

impl ConnectionState {
    /// Returns `true` if operations can run.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` once the lifecycle has reached a resting state.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Open | Self::Failed { .. } | Self::Unsupported)
    }

    /// Returns `true` if a guard may re-issue an open from this state.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Closed | Self::Opening | Self::UpgradeInProgress)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Opening => write!(f, "opening"),
            Self::UpgradeInProgress => write!(f, "upgrading"),
            Self::Open => write!(f, "open"),
            Self::Failed { retries } => write!(f, "failed after {retries} attempts"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}
