//! Engine configuration.

use crate::event::EventLevel;
use std::time::Duration;

/// Configuration for a [`StorageEngine`](crate::StorageEngine).
#[derive(Debug, Clone)]
pub struct Config {
    /// Failed opens tolerated before the engine gives up.
    ///
    /// With the default of 3 the engine makes four attempts in total.
    pub max_open_retries: u32,

    /// Pause between a failed open and the next attempt.
    pub retry_delay: Duration,

    /// Whether an operation issued before the connection is open may
    /// re-issue the open request.
    pub reconnect_on_guard: bool,

    /// Lowest level forwarded to the attached event sink.
    pub event_level: EventLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_open_retries: 3,
            retry_delay: Duration::ZERO,
            reconnect_on_guard: true,
            event_level: EventLevel::Info,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many failed opens are tolerated.
    #[must_use]
    pub const fn max_open_retries(mut self, retries: u32) -> Self {
        self.max_open_retries = retries;
        self
    }

    /// Sets the pause between open attempts.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets whether guards may re-issue the open request.
    #[must_use]
    pub const fn reconnect_on_guard(mut self, value: bool) -> Self {
        self.reconnect_on_guard = value;
        self
    }

    /// Sets the lowest level forwarded to the event sink.
    #[must_use]
    pub const fn event_level(mut self, level: EventLevel) -> Self {
        self.event_level = level;
        self
    }
}
