//! Record timestamps.

use chrono::{Local, NaiveDateTime};

/// The current local time as stored in records, e.g. `2024/5/1 10:20:30`.
#[must_use]
pub fn local_timestamp() -> String {
    format_timestamp(&Local::now().naive_local())
}

/// Formats a time the way records store it: unpadded year, month and
/// day, zero-padded clock.
#[must_use]
pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format("%Y/%-m/%-d %H:%M:%S").to_string()
}
