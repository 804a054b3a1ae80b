//! Timestamp utilities for watermarks and file modification times.

use chrono::{DateTime, Duration, Utc};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns a stamp strictly later than `previous`.
///
/// Normally this is the current time. When the clock has not moved past the
/// previous stamp (coarse clocks, skew) the previous stamp plus one
/// microsecond is used, so watermarks only ever move forward.
#[must_use]
pub fn next_stamp(previous: Option<Timestamp>) -> Timestamp {
    let now = now_utc();
    match previous {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}

/// Converts a `SystemTime` to a UTC timestamp.
#[must_use]
pub fn from_system_time(time: SystemTime) -> Timestamp {
    DateTime::<Utc>::from(time)
}

/// Returns the modification time of `path`, or `None` if it does not exist.
///
/// Any other failure is returned unchanged.
pub fn modified_time(path: &Path) -> io::Result<Option<Timestamp>> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(Some(from_system_time(metadata.modified()?))),
        Err(e) if crate::errors::is_not_found(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Formats a timestamp as ISO 8601 string.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
