//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Compact millisecond stamp used in export file names
pub fn file_stamp(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
