// crates/lake-core/src/core/timestamps.rs
// ============================================================================
// Module: Lake Timestamps
// Description: Millisecond timestamp helpers for snapshot and ingest times.
// Purpose: Keep one conversion path between wall-clock values and storage.
// Dependencies: thiserror, time
// ============================================================================

//! ## Overview
//! The warehouse persists timestamps as unix milliseconds. Snapshot times are
//! truncated to millisecond resolution before they are written so reads
//! compare equal to what callers passed in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;
use time::UtcOffset;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Stored millisecond value outside the representable range.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("timestamp out of range: {0} ms")]
pub struct TimestampRangeError(pub i64);

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Truncates a timestamp to millisecond resolution in UTC.
#[must_use]
pub fn truncate_to_millis(ts: OffsetDateTime) -> OffsetDateTime {
    let ts = ts.to_offset(UtcOffset::UTC);
    let millis_only = ts.nanosecond() / 1_000_000 * 1_000_000;
    ts.replace_nanosecond(millis_only).unwrap_or(ts)
}

/// Converts a timestamp to unix milliseconds (saturating).
#[must_use]
pub fn to_unix_millis(ts: OffsetDateTime) -> i64 {
    let millis = ts.unix_timestamp_nanos() / 1_000_000;
    i64::try_from(millis).unwrap_or(if millis < 0 { i64::MIN } else { i64::MAX })
}

/// Converts unix milliseconds to a UTC timestamp.
///
/// # Errors
///
/// Returns [`TimestampRangeError`] when the value is out of range.
pub fn from_unix_millis(millis: i64) -> Result<OffsetDateTime, TimestampRangeError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|_| TimestampRangeError(millis))
}

/// Returns the current time in unix milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    to_unix_millis(OffsetDateTime::now_utc())
}
