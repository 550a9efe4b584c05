// crates/incident-plane-core/src/core/time.rs
// ============================================================================
// Module: Incident Plane Time Model
// Description: Canonical millisecond timestamps with RFC 3339 wire form.
// Purpose: Provide deterministic, replayable time values across pipeline records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The pipeline uses explicit time values carried inside requests and records
//! to keep replay deterministic. The core never reads wall-clock time; hosts
//! supply every `current_time` as a parameter. Timestamps are unix epoch
//! milliseconds and serialize as ISO-8601 UTC strings with exactly
//! millisecond precision (`2026-01-16T10:00:00.000Z`), the only form that may
//! participate in identity hashes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds per minute.
const MILLIS_PER_MINUTE: i64 = 60_000;
/// Milliseconds per hour.
const MILLIS_PER_HOUR: i64 = 3_600_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when parsing or converting timestamps.
#[derive(Debug, Error)]
pub enum TimeError {
    /// Timestamp string failed RFC 3339 parsing.
    #[error("invalid timestamp: {0}")]
    Parse(String),
    /// Timestamp is outside the representable range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(i64),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp in unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - The wire form is fixed at millisecond precision so that identical instants
///   always render to identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(&self) -> i64 {
        self.0
    }

    /// Parses an RFC 3339 timestamp string.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Parse`] when the string is not valid RFC 3339.
    pub fn parse(value: &str) -> Result<Self, TimeError> {
        let parsed = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|err| TimeError::Parse(err.to_string()))?;
        let nanos = parsed.unix_timestamp_nanos();
        let millis =
            i64::try_from(nanos / 1_000_000).map_err(|_| TimeError::Parse(value.to_string()))?;
        Ok(Self(millis))
    }

    /// Renders the timestamp as an ISO-8601 UTC string with millisecond precision.
    ///
    /// The rendering is byte-stable: the same instant always produces the same
    /// string, which is a precondition for its use inside identity hashes.
    #[must_use]
    pub fn to_rfc3339_millis(&self) -> String {
        let seconds = self.0.div_euclid(1_000);
        let millis = self.0.rem_euclid(1_000);
        OffsetDateTime::from_unix_timestamp(seconds).map_or_else(
            |_| format!("invalid({})", self.0),
            |datetime| {
                format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
                    datetime.year(),
                    u8::from(datetime.month()),
                    datetime.day(),
                    datetime.hour(),
                    datetime.minute(),
                    datetime.second(),
                    millis
                )
            },
        )
    }

    /// Truncates the timestamp down to the given boundary.
    #[must_use]
    pub const fn truncate(&self, boundary: WindowTruncation) -> Self {
        let unit = match boundary {
            WindowTruncation::Minute => MILLIS_PER_MINUTE,
            WindowTruncation::Hour => MILLIS_PER_HOUR,
        };
        Self(self.0 - self.0.rem_euclid(unit))
    }

    /// Returns the timestamp shifted back by whole minutes.
    #[must_use]
    pub const fn minus_minutes(&self, minutes: u32) -> Self {
        Self(self.0 - (minutes as i64) * MILLIS_PER_MINUTE)
    }

    /// Returns the signed difference `self - other` in milliseconds.
    #[must_use]
    pub const fn millis_since(&self, other: Self) -> i64 {
        self.0 - other.0
    }

    /// Returns the signed difference `self - other` in whole minutes.
    #[must_use]
    pub const fn minutes_since(&self, other: Self) -> i64 {
        (self.0 - other.0) / MILLIS_PER_MINUTE
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339_millis())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339_millis())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Window Truncation
// ============================================================================

/// Boundary used when a correlation window participates in key fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowTruncation {
    /// Truncate to the start of the minute.
    Minute,
    /// Truncate to the start of the hour.
    Hour,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
