// crates/query-stats-core/src/core/time.rs
// ============================================================================
// Module: Query Stats Time Model
// Description: Second-precision timestamps taken from proxy log lines.
// Purpose: Parse and render the `YYYY-MM-DD HH:MM:SS` form used end to end.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Proxy log lines, inventory launch times and sink rows all share the same
//! wall-clock layout without a zone designator. [`LogTimestamp`] wraps a
//! [`PrimitiveDateTime`] so the layout is parsed strictly and rendered the
//! same way everywhere.

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
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Layout shared by log lines, launch times and sink rows.
const LOG_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp parsing and rendering errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// Input does not match `YYYY-MM-DD HH:MM:SS`.
    #[error("invalid timestamp: {0}")]
    Parse(String),
    /// Unix seconds fall outside the supported range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(i64),
}

// ============================================================================
// SECTION: Log Timestamp
// ============================================================================

/// Wall-clock timestamp with second precision and no zone.
///
/// # Invariants
/// - Parsing is exact: no surrounding whitespace, no fractional seconds.
/// - Rendering always produces zero-padded `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogTimestamp(PrimitiveDateTime);

impl LogTimestamp {
    /// Parses a `YYYY-MM-DD HH:MM:SS` value.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Parse`] when the input does not match exactly.
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        PrimitiveDateTime::parse(value, LOG_TIMESTAMP_FORMAT)
            .map(Self)
            .map_err(|err| TimestampError::Parse(err.to_string()))
    }

    /// Builds a timestamp from unix seconds, interpreted as UTC.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::OutOfRange`] when the value cannot be represented.
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, TimestampError> {
        let instant = OffsetDateTime::from_unix_timestamp(seconds)
            .map_err(|_| TimestampError::OutOfRange(seconds))?;
        Ok(Self(PrimitiveDateTime::new(instant.date(), instant.time())))
    }

    /// Returns the underlying date-time value.
    #[must_use]
    pub const fn as_primitive(&self) -> PrimitiveDateTime {
        self.0
    }
}

impl fmt::Display for LogTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.0.format(LOG_TIMESTAMP_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl Serialize for LogTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
