//! Time types for reminder evaluation.
//!
//! This module provides [`Minute`], a UTC instant truncated to minute
//! resolution that trigger matching compares on, and [`TimeWindow`] for
//! defining calendar query ranges.

use std::fmt;

use chrono::{DateTime, TimeDelta, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Truncates a UTC datetime to minute resolution.
///
/// Seconds and sub-second precision are discarded, never rounded.
pub fn truncate_to_minute(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0)
        .and_then(|d| d.with_second(0))
        .unwrap_or(dt)
}

/// A UTC instant truncated to the minute.
///
/// Two `Minute`s are equal when they fall in the same wall-clock minute,
/// regardless of the offset the source datetimes were expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Minute(DateTime<Utc>);

impl Minute {
    /// Creates a `Minute` from a UTC datetime, discarding seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_minute(dt))
    }

    /// Creates a `Minute` from a datetime in any timezone.
    pub fn from_local<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::from_utc(dt.with_timezone(&Utc))
    }

    /// Returns the underlying UTC datetime (always on a minute boundary).
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the minute shifted by the given number of minutes, or `None`
    /// when the result falls outside the representable date range.
    pub fn plus_minutes(&self, minutes: i64) -> Option<Self> {
        TimeDelta::try_minutes(minutes)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map(Self)
    }

    /// Returns the Unix timestamp of this minute in seconds.
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl fmt::Display for Minute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%MZ"))
    }
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a time window starting at `now` and spanning the given number of days.
    ///
    /// Negative day counts are treated as zero. Returns `None` when the end
    /// of the window would overflow the representable date range.
    pub fn days_from(now: DateTime<Utc>, days: i64) -> Option<Self> {
        let end = TimeDelta::try_days(days.max(0)).and_then(|span| now.checked_add_signed(span))?;
        Some(Self::new(now, end))
    }
}
