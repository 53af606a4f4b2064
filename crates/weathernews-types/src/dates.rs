//! Day-granular date helpers.
//!
//! Forecast dates are normalized to UTC midnight. Everything that compares,
//! stores or queries forecast dates goes through these helpers so that a
//! record produced at 13:05 and a lookup made at 23:59 agree on the day.

use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::error::{ParseError, ParseResult};

/// Number of milliseconds in one day.
pub const DAY_IN_MILLIS: i64 = 86_400_000;

/// The UTC calendar day containing `at`.
pub fn normalize(at: OffsetDateTime) -> Date {
    at.to_offset(UtcOffset::UTC).date()
}

/// Today's date in UTC.
pub fn today_utc() -> Date {
    normalize(OffsetDateTime::now_utc())
}

/// Unix timestamp (seconds) of UTC midnight on `date`.
pub fn to_timestamp(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp()
}

/// The UTC day containing the Unix timestamp `ts` (seconds).
pub fn from_timestamp(ts: i64) -> ParseResult<Date> {
    OffsetDateTime::from_unix_timestamp(ts)
        .map(normalize)
        .map_err(|_| ParseError::InvalidTimestamp(ts))
}

/// `date` shifted by `days` (may be negative).
pub fn add_days(date: Date, days: i64) -> ParseResult<Date> {
    date.checked_add(Duration::days(days))
        .ok_or_else(|| ParseError::DateOutOfRange(format!("{} + {} days", date, days)))
}
