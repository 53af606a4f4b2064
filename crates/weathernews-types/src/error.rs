//! Error types for data conversion in weathernews-types.

use thiserror::Error;

/// Errors that can occur when converting forecast data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A stored or received timestamp does not map to a calendar date.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// A date could not be shifted by the requested number of days.
    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    /// A coordinate pair is outside the valid latitude/longitude range.
    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
}

/// Result type alias using weathernews-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
