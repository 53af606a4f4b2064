//! Core types for cached forecast data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::Date;

use crate::conditions::condition_description;
use crate::error::{ParseError, ParseResult};

/// Number of forecast days requested from the provider and expected in a
/// fully populated cache.
pub const NUM_DAYS: u32 = 14;

/// One weather forecast for a single calendar day.
///
/// The `date` is day-granular. Stores persist it as the Unix timestamp of UTC
/// midnight, so two records for the same day always compare equal on `date`
/// no matter what time of day they were produced.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastRecord {
    /// Store-assigned row id (0 until the record has been inserted).
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: i64,
    /// Calendar day this forecast is for.
    pub date: Date,
    /// Provider weather-condition code (OpenWeatherMap numbering).
    pub condition_id: i32,
    /// Minimum temperature in Celsius.
    pub min_temp: f64,
    /// Maximum temperature in Celsius.
    pub max_temp: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
    /// Barometric pressure in hPa.
    pub pressure: f64,
    /// Wind speed in m/s.
    pub wind_speed: f64,
    /// Meteorological wind direction in degrees.
    pub wind_direction_degrees: f64,
}

impl ForecastRecord {
    /// Create a record that has not been stored yet.
    pub fn new(date: Date, condition_id: i32, min_temp: f64, max_temp: f64) -> Self {
        Self {
            id: 0,
            date,
            condition_id,
            min_temp,
            max_temp,
            humidity: 0.0,
            pressure: 0.0,
            wind_speed: 0.0,
            wind_direction_degrees: 0.0,
        }
    }

    /// Set the humidity, pressure and wind fields.
    #[must_use]
    pub fn with_conditions(
        mut self,
        humidity: f64,
        pressure: f64,
        wind_speed: f64,
        wind_direction_degrees: f64,
    ) -> Self {
        self.humidity = humidity;
        self.pressure = pressure;
        self.wind_speed = wind_speed;
        self.wind_direction_degrees = wind_direction_degrees;
        self
    }

    /// Project this record to its list-display summary.
    pub fn summary(&self) -> ForecastSummary {
        ForecastSummary {
            id: self.id,
            condition_id: self.condition_id,
            date: self.date,
            min_temp: self.min_temp,
            max_temp: self.max_temp,
        }
    }

    /// Build the notification payload for this day.
    pub fn notice(&self) -> ForecastNotice {
        ForecastNotice {
            condition_id: self.condition_id,
            high_temp: self.max_temp,
            low_temp: self.min_temp,
            date: self.date,
        }
    }
}

/// Projection of [`ForecastRecord`] used for list displays.
///
/// Summaries are produced by read-time queries and never stored on their own.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastSummary {
    /// Store row id.
    pub id: i64,
    /// Provider weather-condition code.
    pub condition_id: i32,
    /// Calendar day.
    pub date: Date,
    /// Minimum temperature in Celsius.
    pub min_temp: f64,
    /// Maximum temperature in Celsius.
    pub max_temp: f64,
}

impl fmt::Display for ForecastSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<18} {:>5.1}°C / {:>5.1}°C",
            self.date,
            condition_description(self.condition_id),
            self.max_temp,
            self.min_temp
        )
    }
}

/// What a notification presenter receives after a refresh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastNotice {
    /// Provider weather-condition code.
    pub condition_id: i32,
    /// High temperature in Celsius.
    pub high_temp: f64,
    /// Low temperature in Celsius.
    pub low_temp: f64,
    /// The day the forecast is for.
    pub date: Date,
}

impl ForecastNotice {
    /// Human readable one-line summary.
    ///
    /// ```
    /// use time::macros::date;
    /// use weathernews_types::ForecastNotice;
    ///
    /// let notice = ForecastNotice {
    ///     condition_id: 800,
    ///     high_temp: 14.2,
    ///     low_temp: 7.0,
    ///     date: date!(2024 - 01 - 15),
    /// };
    /// assert_eq!(notice.text(), "Forecast: Clear - High: 14°C Low: 7°C");
    /// ```
    pub fn text(&self) -> String {
        format!(
            "Forecast: {} - High: {:.0}°C Low: {:.0}°C",
            condition_description(self.condition_id),
            self.high_temp,
            self.low_temp
        )
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinates {
    /// Latitude, -90..=90.
    pub latitude: f64,
    /// Longitude, -180..=180.
    pub longitude: f64,
}

impl Coordinates {
    /// Create a validated coordinate pair.
    pub fn new(latitude: f64, longitude: f64) -> ParseResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ParseError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// The single location the cache is kept for.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Location {
    /// Free-text place name understood by the provider (e.g. "Dhaka,BD").
    Place {
        /// Place query string.
        name: String,
    },
    /// Explicit coordinates.
    Coordinates(Coordinates),
}

impl Location {
    /// Location from a place name.
    pub fn place(name: impl Into<String>) -> Self {
        Self::Place { name: name.into() }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Place { name } => write!(f, "{}", name),
            Self::Coordinates(c) => write!(f, "{:.4},{:.4}", c.latitude, c.longitude),
        }
    }
}
