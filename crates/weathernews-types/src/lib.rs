//! Platform-agnostic types for cached daily weather forecasts.
//!
//! This crate provides the domain types shared by the store, the sync core
//! and the service binary.
//!
//! # Features
//!
//! - [`ForecastRecord`] and its list projection [`ForecastSummary`]
//! - [`ForecastNotice`], the payload handed to notification presenters
//! - [`Location`] for the single location the cache is kept for
//! - Day-granular date helpers in [`dates`]
//! - Weather condition descriptions in [`conditions`]
//!
//! # Example
//!
//! ```
//! use weathernews_types::{ForecastRecord, dates};
//!
//! let today = dates::today_utc();
//! let record = ForecastRecord::new(today, 800, 7.0, 14.0);
//! assert_eq!(record.summary().date, today);
//! ```

pub mod conditions;
pub mod dates;
pub mod error;
pub mod types;

pub use conditions::condition_description;
pub use error::{ParseError, ParseResult};
pub use types::{
    Coordinates, ForecastNotice, ForecastRecord, ForecastSummary, Location, NUM_DAYS,
};
