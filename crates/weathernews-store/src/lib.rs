//! Local cache for daily weather forecasts.
//!
//! This crate provides SQLite-based storage holding at most one forecast per
//! calendar day. The sync layer replaces the whole cache after each
//! successful download; the UI reads it back by day or from a day onward.
//!
//! # Features
//!
//! - Atomic replace of the whole forecast set
//! - Upsert semantics on the day key (the later write wins)
//! - Exact-day lookups and "from this day onward" listings
//! - Counting days at or after a date, for freshness checks
//!
//! # Example
//!
//! ```no_run
//! use weathernews_store::Store;
//! use weathernews_types::dates;
//!
//! let store = Store::open_default()?;
//!
//! let today = dates::today_utc();
//! for summary in store.get_from(today)? {
//!     println!("{summary}");
//! }
//! # Ok::<(), weathernews_store::Error>(())
//! ```

mod error;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use queries::ForecastQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/weathernews/forecasts.db`
/// - macOS: `~/Library/Application Support/weathernews/forecasts.db`
/// - Windows: `C:\Users\<user>\AppData\Local\weathernews\forecasts.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("weathernews")
        .join("forecasts.db")
}
