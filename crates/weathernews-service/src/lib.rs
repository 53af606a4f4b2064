//! Background forecast sync service.
//!
//! This crate runs the forecast pipeline from `weathernews-core` as a
//! long-lived process:
//! - Loads service configuration and user settings from TOML files
//! - Keeps the local forecast cache in sync on a recurring schedule
//! - Shows a forecast notification at most once a day
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/weathernews/service.toml`:
//!
//! ```toml
//! [storage]
//! path = "~/.local/share/weathernews/forecasts.db"
//!
//! [provider]
//! api_key = "your-openweathermap-key"
//!
//! [schedule]
//! interval_secs = 10800 # 3 hours
//! flex_secs = 3600
//! require_network = true
//! settings_poll_secs = 30
//!
//! [notifications]
//! desktop = true # needs the `notifications` feature
//! ```
//!
//! User settings (location, notification toggle, last notification time)
//! live separately in `~/.config/weathernews/settings.toml` and are edited
//! with the `settings` subcommand. A running service re-reads that file
//! every `settings_poll_secs` and syncs right away when the location changes.

pub mod app;
pub mod config;
pub mod notifier;
pub mod settings;

pub use app::{App, AppError, StatusReport};
pub use config::{
    ApiConfig, Config, ConfigError, NotificationConfig, ScheduleConfig, StorageConfig,
    ValidationError, WorkerConfig,
};
pub use notifier::{LogPresenter, presenter_for};
pub use settings::{FileSettings, SettingsError, UserSettings};
