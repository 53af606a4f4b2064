//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use weathernews_core::provider::DEFAULT_BASE_URL;
use weathernews_core::{
    DEFAULT_NETWORK_CONCURRENCY, ProviderConfig, RecurringSchedule, SYNC_FLEX, SYNC_INTERVAL,
};
use weathernews_types::NUM_DAYS;

/// Minimum sync interval in seconds (15 minutes).
pub const MIN_SYNC_INTERVAL: u64 = 15 * 60;

/// Maximum sync interval in seconds (1 day).
pub const MAX_SYNC_INTERVAL: u64 = 24 * 60 * 60;

/// Maximum seconds between settings file checks (1 hour).
pub const MAX_SETTINGS_POLL: u64 = 60 * 60;

/// Maximum concurrent network tasks.
pub const MAX_NETWORK_CONCURRENCY: usize = 64;

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Forecast provider settings.
    pub provider: ApiConfig,
    /// Recurring sync settings.
    pub schedule: ScheduleConfig,
    /// Worker pool settings.
    pub workers: WorkerConfig,
    /// Notification settings.
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Storage paths are not empty
    /// - The provider URL is http(s) and the timeout is 1-300 seconds
    /// - The sync interval is between 15 minutes and 1 day, and the flex
    ///   window is no longer than the interval
    /// - Network concurrency is 1-64
    ///
    /// # Example
    ///
    /// ```
    /// use weathernews_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.storage.validate());
        errors.extend(self.provider.validate());
        errors.extend(self.schedule.validate());
        errors.extend(self.workers.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Forecast database file path.
    pub path: PathBuf,
    /// User settings file path.
    pub settings_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: weathernews_store::default_db_path(),
            settings_path: crate::settings::default_settings_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }
        if self.settings_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.settings_path".to_string(),
                message: "settings path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Forecast provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API host, e.g. `https://api.openweathermap.org`.
    pub base_url: String,
    /// OpenWeatherMap API key.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Validate provider configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            errors.push(ValidationError {
                field: "provider.base_url".to_string(),
                message: format!(
                    "invalid URL '{}': must start with http:// or https://",
                    self.base_url
                ),
            });
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            errors.push(ValidationError {
                field: "provider.timeout_secs".to_string(),
                message: format!(
                    "timeout {} is out of range (1-300 seconds)",
                    self.timeout_secs
                ),
            });
        }

        errors
    }

    /// Fail unless an API key is set.
    pub fn require_api_key(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Validation(vec![ValidationError {
                field: "provider.api_key".to_string(),
                message: "an OpenWeatherMap API key is required to fetch forecasts".to_string(),
            }]));
        }
        Ok(())
    }

    /// Connection settings for the HTTP client.
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            days: NUM_DAYS,
        }
    }
}

/// Recurring sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between syncs.
    pub interval_secs: u64,
    /// Extra random delay allowed per sync, in seconds.
    pub flex_secs: u64,
    /// Skip syncs while offline.
    pub require_network: bool,
    /// `host:port` probed to decide whether we are online.
    pub probe_address: String,
    /// Probe timeout in seconds.
    pub probe_timeout_secs: u64,
    /// Seconds between checks of the settings file while running.
    pub settings_poll_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: SYNC_INTERVAL.as_secs(),
            flex_secs: SYNC_FLEX.as_secs(),
            require_network: true,
            probe_address: "api.openweathermap.org:443".to_string(),
            probe_timeout_secs: 5,
            settings_poll_secs: 30,
        }
    }
}

impl ScheduleConfig {
    /// Validate schedule configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_secs < MIN_SYNC_INTERVAL {
            errors.push(ValidationError {
                field: "schedule.interval_secs".to_string(),
                message: format!(
                    "sync interval {} is too short (minimum {} seconds)",
                    self.interval_secs, MIN_SYNC_INTERVAL
                ),
            });
        } else if self.interval_secs > MAX_SYNC_INTERVAL {
            errors.push(ValidationError {
                field: "schedule.interval_secs".to_string(),
                message: format!(
                    "sync interval {} is too long (maximum {} seconds / 1 day)",
                    self.interval_secs, MAX_SYNC_INTERVAL
                ),
            });
        }

        if self.flex_secs > self.interval_secs {
            errors.push(ValidationError {
                field: "schedule.flex_secs".to_string(),
                message: format!(
                    "flex {} cannot exceed the interval {}",
                    self.flex_secs, self.interval_secs
                ),
            });
        }

        if self.require_network && !self.probe_address.contains(':') {
            errors.push(ValidationError {
                field: "schedule.probe_address".to_string(),
                message: format!(
                    "invalid probe address '{}': expected format 'host:port'",
                    self.probe_address
                ),
            });
        }

        if self.settings_poll_secs == 0 || self.settings_poll_secs > MAX_SETTINGS_POLL {
            errors.push(ValidationError {
                field: "schedule.settings_poll_secs".to_string(),
                message: format!(
                    "settings poll {} must be between 1 and {} seconds",
                    self.settings_poll_secs, MAX_SETTINGS_POLL
                ),
            });
        }

        errors
    }

    /// How often the running service re-reads the settings file.
    pub fn settings_poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings_poll_secs)
    }

    /// The schedule handed to the scheduler.
    pub fn to_schedule(&self) -> RecurringSchedule {
        RecurringSchedule::new(Duration::from_secs(self.interval_secs))
            .with_flex(Duration::from_secs(self.flex_secs))
            .require_network(self.require_network)
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum concurrent network requests.
    pub network_concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            network_concurrency: DEFAULT_NETWORK_CONCURRENCY,
        }
    }
}

impl WorkerConfig {
    /// Validate worker configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        if (1..=MAX_NETWORK_CONCURRENCY).contains(&self.network_concurrency) {
            Vec::new()
        } else {
            vec![ValidationError {
                field: "workers.network_concurrency".to_string(),
                message: format!(
                    "network concurrency {} is out of range (1-{})",
                    self.network_concurrency, MAX_NETWORK_CONCURRENCY
                ),
            }]
        }
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Show desktop notifications (requires the `notifications` feature).
    /// Notices are always logged.
    pub desktop: bool,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `schedule.interval_secs`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weathernews")
        .join("service.toml")
}
