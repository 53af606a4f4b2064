//! User settings persisted as TOML.
//!
//! The pipeline reads these through [`SettingsStore`]. The CLI edits them
//! through [`FileSettings`] directly. Several processes may hold the same
//! file open: every change re-reads the file first and only touches its own
//! field, and the service calls [`FileSettings::reload`] to pick up edits.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use weathernews_core::{Error as CoreError, SettingsStore};
use weathernews_types::Location;

/// Location used until the user picks one.
pub const DEFAULT_LOCATION: &str = "London,GB";

/// Settings errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<SettingsError> for CoreError {
    fn from(err: SettingsError) -> Self {
        CoreError::Settings(err.to_string())
    }
}

/// User preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Whether forecast notifications are shown.
    pub notifications_enabled: bool,
    /// When the last notification was shown.
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_notification: Option<OffsetDateTime>,
    /// Location forecasts are kept for.
    pub location: Location,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            last_notification: None,
            location: Location::place(DEFAULT_LOCATION),
        }
    }
}

/// Settings backed by a TOML file.
///
/// Reads are served from memory. Every change re-reads the file, applies one
/// field and writes the result back.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    current: RwLock<UserSettings>,
}

impl FileSettings {
    /// Load settings from `path`, using defaults if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let current = match read_file(&path)? {
            Some(settings) => settings,
            None => {
                debug!("No settings at {}, using defaults", path.display());
                UserSettings::default()
            }
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// Load settings from [`default_settings_path`].
    pub fn load_default() -> Result<Self, SettingsError> {
        Self::load(default_settings_path())
    }

    /// Settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current settings.
    pub fn snapshot(&self) -> UserSettings {
        self.read().clone()
    }

    /// Re-read the file, replacing the in-memory copy.
    ///
    /// A missing file leaves the current settings untouched.
    pub fn reload(&self) -> Result<UserSettings, SettingsError> {
        let mut current = self.write();
        if let Some(settings) = read_file(&self.path)? {
            *current = settings;
        }
        Ok(current.clone())
    }

    /// Write the current settings to disk.
    pub fn save(&self) -> Result<(), SettingsError> {
        let settings = self.snapshot();
        self.write_file(&settings)
    }

    /// Change the location and save.
    pub fn set_location(&self, location: Location) -> Result<(), SettingsError> {
        self.update(|s| s.location = location)
    }

    /// Turn notifications on or off and save.
    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.update(|s| s.notifications_enabled = enabled)
    }

    fn update(&self, change: impl FnOnce(&mut UserSettings)) -> Result<(), SettingsError> {
        let mut settings = self.write();
        if let Some(on_disk) = read_file(&self.path)? {
            *settings = on_disk;
        }
        change(&mut settings);
        self.write_file(&settings)
    }

    fn write_file(&self, settings: &UserSettings) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(settings)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // Readers never see a half-written file.
        let staging = self.path.with_extension("toml.tmp");
        std::fs::write(&staging, content).map_err(|e| SettingsError::Write {
            path: staging.clone(),
            source: e,
        })?;
        std::fs::rename(&staging, &self.path).map_err(|e| SettingsError::Write {
            path: self.path.clone(),
            source: e,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for FileSettings {
    fn notifications_enabled(&self) -> bool {
        self.read().notifications_enabled
    }

    fn last_notification_at(&self) -> Option<OffsetDateTime> {
        self.read().last_notification
    }

    fn save_last_notification_time(&self, at: OffsetDateTime) -> weathernews_core::Result<()> {
        self.update(|s| s.last_notification = Some(at))?;
        Ok(())
    }

    fn location(&self) -> Location {
        self.read().location.clone()
    }
}

fn read_file(path: &Path) -> Result<Option<UserSettings>, SettingsError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Default settings file path.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weathernews")
        .join("settings.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use weathernews_types::Coordinates;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = FileSettings::load(dir.path().join("settings.toml")).unwrap();

        assert!(settings.notifications_enabled());
        assert!(settings.last_notification_at().is_none());
        assert_eq!(settings.location(), Location::place(DEFAULT_LOCATION));
        assert!(!settings.path().exists());
    }

    #[test]
    fn test_changes_are_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let settings = FileSettings::load(&path).unwrap();
        settings.set_location(Location::place("Dhaka,BD")).unwrap();
        settings.set_notifications_enabled(false).unwrap();
        settings
            .save_last_notification_time(datetime!(2024-05-01 08:00 UTC))
            .unwrap();

        let reloaded = FileSettings::load(&path).unwrap();
        assert_eq!(reloaded.location(), Location::place("Dhaka,BD"));
        assert!(!reloaded.notifications_enabled());
        assert_eq!(
            reloaded.last_notification_at(),
            Some(datetime!(2024-05-01 08:00 UTC))
        );
    }

    #[test]
    fn test_coordinates_location_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let location = Location::Coordinates(Coordinates::new(23.81, 90.41).unwrap());

        FileSettings::load(&path)
            .unwrap()
            .set_location(location.clone())
            .unwrap();

        assert_eq!(FileSettings::load(&path).unwrap().location(), location);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "notifications_enabled = false\n").unwrap();

        let settings = FileSettings::load(&path).unwrap();
        assert!(!settings.notifications_enabled());
        assert_eq!(settings.location(), Location::place(DEFAULT_LOCATION));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "notifications_enabled = \"maybe\"").unwrap();

        assert!(matches!(
            FileSettings::load(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_write_failure_maps_to_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("settings.toml");

        let settings = FileSettings {
            path,
            current: RwLock::new(UserSettings::default()),
        };
        let err = settings
            .save_last_notification_time(datetime!(2024-05-01 08:00 UTC))
            .unwrap_err();
        assert!(matches!(err, CoreError::Settings(_)));
    }

    #[test]
    fn test_change_keeps_edits_from_another_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let daemon = FileSettings::load(&path).unwrap();
        let cli = FileSettings::load(&path).unwrap();

        cli.set_location(Location::place("Oslo,NO")).unwrap();
        daemon
            .save_last_notification_time(datetime!(2024-05-01 08:00 UTC))
            .unwrap();

        let on_disk = FileSettings::load(&path).unwrap();
        assert_eq!(on_disk.location(), Location::place("Oslo,NO"));
        assert_eq!(
            on_disk.last_notification_at(),
            Some(datetime!(2024-05-01 08:00 UTC))
        );
        assert_eq!(daemon.location(), Location::place("Oslo,NO"));
    }

    #[test]
    fn test_reload_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let daemon = FileSettings::load(&path).unwrap();
        assert_eq!(daemon.reload().unwrap(), UserSettings::default());

        FileSettings::load(&path)
            .unwrap()
            .set_notifications_enabled(false)
            .unwrap();
        assert!(daemon.notifications_enabled());

        let reloaded = daemon.reload().unwrap();
        assert!(!reloaded.notifications_enabled);
        assert!(!daemon.notifications_enabled());
    }

    #[test]
    fn test_reload_keeps_cache_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let settings = FileSettings::load(&path).unwrap();
        settings.set_location(Location::place("Dhaka,BD")).unwrap();
        std::fs::write(&path, "location = 42").unwrap();

        assert!(matches!(
            settings.reload(),
            Err(SettingsError::Parse { .. })
        ));
        assert_eq!(settings.location(), Location::place("Dhaka,BD"));
    }
}
