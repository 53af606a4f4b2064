//! Composition root: wires configuration, storage and the sync pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::{Date, OffsetDateTime};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use weathernews_core::{
    AlwaysOnline, BootstrapPhase, Clock, ConnectivityCheck, ForecastRepository, ForecastSource,
    NetworkContext, NotificationPresenter, OpenWeatherClient, RemoteFetcher, SettingsStore,
    StorageContext, SyncReport, SyncStats, SystemClock, TcpProbe, TokioScheduler,
};
use weathernews_store::Store;
use weathernews_types::{ForecastRecord, ForecastSummary, Location};

use crate::config::{Config, ConfigError};
use crate::notifier::presenter_for;
use crate::settings::{FileSettings, SettingsError, UserSettings};

/// Application errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Sync(#[from] weathernews_core::Error),
    #[error(transparent)]
    Store(#[from] weathernews_store::Error),
}

/// Snapshot of the service state, printed by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Configured location.
    pub location: Location,
    /// Whether notifications are on.
    pub notifications_enabled: bool,
    /// When the last notification was shown.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_notification: Option<OffsetDateTime>,
    /// Days cached from today onward.
    pub cached_days: u64,
    /// Rows in the cache, including past days.
    pub total_rows: u64,
    /// Repository bootstrap phase.
    pub phase: BootstrapPhase,
    /// Repository counters for this process.
    pub stats: SyncStats,
}

/// The assembled service.
pub struct App {
    config: Config,
    settings: Arc<FileSettings>,
    storage: StorageContext,
    repository: Arc<ForecastRepository>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("settings", &self.settings)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Build the service from configuration, talking to OpenWeatherMap.
    ///
    /// The API key is not checked here; commands that fetch call
    /// [`ApiConfig::require_api_key`](crate::config::ApiConfig::require_api_key).
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        config.validate()?;

        let settings = Arc::new(FileSettings::load(&config.storage.settings_path)?);
        let source = Arc::new(OpenWeatherClient::new(
            config.provider.to_provider_config(),
        )?);
        let presenter = presenter_for(&config.notifications);

        Self::assemble(config, settings, source, presenter, Arc::new(SystemClock))
    }

    /// Build the service with explicit collaborators.
    pub fn assemble(
        config: Config,
        settings: Arc<FileSettings>,
        source: Arc<dyn ForecastSource>,
        presenter: Arc<dyn NotificationPresenter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        info!("Opening forecast cache at {:?}", config.storage.path);
        let storage = StorageContext::new(Store::open(&config.storage.path)?);

        let connectivity: Arc<dyn ConnectivityCheck> = if config.schedule.require_network {
            Arc::new(TcpProbe::new(
                config.schedule.probe_address.clone(),
                Duration::from_secs(config.schedule.probe_timeout_secs),
            ))
        } else {
            Arc::new(AlwaysOnline)
        };
        let scheduler = Arc::new(TokioScheduler::new(connectivity));

        let fetcher = RemoteFetcher::new(
            source,
            settings.clone(),
            scheduler,
            clock.clone(),
            NetworkContext::new(config.workers.network_concurrency),
            config.schedule.to_schedule(),
        );
        let repository = ForecastRepository::new(
            fetcher,
            storage.clone(),
            settings.clone(),
            presenter,
            clock.clone(),
        );

        Ok(Self {
            config,
            settings,
            storage,
            repository,
            clock,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// User settings.
    pub fn settings(&self) -> &FileSettings {
        &self.settings
    }

    /// The forecast repository.
    pub fn repository(&self) -> &Arc<ForecastRepository> {
        &self.repository
    }

    /// Run the recurring sync until `shutdown` resolves.
    ///
    /// The settings file is re-read every `schedule.settings_poll_secs`; a
    /// new location triggers an immediate sync.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        let mut reports = self.repository.subscribe_reports();
        self.repository.start();

        // The first read bootstraps the recurring sync.
        let forecasts = self.repository.get_current_forecasts();
        if let Some(outcome) = self.repository.bootstrap_finished().await {
            info!("Bootstrap: {:?}", outcome);
        }
        match forecasts.current().await {
            Ok(cached) => info!(
                "Serving {} cached day(s) for {}",
                cached.len(),
                self.settings.location()
            ),
            Err(e) => warn!("Failed to read forecast cache: {}", e),
        }

        let period = self.config.schedule.settings_poll_interval();
        let mut settings_poll = tokio::time::interval_at(Instant::now() + period, period);
        settings_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut location = self.settings.location();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = settings_poll.tick() => {
                    if let Some(latest) = self.reload_settings().await
                        && latest.location != location
                    {
                        location = latest.location;
                        self.repository.location_changed();
                    }
                }
                report = reports.recv() => match report {
                    Ok(report) => info!(
                        "Stored {} forecast(s) (version {}, notified: {})",
                        report.stored, report.version, report.notified
                    ),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} sync report(s)", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("Shutting down");
        self.repository.shutdown();
        Ok(())
    }

    async fn reload_settings(&self) -> Option<UserSettings> {
        let settings = Arc::clone(&self.settings);
        match tokio::task::spawn_blocking(move || settings.reload()).await {
            Ok(Ok(latest)) => Some(latest),
            Ok(Err(e)) => {
                warn!("Failed to reload settings: {}", e);
                None
            }
            Err(e) => {
                warn!("Settings reload task failed: {}", e);
                None
            }
        }
    }

    /// Fetch once and apply the result to the cache.
    pub async fn sync_now(&self) -> Result<SyncReport, AppError> {
        let fetcher = self.repository.fetcher();
        fetcher
            .fetch()
            .await
            .map_err(weathernews_core::Error::from)??;

        let publication = fetcher
            .latest()
            .ok_or(weathernews_core::Error::EmptyResult)?;
        Ok(self.repository.apply_publication(publication).await?)
    }

    /// Cached forecasts from today onward.
    pub async fn cached_forecasts(&self) -> Result<Vec<ForecastSummary>, AppError> {
        let today = self.clock.today();
        Ok(self
            .storage
            .run(move |store| Ok(store.get_from(today)?))
            .await?)
    }

    /// Cached forecast for one day.
    pub async fn cached_forecast(&self, date: Date) -> Result<Option<ForecastRecord>, AppError> {
        Ok(self
            .storage
            .run(move |store| Ok(store.get_by_date(date)?))
            .await?)
    }

    /// Current status.
    pub async fn status(&self) -> Result<StatusReport, AppError> {
        let today = self.clock.today();
        let (cached_days, total_rows) = self
            .storage
            .run(move |store| Ok((store.count_from(today)?, store.count()?)))
            .await?;

        Ok(StatusReport {
            location: self.settings.location(),
            notifications_enabled: self.settings.notifications_enabled(),
            last_notification: self.settings.last_notification_at(),
            cached_days,
            total_rows,
            phase: self.repository.phase(),
            stats: self.repository.stats(),
        })
    }
}
