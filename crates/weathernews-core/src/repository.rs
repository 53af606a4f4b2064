//! The forecast repository: reads from the cache, writes from the network.
//!
//! # Lifecycle
//!
//! A repository starts `Uninitialized`. The first read moves it to
//! `Bootstrapping`: the recurring sync is registered and a storage task
//! checks whether the cache already covers [`NUM_DAYS`] days from today. If
//! it does not, an immediate sync is requested. Once the check has run the
//! repository is `Active` for the rest of its life. Bootstrap happens at
//! most once per repository, even if the first fetch fails; the recurring
//! schedule and location changes are the retry path.
//!
//! # Publications
//!
//! [`start`](ForecastRepository::start) spawns a listener on the fetcher's
//! publications. Each one is applied as a single serialized unit:
//!
//! 1. replace the whole cache with the published forecasts
//! 2. read back today's forecast
//! 3. notify the user if enabled and a day has passed since the last notice
//! 4. bump the store generation so live queries re-run
//!
//! Empty publications are rejected without touching the store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use time::{Date, OffsetDateTime};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weathernews_types::{ForecastRecord, ForecastSummary, NUM_DAYS};

use crate::error::{Error, Result};
use crate::executor::StorageContext;
use crate::fetcher::{Publication, RemoteFetcher};
use crate::gate::{SinceLastNotification, should_notify};
use crate::live::LiveQuery;
use crate::traits::{Clock, NotificationPresenter, SettingsStore};

/// Capacity of the sync report channel.
const REPORT_BUFFER: usize = 16;

/// Bootstrap state of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapPhase {
    /// No read has happened yet.
    Uninitialized,
    /// The recurring sync is registered and the freshness check is running.
    Bootstrapping,
    /// Bootstrap finished. Terminal.
    Active,
}

/// Result of the bootstrap freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum BootstrapOutcome {
    /// The cache already covered enough days.
    CacheFresh {
        /// Days stored from today onward.
        days: u64,
    },
    /// The cache was short and an immediate sync was requested.
    FetchRequested {
        /// Days stored from today onward.
        days: u64,
    },
    /// The store could not be queried; no sync was requested.
    CheckFailed,
}

/// What happened when a publication was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Version of the applied publication.
    pub version: u64,
    /// Rows written.
    pub stored: usize,
    /// Store generation after the replace.
    pub generation: u64,
    /// Whether the user was notified.
    pub notified: bool,
    /// Whether today's forecast was missing after the replace.
    pub readback_miss: bool,
}

/// Counters describing repository activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Bootstrap freshness checks run (at most one).
    pub bootstrap_checks: u64,
    /// Publications written to the store.
    pub publications_applied: u64,
    /// Publications rejected (empty, or the store failed).
    pub publications_rejected: u64,
    /// Notifications handed to the presenter.
    pub notifications_sent: u64,
    /// Replaces after which today's forecast was missing.
    pub readback_misses: u64,
}

#[derive(Debug, Default)]
struct Counters {
    bootstrap_checks: AtomicU64,
    publications_applied: AtomicU64,
    publications_rejected: AtomicU64,
    notifications_sent: AtomicU64,
    readback_misses: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SyncStats {
        SyncStats {
            bootstrap_checks: self.bootstrap_checks.load(Ordering::Relaxed),
            publications_applied: self.publications_applied.load(Ordering::Relaxed),
            publications_rejected: self.publications_rejected.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            readback_misses: self.readback_misses.load(Ordering::Relaxed),
        }
    }
}

/// Single source of forecast data for consumers.
pub struct ForecastRepository {
    fetcher: RemoteFetcher,
    storage: StorageContext,
    settings: Arc<dyn SettingsStore>,
    presenter: Arc<dyn NotificationPresenter>,
    clock: Arc<dyn Clock>,
    phase: Arc<Mutex<BootstrapPhase>>,
    bootstrap: Arc<watch::Sender<Option<BootstrapOutcome>>>,
    generation: watch::Sender<u64>,
    reports: broadcast::Sender<SyncReport>,
    apply_lock: tokio::sync::Mutex<()>,
    counters: Arc<Counters>,
    started: AtomicBool,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ForecastRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastRepository")
            .field("phase", &self.phase())
            .field("generation", &self.generation())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ForecastRepository {
    /// Create a repository. Nothing runs until the first read or
    /// [`start`](Self::start).
    pub fn new(
        fetcher: RemoteFetcher,
        storage: StorageContext,
        settings: Arc<dyn SettingsStore>,
        presenter: Arc<dyn NotificationPresenter>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let (bootstrap, _) = watch::channel(None);
        let (generation, _) = watch::channel(0);
        let (reports, _) = broadcast::channel(REPORT_BUFFER);

        Arc::new(Self {
            fetcher,
            storage,
            settings,
            presenter,
            clock,
            phase: Arc::new(Mutex::new(BootstrapPhase::Uninitialized)),
            bootstrap: Arc::new(bootstrap),
            generation,
            reports,
            apply_lock: tokio::sync::Mutex::new(()),
            counters: Arc::new(Counters::default()),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start applying the fetcher's publications.
    ///
    /// Returns `false` if the listener was already started.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let this = Arc::clone(self);
        let mut subscription = self.fetcher.current_forecasts();
        tokio::spawn(async move {
            info!("Forecast repository listening for publications");
            loop {
                tokio::select! {
                    _ = this.shutdown.cancelled() => break,
                    next = subscription.next() => match next {
                        Some(publication) => {
                            if let Err(e) = this.apply_publication(publication).await {
                                warn!("Failed to apply forecast publication: {}", e);
                            }
                        }
                        None => break,
                    },
                }
            }
            info!("Forecast repository stopped");
        });

        true
    }

    /// Stop the publication listener and the recurring sync.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.fetcher.cancel_recurring();
    }

    /// Live view of the forecast for `date`.
    ///
    /// # Panics
    ///
    /// The first read spawns the bootstrap tasks, so it must be called from
    /// within a Tokio runtime.
    pub fn get_forecast_by_date(&self, date: Date) -> LiveQuery<Option<ForecastRecord>> {
        self.ensure_bootstrapped();
        LiveQuery::new(self.storage.clone(), self.generation.subscribe(), move |store| {
            store.get_by_date(date)
        })
    }

    /// Live view of every forecast from today onward, soonest first.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime, like
    /// [`get_forecast_by_date`](Self::get_forecast_by_date).
    pub fn get_current_forecasts(&self) -> LiveQuery<Vec<ForecastSummary>> {
        self.ensure_bootstrapped();
        let today = self.clock.today();
        LiveQuery::new(self.storage.clone(), self.generation.subscribe(), move |store| {
            store.get_from(today)
        })
    }

    /// React to a change of the configured location: fetch immediately.
    pub fn location_changed(&self) {
        info!("Location changed to {}", self.settings.location());
        self.fetcher.trigger_immediate();
    }

    /// Apply one publication to the store.
    ///
    /// Publications are applied one at a time, in arrival order.
    pub async fn apply_publication(&self, publication: Publication) -> Result<SyncReport> {
        if publication.forecasts.is_empty() {
            Counters::bump(&self.counters.publications_rejected);
            warn!(
                "Rejected empty forecast publication (version {})",
                publication.version
            );
            return Err(Error::EmptyResult);
        }

        let _serial = self.apply_lock.lock().await;

        let today = self.clock.today();
        let forecasts = Arc::clone(&publication.forecasts);
        let written = self
            .storage
            .run(move |store| {
                let stored = store.replace_all(&forecasts)?;
                let today = store.get_by_date(today)?;
                Ok((stored, today))
            })
            .await;

        let (stored, todays) = match written {
            Ok(written) => written,
            Err(e) => {
                Counters::bump(&self.counters.publications_rejected);
                error!("Failed to replace forecast cache: {}", e);
                return Err(e);
            }
        };

        Counters::bump(&self.counters.publications_applied);
        self.generation.send_modify(|g| *g += 1);
        let generation = *self.generation.borrow();

        let (notified, readback_miss) = match todays {
            Some(record) => (self.notify_if_due(record).await, false),
            None => {
                Counters::bump(&self.counters.readback_misses);
                warn!(
                    "No forecast for {} after replacing cache; skipping notification",
                    today
                );
                (false, true)
            }
        };

        let report = SyncReport {
            version: publication.version,
            stored,
            generation,
            notified,
            readback_miss,
        };
        debug!("Applied publication: {:?}", report);
        let _ = self.reports.send(report.clone());

        Ok(report)
    }

    /// Wait for the bootstrap check and return its outcome.
    ///
    /// Waits indefinitely if no read has triggered bootstrap yet.
    pub async fn bootstrap_finished(&self) -> Option<BootstrapOutcome> {
        let mut rx = self.bootstrap.subscribe();
        let outcome = rx.wait_for(Option::is_some).await.ok()?;
        *outcome
    }

    /// Current bootstrap phase.
    pub fn phase(&self) -> BootstrapPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current store generation.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receive a report for every applied publication.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<SyncReport> {
        self.reports.subscribe()
    }

    /// Activity counters.
    pub fn stats(&self) -> SyncStats {
        self.counters.snapshot()
    }

    /// The fetcher feeding this repository.
    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.fetcher
    }

    fn ensure_bootstrapped(&self) {
        {
            let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            if *phase != BootstrapPhase::Uninitialized {
                return;
            }
            *phase = BootstrapPhase::Bootstrapping;
        }

        info!("Bootstrapping forecast repository");
        self.fetcher.schedule_recurring();

        let storage = self.storage.clone();
        let fetcher = self.fetcher.clone();
        let phase = Arc::clone(&self.phase);
        let bootstrap = Arc::clone(&self.bootstrap);
        let counters = Arc::clone(&self.counters);
        let today = self.clock.today();

        tokio::spawn(async move {
            let days = storage.run(move |store| Ok(store.count_from(today)?)).await;
            Counters::bump(&counters.bootstrap_checks);

            let outcome = match days {
                Ok(days) if days < u64::from(NUM_DAYS) => {
                    info!(
                        "Cache holds {} of {} days from {}; syncing now",
                        days, NUM_DAYS, today
                    );
                    fetcher.trigger_immediate();
                    BootstrapOutcome::FetchRequested { days }
                }
                Ok(days) => {
                    debug!("Cache holds {} days from {}; no sync needed", days, today);
                    BootstrapOutcome::CacheFresh { days }
                }
                Err(e) => {
                    warn!("Bootstrap freshness check failed: {}", e);
                    BootstrapOutcome::CheckFailed
                }
            };

            *phase.lock().unwrap_or_else(PoisonError::into_inner) = BootstrapPhase::Active;
            bootstrap.send_replace(Some(outcome));
        });
    }

    /// Gate, present and record a notification on the blocking pool.
    ///
    /// Presenters may talk to a desktop bus and settings stores may write
    /// files, so none of it runs on a runtime worker.
    async fn notify_if_due(&self, record: ForecastRecord) -> bool {
        let settings = Arc::clone(&self.settings);
        let presenter = Arc::clone(&self.presenter);
        let counters = Arc::clone(&self.counters);
        let now = self.clock.now();

        let task = tokio::task::spawn_blocking(move || {
            notify_blocking(
                settings.as_ref(),
                presenter.as_ref(),
                &counters,
                &record,
                now,
            )
        });
        match task.await {
            Ok(notified) => notified,
            Err(e) => {
                warn!("Notification task failed: {}", e);
                false
            }
        }
    }
}

fn notify_blocking(
    settings: &dyn SettingsStore,
    presenter: &dyn NotificationPresenter,
    counters: &Counters,
    record: &ForecastRecord,
    now: OffsetDateTime,
) -> bool {
    let since_last = SinceLastNotification::between(settings.last_notification_at(), now);
    if !should_notify(settings.notifications_enabled(), since_last) {
        debug!("Notification suppressed ({:?})", since_last);
        return false;
    }

    if let Err(e) = presenter.present(&record.notice()) {
        warn!("Failed to present forecast notification: {}", e);
        return false;
    }
    Counters::bump(&counters.notifications_sent);

    if let Err(e) = settings.save_last_notification_time(now) {
        warn!("Failed to save notification time: {}", e);
    }
    true
}
