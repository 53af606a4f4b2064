//! Remote forecast fetching and publication.
//!
//! [`RemoteFetcher`] downloads forecasts on the network context and publishes
//! each non-empty result into a last-value cell. Subscribers always see the
//! most recent publication first, even if they subscribe after it was made.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use weathernews_types::ForecastRecord;

use crate::error::{Error, Result};
use crate::executor::NetworkContext;
use crate::scheduler::RecurringSchedule;
use crate::traits::{Clock, ForecastSource, Job, SettingsStore, SyncScheduler};

/// Scheduler tag of the recurring forecast sync.
pub const SYNC_TAG: &str = "weathernews-sync";

/// Period of the recurring forecast sync.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);

/// Allowed lateness of a recurring sync.
pub const SYNC_FLEX: Duration = Duration::from_secs(SYNC_INTERVAL.as_secs() / 3);

/// One published forecast list.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    /// Increases by one with every publication.
    pub version: u64,
    /// Forecasts in day order, starting today.
    pub forecasts: Arc<Vec<ForecastRecord>>,
}

/// Subscription to [`RemoteFetcher`] publications.
#[derive(Debug, Clone)]
pub struct ForecastSubscription {
    rx: watch::Receiver<Option<Publication>>,
}

impl ForecastSubscription {
    /// Wait for the next publication this subscription has not seen.
    ///
    /// Returns `None` once the fetcher is gone. Publications made while the
    /// subscriber was busy are collapsed into the latest one.
    pub async fn next(&mut self) -> Option<Publication> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(publication) = self.rx.borrow_and_update().clone() {
                return Some(publication);
            }
        }
    }

    /// The latest publication, seen or not.
    pub fn latest(&self) -> Option<Publication> {
        self.rx.borrow().clone()
    }
}

/// Downloads forecasts and publishes them.
#[derive(Clone)]
pub struct RemoteFetcher {
    inner: Arc<FetcherInner>,
}

struct FetcherInner {
    source: Arc<dyn ForecastSource>,
    settings: Arc<dyn SettingsStore>,
    scheduler: Arc<dyn SyncScheduler>,
    clock: Arc<dyn Clock>,
    network: NetworkContext,
    schedule: RecurringSchedule,
    published: watch::Sender<Option<Publication>>,
}

impl std::fmt::Debug for RemoteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFetcher")
            .field("schedule", &self.inner.schedule)
            .field("latest_version", &self.latest().map(|p| p.version))
            .finish_non_exhaustive()
    }
}

/// The recurring sync schedule: every [`SYNC_INTERVAL`], up to
/// [`SYNC_FLEX`] late, only with a network connection.
pub fn default_schedule() -> RecurringSchedule {
    RecurringSchedule::new(SYNC_INTERVAL)
        .with_flex(SYNC_FLEX)
        .require_network(true)
}

impl RemoteFetcher {
    /// Create a fetcher that registers `schedule` with `scheduler`.
    pub fn new(
        source: Arc<dyn ForecastSource>,
        settings: Arc<dyn SettingsStore>,
        scheduler: Arc<dyn SyncScheduler>,
        clock: Arc<dyn Clock>,
        network: NetworkContext,
        schedule: RecurringSchedule,
    ) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            inner: Arc::new(FetcherInner {
                source,
                settings,
                scheduler,
                clock,
                network,
                schedule,
                published,
            }),
        }
    }

    /// Download forecasts for the configured location and publish them.
    ///
    /// Runs on the network context. Fetch failures (transport, decode,
    /// provider error, empty result) are logged and publish nothing; the
    /// handle carries the outcome for callers that want it.
    pub fn fetch(&self) -> JoinHandle<Result<usize>> {
        let inner = Arc::clone(&self.inner);
        self.inner.network.spawn(async move { inner.fetch_and_publish().await })
    }

    /// Subscribe to publications. The current one, if any, is delivered first.
    pub fn current_forecasts(&self) -> ForecastSubscription {
        let mut rx = self.inner.published.subscribe();
        if rx.borrow().is_some() {
            rx.mark_changed();
        }
        ForecastSubscription { rx }
    }

    /// The most recent publication.
    pub fn latest(&self) -> Option<Publication> {
        self.inner.published.borrow().clone()
    }

    /// Register the recurring sync with the scheduler.
    ///
    /// Returns `true` if an earlier registration was replaced.
    pub fn schedule_recurring(&self) -> bool {
        let replaced = self.inner.scheduler.register_recurring(
            SYNC_TAG,
            self.inner.schedule,
            self.job(),
        );
        if replaced {
            debug!("Replaced existing '{}' schedule", SYNC_TAG);
        }
        replaced
    }

    /// Cancel the recurring sync.
    pub fn cancel_recurring(&self) -> bool {
        self.inner.scheduler.cancel(SYNC_TAG)
    }

    /// Ask the scheduler to fetch once, now.
    pub fn trigger_immediate(&self) {
        info!("Requesting immediate forecast sync");
        self.inner.scheduler.run_once(self.job());
    }

    /// The recurring schedule in use.
    pub fn schedule(&self) -> RecurringSchedule {
        self.inner.schedule
    }

    // Weak, so a scheduler holding the job does not keep the fetcher alive.
    fn job(&self) -> Job {
        let weak: Weak<FetcherInner> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                let _ = RemoteFetcher { inner }.fetch();
            }
        })
    }
}

impl FetcherInner {
    async fn fetch_and_publish(&self) -> Result<usize> {
        let location = self.settings.location();
        let today = self.clock.today();
        debug!("Fetching forecasts for {} starting {}", location, today);

        let result = self
            .source
            .fetch_forecasts(&location, today)
            .await
            .and_then(|forecasts| {
                if forecasts.is_empty() {
                    Err(Error::EmptyResult)
                } else {
                    Ok(forecasts)
                }
            });

        match result {
            Ok(forecasts) => {
                let count = forecasts.len();
                let forecasts = Arc::new(forecasts);
                let mut version = 0;
                self.published.send_modify(|slot| {
                    version = slot.as_ref().map_or(0, |p| p.version) + 1;
                    *slot = Some(Publication { version, forecasts });
                });
                info!("Published {} forecasts (version {})", count, version);
                Ok(count)
            }
            Err(e) => {
                warn!("Forecast fetch for {} failed: {}", location, e);
                Err(e)
            }
        }
    }
}
