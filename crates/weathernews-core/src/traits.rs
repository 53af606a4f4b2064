//! Collaborator traits for the sync pipeline.
//!
//! The pipeline never talks to the network, the user's preferences, the
//! platform scheduler or the notification system directly. Each of those is
//! reached through one of the traits below so the composition root can plug
//! in real implementations and tests can plug in the ones from
//! [`crate::mock`].

use std::sync::Arc;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};

use weathernews_types::{ForecastNotice, ForecastRecord, Location, dates};

use crate::error::Result;
use crate::scheduler::RecurringSchedule;

/// Remote source of daily forecasts.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Download and decode forecasts for `location`.
    ///
    /// Entry *i* of the result is the forecast for `today + i` days.
    async fn fetch_forecasts(&self, location: &Location, today: Date)
    -> Result<Vec<ForecastRecord>>;
}

/// Shows a forecast notification to the user.
pub trait NotificationPresenter: Send + Sync {
    /// Present `notice`. Failures are logged by the caller and not retried.
    fn present(&self, notice: &ForecastNotice) -> Result<()>;
}

/// User preferences consulted by the pipeline.
pub trait SettingsStore: Send + Sync {
    /// Whether the user wants forecast notifications.
    fn notifications_enabled(&self) -> bool;

    /// When the last notification was shown, if ever.
    fn last_notification_at(&self) -> Option<OffsetDateTime>;

    /// Record that a notification was shown at `at`.
    fn save_last_notification_time(&self, at: OffsetDateTime) -> Result<()>;

    /// The location forecasts are fetched for.
    fn location(&self) -> Location;
}

/// A unit of work handed to a [`SyncScheduler`].
pub type Job = Arc<dyn Fn() + Send + Sync>;

/// Runs jobs on a recurring cadence or once on demand.
pub trait SyncScheduler: Send + Sync {
    /// Register `job` to run on `schedule` under `tag`.
    ///
    /// Registering a tag that is already registered replaces the previous
    /// job; returns `true` when that happened.
    fn register_recurring(&self, tag: &str, schedule: RecurringSchedule, job: Job) -> bool;

    /// Run `job` once, as soon as possible.
    fn run_once(&self, job: Job);

    /// Cancel the job registered under `tag`. Returns `false` if none was.
    fn cancel(&self, tag: &str) -> bool;
}

/// Reports whether a network connection is available.
#[async_trait]
pub trait ConnectivityCheck: Send + Sync {
    /// Check connectivity now.
    async fn is_connected(&self) -> bool;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> OffsetDateTime;

    /// Today's UTC calendar day.
    fn today(&self) -> Date {
        dates::normalize(self.now())
    }
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
