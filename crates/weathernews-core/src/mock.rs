//! Mock collaborators for testing.
//!
//! These implement the traits in [`crate::traits`] without touching the
//! network, the filesystem or the system clock, so the whole pipeline can be
//! driven deterministically from tests.
//!
//! # Features
//!
//! - **Failure injection**: sources and presenters can be told to fail
//! - **Call recording**: every request, notice and registration is kept
//! - **Controllable time**: [`FixedClock`] only moves when told to

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::{Date, OffsetDateTime};

use weathernews_types::{ForecastNotice, ForecastRecord, Location, dates};

use crate::error::{Error, Result};
use crate::scheduler::RecurringSchedule;
use crate::traits::{Clock, ForecastSource, Job, NotificationPresenter, SettingsStore, SyncScheduler};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `days` consecutive forecasts starting at `start`, with distinct
/// temperatures so records can be told apart.
pub fn sample_forecasts(start: Date, days: u32) -> Vec<ForecastRecord> {
    (0..days)
        .filter_map(|i| {
            let date = dates::add_days(start, i64::from(i)).ok()?;
            let max = 14.0 + f64::from(i % 7);
            Some(
                ForecastRecord::new(date, 800 + (i % 4) as i32, max - 7.0, max)
                    .with_conditions(60.0, 1012.0, 3.0, 180.0),
            )
        })
        .collect()
}

/// A forecast source that returns canned data.
///
/// # Example
///
/// ```
/// use weathernews_core::mock::{MockSource, sample_forecasts};
/// use weathernews_core::ForecastSource;
/// use weathernews_types::{Location, dates};
///
/// #[tokio::main]
/// async fn main() {
///     let today = dates::today_utc();
///     let source = MockSource::new();
///     source.set_forecasts(sample_forecasts(today, 14));
///
///     let forecasts = source
///         .fetch_forecasts(&Location::place("Oslo"), today)
///         .await
///         .unwrap();
///     assert_eq!(forecasts.len(), 14);
///     assert_eq!(source.call_count(), 1);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockSource {
    forecasts: Mutex<Vec<ForecastRecord>>,
    should_fail: AtomicBool,
    calls: AtomicU32,
    last_request: Mutex<Option<(Location, Date)>>,
}

impl MockSource {
    /// An empty source: fetches succeed with no forecasts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what subsequent fetches return.
    pub fn set_forecasts(&self, forecasts: Vec<ForecastRecord>) {
        *lock(&self.forecasts) = forecasts;
    }

    /// Make subsequent fetches fail with a provider error.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Number of fetches so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent fetch.
    pub fn last_request(&self) -> Option<(Location, Date)> {
        lock(&self.last_request).clone()
    }
}

#[async_trait]
impl ForecastSource for MockSource {
    async fn fetch_forecasts(&self, location: &Location, today: Date) -> Result<Vec<ForecastRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_request) = Some((location.clone(), today));

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(Error::provider(500, "mock failure"));
        }
        Ok(lock(&self.forecasts).clone())
    }
}

/// A presenter that records every notice.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    notices: Mutex<Vec<ForecastNotice>>,
    should_fail: AtomicBool,
}

impl RecordingPresenter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent presentations fail.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Notices presented so far.
    pub fn notices(&self) -> Vec<ForecastNotice> {
        lock(&self.notices).clone()
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn present(&self, notice: &ForecastNotice) -> Result<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(Error::Presenter("mock failure".into()));
        }
        lock(&self.notices).push(notice.clone());
        Ok(())
    }
}

/// In-memory settings. Notifications are enabled by default.
#[derive(Debug)]
pub struct MemorySettings {
    notifications_enabled: AtomicBool,
    last_notification: Mutex<Option<OffsetDateTime>>,
    location: Mutex<Location>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            notifications_enabled: AtomicBool::new(true),
            last_notification: Mutex::new(None),
            location: Mutex::new(Location::place("London,GB")),
        }
    }
}

impl MemorySettings {
    /// Defaults: notifications on, never notified, London.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn notifications on or off.
    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.notifications_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Pretend the last notification happened at `at`.
    pub fn set_last_notification(&self, at: Option<OffsetDateTime>) {
        *lock(&self.last_notification) = at;
    }

    /// Change the location.
    pub fn set_location(&self, location: Location) {
        *lock(&self.location) = location;
    }
}

impl SettingsStore for MemorySettings {
    fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::SeqCst)
    }

    fn last_notification_at(&self) -> Option<OffsetDateTime> {
        *lock(&self.last_notification)
    }

    fn save_last_notification_time(&self, at: OffsetDateTime) -> Result<()> {
        *lock(&self.last_notification) = Some(at);
        Ok(())
    }

    fn location(&self) -> Location {
        lock(&self.location).clone()
    }
}

/// A scheduler that records registrations.
///
/// Recurring jobs never fire on their own; use [`fire`](Self::fire).
/// [`run_once`](SyncScheduler::run_once) runs the job immediately unless
/// [`hold_immediate`](Self::hold_immediate) was called.
#[derive(Default)]
pub struct MockScheduler {
    jobs: Mutex<HashMap<String, (RecurringSchedule, Job)>>,
    last_registration: Mutex<Option<(String, RecurringSchedule)>>,
    registrations: AtomicU32,
    immediate_runs: AtomicU32,
    hold_immediate: AtomicBool,
}

impl std::fmt::Debug for MockScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockScheduler")
            .field("registrations", &self.registrations())
            .field("immediate_runs", &self.immediate_runs())
            .finish_non_exhaustive()
    }
}

impl MockScheduler {
    /// Create a scheduler with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count immediate runs without executing them.
    pub fn hold_immediate(&self) {
        self.hold_immediate.store(true, Ordering::SeqCst);
    }

    /// Number of `register_recurring` calls.
    pub fn registrations(&self) -> u32 {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Number of `run_once` calls.
    pub fn immediate_runs(&self) -> u32 {
        self.immediate_runs.load(Ordering::SeqCst)
    }

    /// Tag and schedule of the most recent registration.
    pub fn last_registration(&self) -> Option<(String, RecurringSchedule)> {
        lock(&self.last_registration).clone()
    }

    /// Run the job registered under `tag`. Returns `false` if none is.
    pub fn fire(&self, tag: &str) -> bool {
        let job = lock(&self.jobs).get(tag).map(|(_, job)| job.clone());
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

impl SyncScheduler for MockScheduler {
    fn register_recurring(&self, tag: &str, schedule: RecurringSchedule, job: Job) -> bool {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_registration) = Some((tag.to_string(), schedule));
        lock(&self.jobs)
            .insert(tag.to_string(), (schedule, job))
            .is_some()
    }

    fn run_once(&self, job: Job) {
        self.immediate_runs.fetch_add(1, Ordering::SeqCst);
        if !self.hold_immediate.load(Ordering::SeqCst) {
            job();
        }
    }

    fn cancel(&self, tag: &str) -> bool {
        lock(&self.jobs).remove(tag).is_some()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    /// Start at `now`.
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        *lock(&self.now) = now;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: time::Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *lock(&self.now)
    }
}
