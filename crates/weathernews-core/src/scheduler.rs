//! Recurring job scheduling on the tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::traits::{ConnectivityCheck, Job, SyncScheduler};

/// How often a recurring job runs.
///
/// Each run is due somewhere in `[interval, interval + flex]` after the
/// previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurringSchedule {
    /// Base period between runs.
    pub interval: Duration,
    /// Extra random delay allowed on top of `interval`.
    pub flex: Duration,
    /// Skip a run when no network is available.
    pub require_network: bool,
}

impl RecurringSchedule {
    /// Schedule with the given interval, a flex of a third of it, and
    /// network required.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            flex: interval / 3,
            require_network: true,
        }
    }

    /// Override the flex window.
    #[must_use]
    pub fn with_flex(mut self, flex: Duration) -> Self {
        self.flex = flex;
        self
    }

    /// Set whether runs require a network connection.
    #[must_use]
    pub fn require_network(mut self, required: bool) -> Self {
        self.require_network = required;
        self
    }

    /// Delay before the next run.
    pub fn next_delay(&self) -> Duration {
        let flex_ms = self.flex.as_millis() as u64;
        let jitter = if flex_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=flex_ms)
        };
        self.interval + Duration::from_millis(jitter)
    }
}

/// [`SyncScheduler`] that runs jobs as tokio tasks.
///
/// Each registered tag owns one task and one cancellation token. Registering
/// the same tag again cancels the old task before starting the new one, so a
/// tag never has two live schedules.
///
/// Registration and one-off runs spawn onto the current Tokio runtime and
/// panic when called outside one.
pub struct TokioScheduler {
    tasks: Mutex<HashMap<String, CancellationToken>>,
    connectivity: Arc<dyn ConnectivityCheck>,
}

impl TokioScheduler {
    /// Create a scheduler that consults `connectivity` before network-bound runs.
    pub fn new(connectivity: Arc<dyn ConnectivityCheck>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            connectivity,
        }
    }

    /// Tags with a live schedule.
    pub fn registered_tags(&self) -> Vec<String> {
        let mut tags: Vec<_> = self.tasks().keys().cloned().collect();
        tags.sort();
        tags
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncScheduler for TokioScheduler {
    fn register_recurring(&self, tag: &str, schedule: RecurringSchedule, job: Job) -> bool {
        let token = CancellationToken::new();
        let replaced = match self.tasks().insert(tag.to_string(), token.clone()) {
            Some(previous) => {
                previous.cancel();
                true
            }
            None => false,
        };

        info!(
            "Scheduled '{}' every {:?} (flex {:?}, network required: {})",
            tag, schedule.interval, schedule.flex, schedule.require_network
        );

        let connectivity = Arc::clone(&self.connectivity);
        let tag = tag.to_string();
        tokio::spawn(async move {
            loop {
                let delay = schedule.next_delay();
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Schedule '{}' cancelled", tag);
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }

                if schedule.require_network && !connectivity.is_connected().await {
                    debug!("Skipping '{}': no network", tag);
                    continue;
                }

                debug!("Running scheduled job '{}'", tag);
                job();
            }
        });

        replaced
    }

    fn run_once(&self, job: Job) {
        tokio::spawn(async move { job() });
    }

    fn cancel(&self, tag: &str) -> bool {
        match self.tasks().remove(tag) {
            Some(token) => {
                token.cancel();
                info!("Cancelled schedule '{}'", tag);
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for token in self.tasks().values() {
            token.cancel();
        }
    }
}

/// Connectivity check that always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityCheck for AlwaysOnline {
    async fn is_connected(&self) -> bool {
        true
    }
}

/// Connectivity check that opens a TCP connection to a known host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `address` (`host:port`), giving up after `timeout`.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityCheck for TcpProbe {
    async fn is_connected(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await,
            Ok(Ok(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct Switch(AtomicBool);

    #[async_trait]
    impl ConnectivityCheck for Switch {
        async fn is_connected(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn counting_job() -> (Job, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let job: Job = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (job, count)
    }

    fn hourly() -> RecurringSchedule {
        RecurringSchedule::new(Duration::from_secs(3600)).with_flex(Duration::ZERO)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(by: Duration) {
        // Spawned loops must have armed their timers before time moves.
        settle().await;
        tokio::time::advance(by).await;
        settle().await;
    }

    #[test]
    fn test_schedule_defaults() {
        let schedule = RecurringSchedule::new(Duration::from_secs(3 * 3600));
        assert_eq!(schedule.flex, Duration::from_secs(3600));
        assert!(schedule.require_network);
    }

    #[test]
    fn test_next_delay_within_window() {
        let schedule = RecurringSchedule::new(Duration::from_secs(90));
        for _ in 0..100 {
            let delay = schedule.next_delay();
            assert!(delay >= Duration::from_secs(90));
            assert!(delay <= Duration::from_secs(120));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_job_runs_each_interval() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        let (job, count) = counting_job();

        assert!(!scheduler.register_recurring("sync", hourly(), job));
        advance(Duration::from_secs(30 * 60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        advance(Duration::from_secs(31 * 60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        advance(Duration::from_secs(3601)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregistration_supersedes_previous_task() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        let (first, first_count) = counting_job();
        let (second, second_count) = counting_job();

        scheduler.register_recurring("sync", hourly(), first);
        assert!(scheduler.register_recurring("sync", hourly(), second));
        assert_eq!(scheduler.registered_tags(), vec!["sync".to_string()]);

        advance(Duration::from_secs(3601)).await;
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_runs_are_skipped() {
        let online = Arc::new(Switch(AtomicBool::new(false)));
        let scheduler = TokioScheduler::new(online.clone());
        let (job, count) = counting_job();

        scheduler.register_recurring("sync", hourly(), job);
        advance(Duration::from_secs(3601)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        online.0.store(true, Ordering::SeqCst);
        advance(Duration::from_secs(3601)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_not_required_ignores_connectivity() {
        let scheduler = TokioScheduler::new(Arc::new(Switch(AtomicBool::new(false))));
        let (job, count) = counting_job();

        scheduler.register_recurring("sync", hourly().require_network(false), job);
        advance(Duration::from_secs(3601)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_runs() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        let (job, count) = counting_job();

        scheduler.register_recurring("sync", hourly(), job);
        assert!(scheduler.cancel("sync"));
        assert!(!scheduler.cancel("sync"));

        advance(Duration::from_secs(7200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(scheduler.registered_tags().is_empty());
    }

    #[tokio::test]
    async fn test_run_once() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        let (job, count) = counting_job();

        scheduler.run_once(job);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tcp_probe_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let probe = TcpProbe::new(address, Duration::from_millis(500));
        assert!(!probe.is_connected().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let probe = TcpProbe::new(address, Duration::from_secs(1));
        assert!(probe.is_connected().await);
    }
}
