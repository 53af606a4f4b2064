//! Forecast sync pipeline.
//!
//! This crate keeps a local forecast cache in step with a remote provider:
//!
//! - [`RemoteFetcher`] downloads forecasts on a bounded network context and
//!   publishes each non-empty result to subscribers
//! - [`ForecastRepository`] serves live reads from the cache, bootstraps the
//!   recurring sync on first use, and applies publications as atomic cache
//!   replaces followed by a throttled notification
//! - [`gate`] decides whether a refresh may notify the user
//! - [`TokioScheduler`] runs the recurring sync with jitter and a
//!   connectivity check
//! - [`OpenWeatherClient`] is the production [`ForecastSource`]
//!
//! Every outside dependency sits behind a trait in [`traits`]; [`mock`]
//! provides test doubles for all of them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use weathernews_core::mock::{MemorySettings, RecordingPresenter};
//! use weathernews_core::provider::{OpenWeatherClient, ProviderConfig};
//! use weathernews_core::{
//!     AlwaysOnline, ForecastRepository, NetworkContext, RemoteFetcher, StorageContext,
//!     SystemClock, TokioScheduler, default_schedule,
//! };
//! use weathernews_store::Store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Arc::new(MemorySettings::new());
//! let clock = Arc::new(SystemClock);
//! let fetcher = RemoteFetcher::new(
//!     Arc::new(OpenWeatherClient::new(ProviderConfig::new("api-key"))?),
//!     settings.clone(),
//!     Arc::new(TokioScheduler::new(Arc::new(AlwaysOnline))),
//!     clock.clone(),
//!     NetworkContext::default(),
//!     default_schedule(),
//! );
//! let repository = ForecastRepository::new(
//!     fetcher,
//!     StorageContext::new(Store::open_default()?),
//!     settings,
//!     Arc::new(RecordingPresenter::new()),
//!     clock,
//! );
//! repository.start();
//!
//! let forecasts = repository.get_current_forecasts();
//! for summary in forecasts.current().await? {
//!     println!("{summary}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod fetcher;
pub mod gate;
pub mod live;
pub mod mock;
pub mod provider;
pub mod repository;
pub mod scheduler;
pub mod traits;

pub use error::{Error, Result};
pub use executor::{DEFAULT_NETWORK_CONCURRENCY, NetworkContext, StorageContext};
pub use fetcher::{
    ForecastSubscription, Publication, RemoteFetcher, SYNC_FLEX, SYNC_INTERVAL, SYNC_TAG,
    default_schedule,
};
pub use gate::{ONE_DAY, SinceLastNotification, should_notify};
pub use live::LiveQuery;
pub use mock::{FixedClock, MemorySettings, MockScheduler, MockSource, RecordingPresenter};
pub use provider::{OpenWeatherClient, ProviderConfig, decode_daily_forecast};
pub use repository::{BootstrapOutcome, BootstrapPhase, ForecastRepository, SyncReport, SyncStats};
pub use scheduler::{AlwaysOnline, RecurringSchedule, TcpProbe, TokioScheduler};
pub use traits::{
    Clock, ConnectivityCheck, ForecastSource, Job, NotificationPresenter, SettingsStore,
    SyncScheduler, SystemClock,
};

// Re-export the crates callers need to name our types.
pub use weathernews_store;
pub use weathernews_types;
