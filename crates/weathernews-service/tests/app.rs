//! Service wiring tests with a canned forecast source.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use time::macros::{date, datetime};
use weathernews_core::mock::sample_forecasts;
use weathernews_core::{BootstrapPhase, Error, FixedClock, MockSource, RecordingPresenter};
use weathernews_service::{App, AppError, Config, FileSettings};
use weathernews_types::Location;

const TODAY: time::Date = date!(2024 - 05 - 01);

struct Harness {
    app: App,
    source: Arc<MockSource>,
    presenter: Arc<RecordingPresenter>,
    clock: Arc<FixedClock>,
    config: Config,
    _dir: TempDir,
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn harness_with(tweak: impl FnOnce(&mut Config)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.path = dir.path().join("forecasts.db");
    config.storage.settings_path = dir.path().join("settings.toml");
    config.schedule.require_network = false;
    tweak(&mut config);

    let settings = Arc::new(FileSettings::load(&config.storage.settings_path).unwrap());
    let source = Arc::new(MockSource::new());
    let presenter = Arc::new(RecordingPresenter::new());
    let clock = Arc::new(FixedClock::new(datetime!(2024-05-01 07:30 UTC)));

    let app = App::assemble(
        config.clone(),
        settings,
        source.clone(),
        presenter.clone(),
        clock.clone(),
    )
    .unwrap();

    Harness {
        app,
        source,
        presenter,
        clock,
        config,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_sync_now_fills_cache_and_notifies() {
    let h = harness();
    h.source.set_forecasts(sample_forecasts(TODAY, 14));

    let report = h.app.sync_now().await.unwrap();
    assert_eq!(report.stored, 14);
    assert!(report.notified);
    assert_eq!(h.presenter.notices().len(), 1);
    assert_eq!(h.presenter.notices()[0].date, TODAY);

    let cached = h.app.cached_forecasts().await.unwrap();
    assert_eq!(cached.len(), 14);
    assert_eq!(cached[0].date, TODAY);

    // The notification time is persisted to the settings file.
    let reloaded = FileSettings::load(&h.config.storage.settings_path).unwrap();
    assert_eq!(
        reloaded.snapshot().last_notification,
        Some(datetime!(2024-05-01 07:30 UTC))
    );
}

#[tokio::test]
async fn test_second_sync_same_day_does_not_notify() {
    let h = harness();
    h.source.set_forecasts(sample_forecasts(TODAY, 14));
    h.app.sync_now().await.unwrap();

    h.clock.advance(time::Duration::hours(6));
    let report = h.app.sync_now().await.unwrap();
    assert!(!report.notified);
    assert_eq!(h.presenter.notices().len(), 1);

    h.clock.advance(time::Duration::hours(18));
    h.source.set_forecasts(sample_forecasts(date!(2024 - 05 - 02), 14));
    let report = h.app.sync_now().await.unwrap();
    assert!(report.notified);
    assert_eq!(h.presenter.notices().len(), 2);
}

#[tokio::test]
async fn test_sync_now_empty_result_keeps_cache() {
    let h = harness();
    h.source.set_forecasts(sample_forecasts(TODAY, 14));
    h.app.sync_now().await.unwrap();

    h.source.set_forecasts(Vec::new());
    let err = h.app.sync_now().await.unwrap_err();
    assert!(matches!(err, AppError::Sync(Error::EmptyResult)));
    assert_eq!(h.app.cached_forecasts().await.unwrap().len(), 14);
}

#[tokio::test]
async fn test_sync_uses_configured_location() {
    let h = harness();
    h.app
        .settings()
        .set_location(Location::place("Dhaka,BD"))
        .unwrap();
    h.source.set_forecasts(sample_forecasts(TODAY, 14));
    h.app.sync_now().await.unwrap();

    let (location, today) = h.source.last_request().unwrap();
    assert_eq!(location, Location::place("Dhaka,BD"));
    assert_eq!(today, TODAY);
}

#[tokio::test]
async fn test_cached_forecast_by_date() {
    let h = harness();
    h.source.set_forecasts(sample_forecasts(TODAY, 14));
    h.app.sync_now().await.unwrap();

    let record = h.app.cached_forecast(date!(2024 - 05 - 03)).await.unwrap();
    assert_eq!(record.unwrap().date, date!(2024 - 05 - 03));
    assert!(
        h.app
            .cached_forecast(date!(2024 - 06 - 01))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_status_reports_cache_and_settings() {
    let h = harness();
    let status = h.app.status().await.unwrap();
    assert_eq!(status.cached_days, 0);
    assert_eq!(status.phase, BootstrapPhase::Uninitialized);
    assert!(status.notifications_enabled);

    h.source.set_forecasts(sample_forecasts(TODAY, 14));
    h.app.sync_now().await.unwrap();

    let status = h.app.status().await.unwrap();
    assert_eq!(status.cached_days, 14);
    assert_eq!(status.total_rows, 14);
    assert_eq!(status.stats.publications_applied, 1);
    assert!(status.last_notification.is_some());

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["phase"], "uninitialized");
    assert_eq!(json["location"]["kind"], "place");
}

#[tokio::test]
async fn test_run_bootstraps_empty_cache_until_shutdown() {
    let h = harness();
    h.source.set_forecasts(sample_forecasts(TODAY, 14));
    let app = Arc::new(h.app);
    let mut reports = app.repository().subscribe_reports();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

    let runner = {
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            app.run(async {
                let _ = stopped.await;
            })
            .await
        })
    };

    let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("timed out waiting for sync report")
        .unwrap();
    assert_eq!(report.stored, 14);
    assert_eq!(app.cached_forecasts().await.unwrap().len(), 14);

    assert_eq!(app.repository().phase(), BootstrapPhase::Active);
    assert_eq!(h.source.call_count(), 1);
    assert_eq!(h.presenter.notices().len(), 1);

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_run_syncs_when_location_is_edited_elsewhere() {
    let h = harness_with(|config| config.schedule.settings_poll_secs = 1);
    h.source.set_forecasts(sample_forecasts(TODAY, 14));
    let app = Arc::new(h.app);
    let mut reports = app.repository().subscribe_reports();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

    let runner = {
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            app.run(async {
                let _ = stopped.await;
            })
            .await
        })
    };

    let first = tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("timed out waiting for bootstrap sync")
        .unwrap();
    assert!(first.notified);

    // A second process, like `settings set-location`, edits the file.
    let cli = FileSettings::load(&h.config.storage.settings_path).unwrap();
    cli.set_location(Location::place("Oslo,NO")).unwrap();

    tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("timed out waiting for location sync")
        .unwrap();
    let (location, _) = h.source.last_request().unwrap();
    assert_eq!(location, Location::place("Oslo,NO"));
    assert_eq!(h.source.call_count(), 2);

    // The daemon's notification time and the new location both survive.
    let on_disk = FileSettings::load(&h.config.storage.settings_path)
        .unwrap()
        .snapshot();
    assert_eq!(on_disk.location, Location::place("Oslo,NO"));
    assert_eq!(
        on_disk.last_notification,
        Some(datetime!(2024-05-01 07:30 UTC))
    );

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
