//! Notification presenters.

use std::sync::Arc;

use tracing::info;

use weathernews_core::{NotificationPresenter, Result};
use weathernews_types::ForecastNotice;

use crate::config::NotificationConfig;

/// Title shown on every notification.
pub const APP_NAME: &str = "WeatherNews";

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl NotificationPresenter for LogPresenter {
    fn present(&self, notice: &ForecastNotice) -> Result<()> {
        info!(date = %notice.date, "{}", notice.text());
        Ok(())
    }
}

/// Shows notices as desktop notifications and logs them.
#[cfg(feature = "notifications")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopPresenter;

#[cfg(feature = "notifications")]
impl NotificationPresenter for DesktopPresenter {
    fn present(&self, notice: &ForecastNotice) -> Result<()> {
        use notify_rust::Notification;
        use tracing::debug;
        use weathernews_core::Error;

        LogPresenter.present(notice)?;

        let body = notice.text();
        Notification::new()
            .summary(APP_NAME)
            .body(&body)
            .appname(APP_NAME)
            .show()
            .map_err(|e| Error::Presenter(e.to_string()))?;
        debug!("Notification sent: {}", body);
        Ok(())
    }
}

/// Pick a presenter for `config`.
///
/// Desktop notifications need the `notifications` feature; without it the
/// log presenter is used and a warning is emitted.
pub fn presenter_for(config: &NotificationConfig) -> Arc<dyn NotificationPresenter> {
    if config.desktop {
        #[cfg(feature = "notifications")]
        {
            return Arc::new(DesktopPresenter);
        }

        #[cfg(not(feature = "notifications"))]
        {
            tracing::warn!(
                "Desktop notifications requested but the `notifications` feature is disabled"
            );
        }
    }
    Arc::new(LogPresenter)
}
