//! Notification throttling.
//!
//! A refresh may notify the user at most once per day. The decision is a pure
//! function of the user's preference and the time since the previous
//! notification.

use std::time::Duration;

use time::OffsetDateTime;

use weathernews_types::dates::DAY_IN_MILLIS;

/// Minimum spacing between two notifications.
pub const ONE_DAY: Duration = Duration::from_millis(DAY_IN_MILLIS as u64);

/// Time since the last notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinceLastNotification {
    /// No notification has ever been shown.
    Never,
    /// Time elapsed since the last one.
    Elapsed(Duration),
}

impl SinceLastNotification {
    /// Elapsed time between a stored timestamp and `now`.
    ///
    /// A stored timestamp in the future (clock moved backwards) counts as no
    /// time elapsed.
    pub fn between(last: Option<OffsetDateTime>, now: OffsetDateTime) -> Self {
        match last {
            None => Self::Never,
            Some(last) => {
                Self::Elapsed(Duration::try_from(now - last).unwrap_or(Duration::ZERO))
            }
        }
    }

    /// Whether at least [`ONE_DAY`] has passed.
    pub fn at_least_one_day(self) -> bool {
        match self {
            Self::Never => true,
            Self::Elapsed(elapsed) => elapsed >= ONE_DAY,
        }
    }
}

/// Decide whether a refresh should notify the user.
///
/// ```
/// use std::time::Duration;
/// use weathernews_core::gate::{SinceLastNotification, should_notify};
///
/// let two_days = SinceLastNotification::Elapsed(Duration::from_secs(2 * 86_400));
/// assert!(should_notify(true, two_days));
/// assert!(!should_notify(false, two_days));
/// assert!(should_notify(true, SinceLastNotification::Never));
/// ```
pub fn should_notify(enabled: bool, since_last: SinceLastNotification) -> bool {
    enabled && since_last.at_least_one_day()
}
