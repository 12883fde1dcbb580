//! Image usage quota tracking and enforcement
//!
//! Non-premium accounts may generate and edit a limited number of images per
//! rolling usage window. Counters and the window start live on the
//! [`User`] record so they survive restarts; this module only decides and
//! updates, persisting is the caller's job.

use crate::models::{QuotaKind, User};
use chrono::{DateTime, Duration, Utc};

/// Default number of actions per kind per window
pub const DEFAULT_MAX_PER_WINDOW: u32 = 6;

/// Default window length in hours
pub const DEFAULT_WINDOW_HOURS: i64 = 6;

/// Quota limits for metered image actions
///
/// # Examples
///
/// ```
/// use westline::chat::quota::QuotaLimits;
///
/// let limits = QuotaLimits::default();
/// assert_eq!(limits.max_per_window, 6);
/// assert_eq!(limits.window, chrono::Duration::hours(6));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaLimits {
    /// Maximum actions of each kind per window
    pub max_per_window: u32,

    /// Length of the rolling window
    pub window: Duration,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_per_window: DEFAULT_MAX_PER_WINDOW,
            window: Duration::hours(DEFAULT_WINDOW_HOURS),
        }
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Premium account; nothing was counted
    Unlimited,

    /// The action may proceed and has been counted
    Allowed {
        /// Actions of this kind used in the window, including this one
        used: u32,
        /// Actions of this kind left in the window
        remaining: u32,
    },

    /// The window's allowance is exhausted
    Denied {
        /// When the current window ends and counters reset
        renews_at: DateTime<Utc>,
    },
}

impl QuotaDecision {
    /// True unless the action was denied
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// Rolling-window usage limiter
#[derive(Debug, Clone, Default)]
pub struct UsageLimiter {
    limits: QuotaLimits,
}

impl UsageLimiter {
    /// Creates a limiter with the given limits
    pub fn new(limits: QuotaLimits) -> Self {
        Self { limits }
    }

    /// The configured limits
    pub fn limits(&self) -> &QuotaLimits {
        &self.limits
    }

    /// Opens a new window when the current one has expired
    ///
    /// Legacy records without a window start get one at `now`. Premium users
    /// are left untouched.
    ///
    /// # Returns
    ///
    /// `true` when the record changed and should be persisted
    pub fn refresh_window(&self, user: &mut User, now: DateTime<Utc>) -> bool {
        if user.is_premium {
            return false;
        }

        match user.usage_window_start {
            Some(start) if now - start < self.limits.window => false,
            Some(start) => {
                tracing::debug!(
                    "Usage window for {} expired (started {}), resetting",
                    user.email,
                    start
                );
                user.image_generation_count = 0;
                user.image_edit_count = 0;
                user.usage_window_start = Some(now);
                true
            }
            None => {
                user.usage_window_start = Some(now);
                true
            }
        }
    }

    /// Checks the quota for `kind` and consumes one unit when available
    ///
    /// # Arguments
    ///
    /// * `user` - Account to check; counters are updated in place
    /// * `kind` - Which metered action is being attempted
    /// * `now` - Current time
    ///
    /// # Returns
    ///
    /// The decision. `Denied` leaves the counters untouched and carries the
    /// window's end time.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use westline::chat::quota::{QuotaDecision, UsageLimiter};
    /// use westline::models::{QuotaKind, User};
    ///
    /// let now = Utc::now();
    /// let mut user = User::new("Ada", "ada@example.com", now - Duration::hours(1));
    /// user.image_generation_count = 5;
    ///
    /// let limiter = UsageLimiter::default();
    /// assert!(limiter.check_and_consume(&mut user, QuotaKind::Generate, now).is_allowed());
    /// assert_eq!(user.image_generation_count, 6);
    /// assert!(matches!(
    ///     limiter.check_and_consume(&mut user, QuotaKind::Generate, now),
    ///     QuotaDecision::Denied { .. }
    /// ));
    /// ```
    pub fn check_and_consume(
        &self,
        user: &mut User,
        kind: QuotaKind,
        now: DateTime<Utc>,
    ) -> QuotaDecision {
        if user.is_premium {
            return QuotaDecision::Unlimited;
        }

        self.refresh_window(user, now);

        let used = user.usage_count(kind);
        if used >= self.limits.max_per_window {
            let renews_at = user.usage_window_start.unwrap_or(now) + self.limits.window;
            tracing::info!(
                "{} quota exhausted for {} ({}/{}), renews at {}",
                kind,
                user.email,
                used,
                self.limits.max_per_window,
                renews_at
            );
            return QuotaDecision::Denied { renews_at };
        }

        let counter = user.usage_count_mut(kind);
        *counter += 1;
        let used = *counter;
        tracing::debug!(
            "{} quota consumed for {}: {}/{}",
            kind,
            user.email,
            used,
            self.limits.max_per_window
        );

        QuotaDecision::Allowed {
            used,
            remaining: self.limits.max_per_window.saturating_sub(used),
        }
    }

    /// Actions of `kind` left in the window, or `None` for premium users
    ///
    /// Does not modify the record; an expired window counts as full.
    pub fn remaining(&self, user: &User, kind: QuotaKind, now: DateTime<Utc>) -> Option<u32> {
        if user.is_premium {
            return None;
        }
        let expired = user
            .usage_window_start
            .map(|start| now - start >= self.limits.window)
            .unwrap_or(true);
        if expired {
            return Some(self.limits.max_per_window);
        }
        Some(
            self.limits
                .max_per_window
                .saturating_sub(user.usage_count(kind)),
        )
    }

    /// End of the user's current window
    pub fn renews_at(&self, user: &User) -> Option<DateTime<Utc>> {
        user.usage_window_start.map(|start| start + self.limits.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(count: u32, window_age: Duration, now: DateTime<Utc>) -> User {
        let mut user = User::new("Test", "test@example.com", now - window_age);
        user.image_generation_count = count;
        user
    }

    #[test]
    fn test_quota_limits_default() {
        let limits = QuotaLimits::default();
        assert_eq!(limits.max_per_window, 6);
        assert_eq!(limits.window, Duration::hours(6));
    }

    #[test]
    fn test_last_unit_allowed_then_denied_with_renewal_time() {
        let now = Utc::now();
        let mut user = user_with(5, Duration::hours(1), now);
        let window_start = user.usage_window_start.unwrap();
        let limiter = UsageLimiter::default();

        let first = limiter.check_and_consume(&mut user, QuotaKind::Generate, now);
        assert_eq!(
            first,
            QuotaDecision::Allowed {
                used: 6,
                remaining: 0
            }
        );
        assert_eq!(user.image_generation_count, 6);

        let second = limiter.check_and_consume(&mut user, QuotaKind::Generate, now);
        assert_eq!(
            second,
            QuotaDecision::Denied {
                renews_at: window_start + Duration::hours(6)
            }
        );
        assert_eq!(user.image_generation_count, 6);
    }

    #[test]
    fn test_expired_window_resets_before_evaluating() {
        let now = Utc::now();
        let mut user = user_with(6, Duration::hours(7), now);
        user.image_edit_count = 4;
        let limiter = UsageLimiter::default();

        let decision = limiter.check_and_consume(&mut user, QuotaKind::Generate, now);
        assert!(decision.is_allowed());
        assert_eq!(user.image_generation_count, 1);
        assert_eq!(user.image_edit_count, 0);
        assert_eq!(user.usage_window_start, Some(now));
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let now = Utc::now();
        let mut user = user_with(6, Duration::hours(6), now);
        let limiter = UsageLimiter::default();

        assert!(limiter.refresh_window(&mut user, now));
        assert_eq!(user.image_generation_count, 0);
        assert_eq!(user.usage_window_start, Some(now));
    }

    #[test]
    fn test_refresh_within_window_is_noop() {
        let now = Utc::now();
        let mut user = user_with(3, Duration::minutes(30), now);
        let before = user.clone();
        assert!(!UsageLimiter::default().refresh_window(&mut user, now));
        assert_eq!(user, before);
    }

    #[test]
    fn test_legacy_user_gets_window_start() {
        let now = Utc::now();
        let mut user = user_with(2, Duration::zero(), now);
        user.usage_window_start = None;

        assert!(UsageLimiter::default().refresh_window(&mut user, now));
        assert_eq!(user.usage_window_start, Some(now));
        assert_eq!(user.image_generation_count, 2);
    }

    #[test]
    fn test_kinds_are_counted_separately() {
        let now = Utc::now();
        let mut user = user_with(6, Duration::hours(1), now);
        let limiter = UsageLimiter::default();

        assert!(!limiter
            .check_and_consume(&mut user, QuotaKind::Generate, now)
            .is_allowed());
        assert!(limiter
            .check_and_consume(&mut user, QuotaKind::Edit, now)
            .is_allowed());
        assert_eq!(user.image_edit_count, 1);
    }

    #[test]
    fn test_grants_never_exceed_limit_within_window() {
        let start = Utc::now();
        let mut user = user_with(0, Duration::zero(), start);
        let limiter = UsageLimiter::default();

        let mut granted = 0;
        for minute in 0..120 {
            let now = start + Duration::minutes(minute * 3);
            if limiter
                .check_and_consume(&mut user, QuotaKind::Edit, now)
                .is_allowed()
            {
                granted += 1;
            }
        }
        assert_eq!(granted, 6);
    }

    #[test]
    fn test_premium_bypasses_bookkeeping() {
        let now = Utc::now();
        let mut user = user_with(100, Duration::hours(1), now);
        user.is_premium = true;
        let before = user.clone();

        let decision = UsageLimiter::default().check_and_consume(&mut user, QuotaKind::Generate, now);
        assert_eq!(decision, QuotaDecision::Unlimited);
        assert_eq!(user, before);
    }

    #[test]
    fn test_remaining_reports_without_consuming() {
        let now = Utc::now();
        let user = user_with(4, Duration::hours(1), now);
        let limiter = UsageLimiter::default();
        assert_eq!(limiter.remaining(&user, QuotaKind::Generate, now), Some(2));
        assert_eq!(limiter.remaining(&user, QuotaKind::Edit, now), Some(6));
        assert_eq!(
            limiter.remaining(&user, QuotaKind::Generate, now + Duration::hours(6)),
            Some(6)
        );
    }

    #[test]
    fn test_custom_limits() {
        let now = Utc::now();
        let mut user = user_with(0, Duration::zero(), now);
        let limiter = UsageLimiter::new(QuotaLimits {
            max_per_window: 1,
            window: Duration::minutes(10),
        });
        assert!(limiter
            .check_and_consume(&mut user, QuotaKind::Generate, now)
            .is_allowed());
        assert!(!limiter
            .check_and_consume(&mut user, QuotaKind::Generate, now)
            .is_allowed());
        assert!(limiter
            .check_and_consume(&mut user, QuotaKind::Generate, now + Duration::minutes(10))
            .is_allowed());
    }
}
