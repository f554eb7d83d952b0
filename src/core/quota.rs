//! Per-user hourly download quota

use crate::error::ReelError;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::{debug, warn};

/// Caps how many downloads one user may start per hour
pub struct DownloadQuota {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    per_hour: u32,
}

impl DownloadQuota {
    /// Allow `per_hour` downloads per user; 0 disables the quota
    pub fn per_hour(per_hour: u32) -> Self {
        let limiter = NonZeroU32::new(per_hour).map(|n| RateLimiter::keyed(Quota::per_hour(n)));
        Self { limiter, per_hour }
    }

    #[cfg(test)]
    fn with_quota(quota: Quota, per_hour: u32) -> Self {
        Self {
            limiter: Some(RateLimiter::keyed(quota)),
            per_hour,
        }
    }

    /// Quota that never rejects
    pub fn unlimited() -> Self {
        Self::per_hour(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Consume one download slot for `user_id`
    pub fn check(&self, user_id: &str) -> Result<(), ReelError> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        limiter.check_key(&user_id.to_string()).map_err(|_| {
            warn!(user_id, limit = self.per_hour, "Hourly download quota exceeded");
            ReelError::QuotaExceeded(user_id.to_string())
        })
    }

    /// Users currently holding limiter state
    pub fn tracked_users(&self) -> usize {
        self.limiter.as_ref().map_or(0, |l| l.len())
    }

    /// Forget users whose allowance has fully refilled; returns how many remain
    pub fn retain_recent(&self) -> usize {
        let Some(limiter) = &self.limiter else {
            return 0;
        };
        let before = limiter.len();
        limiter.retain_recent();
        limiter.shrink_to_fit();
        let after = limiter.len();
        if after < before {
            debug!(dropped = before - after, remaining = after, "Pruned idle quota entries");
        }
        after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_blocks_after_limit() {
        let quota = DownloadQuota::per_hour(2);
        assert!(quota.check("1").is_ok());
        assert!(quota.check("1").is_ok());
        assert!(matches!(quota.check("1"), Err(ReelError::QuotaExceeded(_))));
    }

    #[test]
    fn test_quota_is_per_user() {
        let quota = DownloadQuota::per_hour(1);
        assert!(quota.check("a").is_ok());
        assert!(quota.check("b").is_ok());
        assert!(quota.check("a").is_err());
    }

    #[test]
    fn test_zero_disables_quota() {
        let quota = DownloadQuota::unlimited();
        assert!(!quota.is_enabled());
        for _ in 0..100 {
            assert!(quota.check("1").is_ok());
        }
    }

    #[test]
    fn test_retain_recent_drops_refilled_users() {
        let quota = DownloadQuota::with_quota(
            Quota::with_period(std::time::Duration::from_millis(10))
                .unwrap()
                .allow_burst(NonZeroU32::new(1).unwrap()),
            1,
        );
        assert!(quota.check("idle").is_ok());
        assert_eq!(quota.tracked_users(), 1);

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(quota.retain_recent(), 0);
        assert_eq!(quota.tracked_users(), 0);
        assert!(quota.check("idle").is_ok());
    }

    #[test]
    fn test_retain_recent_keeps_limited_users() {
        let quota = DownloadQuota::per_hour(1);
        assert!(quota.check("busy").is_ok());

        assert_eq!(quota.retain_recent(), 1);
        assert!(matches!(quota.check("busy"), Err(ReelError::QuotaExceeded(_))));
        assert_eq!(DownloadQuota::unlimited().retain_recent(), 0);
    }
}
