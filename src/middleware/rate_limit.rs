//! Per-user rate limiting
//!
//! Each Telegram user gets a token bucket. Configured admins are exempt.

use std::num::NonZeroU32;
use std::sync::Arc;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};
use crate::config::RateLimitConfig;
use crate::utils::errors::{CbxError, Result};

#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<DefaultKeyedRateLimiter<i64>>,
    admin_ids: Arc<Vec<i64>>,
}

impl RateLimitMiddleware {
    pub fn new(config: &RateLimitConfig, admin_ids: Vec<i64>) -> Self {
        let per_minute = NonZeroU32::new(config.per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(per_minute);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            admin_ids: Arc::new(admin_ids),
        }
    }

    /// Consume one request for the user or fail with `RateLimitExceeded`
    pub fn check(&self, telegram_id: i64) -> Result<()> {
        if self.admin_ids.contains(&telegram_id) {
            return Ok(());
        }

        match self.limiter.check_key(&telegram_id) {
            Ok(()) => {
                debug!(telegram_id, "Rate limit check passed");
                Ok(())
            }
            Err(_) => {
                warn!(telegram_id, "Rate limit exceeded");
                Err(CbxError::RateLimitExceeded)
            }
        }
    }

    /// Drop buckets that have fully refilled
    pub fn cleanup(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_users(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("tracked_users", &self.limiter.len())
            .field("admin_ids", &self.admin_ids)
            .finish()
    }
}
