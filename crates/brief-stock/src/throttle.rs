//! Token-bucket rate limiting for external providers

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Bucket size and refill rate for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Calls allowed back to back before waiting
    pub burst: u32,
    /// Tokens added per minute
    pub per_minute: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            burst: 1,
            per_minute: 60,
        }
    }
}

impl RateLimit {
    pub fn new(burst: u32, per_minute: u32) -> Self {
        Self { burst, per_minute }
    }

    fn quota(self) -> Quota {
        let per_minute = NonZeroU32::new(self.per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN);
        Quota::per_minute(per_minute).allow_burst(burst)
    }
}

/// Paces calls to one provider
pub struct Throttle {
    name: String,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl Throttle {
    pub fn new(name: impl Into<String>, limit: RateLimit) -> Self {
        Self {
            name: name.into(),
            limiter: RateLimiter::direct(limit.quota()),
        }
    }

    /// Wait until the bucket holds a token, then take it
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            tracing::debug!("Throttling calls to {}", self.name);
            self.limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle").field("name", &self.name).finish()
    }
}
