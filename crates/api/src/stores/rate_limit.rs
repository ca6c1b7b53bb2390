//! Sliding window rate limiting backed by the cache.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use super::cache::{Cache, SLIDE_WINDOW};

/// Rate limiter answering "is this scope over its budget right now?".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record a request against `scope`.
    /// Returns true if the caller should be throttled.
    async fn limit(&self, scope: &str) -> Result<bool>;
}

/// Sliding window limiter: at most `rate` requests per `interval` per scope.
///
/// The request is recorded before counting, so a rejected request still
/// occupies the window. Under contention this errs towards throttling.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    cache: Arc<dyn Cache>,
    interval: Duration,
    rate: u64,
}

impl SlidingWindowLimiter {
    pub fn new(cache: Arc<dyn Cache>, interval: Duration, rate: u64) -> Self {
        Self {
            cache,
            interval,
            rate,
        }
    }

    /// One-second window, which is what every limiter in this service uses.
    pub fn per_second(cache: Arc<dyn Cache>, rate: u64) -> Self {
        Self::new(cache, Duration::from_secs(1), rate)
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn limit(&self, scope: &str) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        // Two requests in the same millisecond must stay distinct set members
        let member = format!("{}-{:016x}", now, rand::rng().random::<u64>());

        let limited = self
            .cache
            .eval(
                &SLIDE_WINDOW,
                &[scope.to_string()],
                &[
                    self.interval.as_millis().to_string(),
                    self.rate.to_string(),
                    now.to_string(),
                    member,
                ],
            )
            .await?;

        Ok(limited == 1)
    }
}
