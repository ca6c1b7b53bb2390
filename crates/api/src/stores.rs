//! Ephemeral stores (Redis).
//!
//! This module contains the cache abstraction and everything built on it.
//! All data stored here has TTL-based expiration.
//!
//! ## Stores
//!
//! - **cache** - Get/set/delete plus atomic script evaluation
//! - **rate_limit** - Sliding window limiter (one script call per request)
//! - **verification** - One-time codes with cooldown and attempt budget
//! - **article_cache** - Per-article entries and the hot list of published articles
//! - **interactive_cache** - Read/like counters per article
//!
//! ## Redis Key Patterns
//!
//! ```text
//! ip-limiter:{ip}                 → Sorted set of request timestamps (HTTP admission)
//! sms:gateway                     → Sorted set of request timestamps (SMS budget)
//! verify_code:{biz}:{recipient}   → Hash {code, attempts, lifetime} (auto-expires)
//! article:{id}                    → Article JSON (auto-expires)
//! article:first_page              → Top 100 published articles JSON (auto-expires)
//! article:interactive:{id}        → Hash {read_cnt, like_cnt} (auto-expires)
//! ```

mod article_cache;
mod cache;
mod interactive_cache;
mod rate_limit;
mod verification;

pub use article_cache::{ArticleCache, HOT_LIST_SIZE};
pub use cache::{Cache, CacheScript, RedisCache};
pub use interactive_cache::{Counter, InteractiveCache};
pub use rate_limit::{RateLimiter, SlidingWindowLimiter};
pub use verification::{CacheVerificationStore, CodePolicy, VerificationStore, VerifyCodeError};

#[cfg(test)]
pub use cache::MockCache;
#[cfg(test)]
pub use rate_limit::MockRateLimiter;
#[cfg(test)]
pub use verification::MockVerificationStore;

use std::sync::Arc;

/// Collection of all ephemeral stores.
#[derive(Clone)]
pub struct Stores {
    pub cache: Arc<dyn Cache>,
    /// Admission limiter for incoming HTTP requests.
    pub http_limiter: Arc<dyn RateLimiter>,
}
