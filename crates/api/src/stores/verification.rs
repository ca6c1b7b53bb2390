//! One-time verification codes stored in the cache.
//!
//! Every transition runs inside a cache script, so concurrent checks of one
//! key can't both see attempts remaining past the bound, and a successful
//! check can't interleave with a re-issue.
//!
//! ```text
//! Absent --set_code--> Issued --check_code(ok)--> Consumed (entry deleted)
//!                        |----check_code(bad)--> Issued (attempts + 1)
//!                        |----attempts spent---> AttemptsExhausted (entry deleted)
//!                        `----ttl elapses------> Expired
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::cache::{CHECK_CODE, Cache, SET_CODE};

/// Rejections and failures of code operations.
#[derive(Debug, Error)]
pub enum VerifyCodeError {
    #[error("a code was issued too recently")]
    TooFrequent,
    #[error("requested code lifetime is out of bounds")]
    InvalidLifetime,
    #[error("no live code for this key")]
    NotFound,
    #[error("too many verification attempts")]
    TooManyAttempts,
    #[error("code does not match")]
    Mismatch,
    #[error("unexpected code script result {0}")]
    Unknown(i64),
    #[error("code store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

/// Limits applied to every issued code.
#[derive(Debug, Clone, Copy)]
pub struct CodePolicy {
    /// Minimum time between two issues for the same key.
    pub cooldown: Duration,
    /// Wrong guesses allowed per issuance.
    pub max_attempts: u32,
    pub min_lifetime: Duration,
    pub max_lifetime: Duration,
}

impl Default for CodePolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            max_attempts: 3,
            min_lifetime: Duration::from_secs(120),
            max_lifetime: Duration::from_secs(3600),
        }
    }
}

/// Store for verification code operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Issue `code` under `key`, valid for `ttl`.
    async fn set_code(&self, key: &str, code: &str, ttl: Duration) -> Result<(), VerifyCodeError>;

    /// Consume one attempt against the code under `key`.
    /// Ok means the code matched and has been invalidated.
    async fn check_code(&self, key: &str, input: &str) -> Result<(), VerifyCodeError>;
}

/// Cache-script implementation of VerificationStore.
#[derive(Clone)]
pub struct CacheVerificationStore {
    cache: Arc<dyn Cache>,
    policy: CodePolicy,
}

impl CacheVerificationStore {
    pub fn new(cache: Arc<dyn Cache>, policy: CodePolicy) -> Self {
        Self { cache, policy }
    }

    /// Key for a code issued for `biz` (e.g. "login") to `recipient`.
    pub fn code_key(biz: &str, recipient: &str) -> String {
        format!("verify_code:{}:{}", biz, recipient)
    }
}

#[async_trait]
impl VerificationStore for CacheVerificationStore {
    async fn set_code(&self, key: &str, code: &str, ttl: Duration) -> Result<(), VerifyCodeError> {
        let result = self
            .cache
            .eval(
                &SET_CODE,
                &[key.to_string()],
                &[
                    code.to_string(),
                    ttl.as_secs().to_string(),
                    self.policy.cooldown.as_secs().to_string(),
                    self.policy.min_lifetime.as_secs().to_string(),
                    self.policy.max_lifetime.as_secs().to_string(),
                ],
            )
            .await
            .map_err(VerifyCodeError::Unavailable)?;

        match result {
            0 => Ok(()),
            -1 => Err(VerifyCodeError::TooFrequent),
            -2 => Err(VerifyCodeError::InvalidLifetime),
            other => Err(VerifyCodeError::Unknown(other)),
        }
    }

    async fn check_code(&self, key: &str, input: &str) -> Result<(), VerifyCodeError> {
        let result = self
            .cache
            .eval(
                &CHECK_CODE,
                &[key.to_string()],
                &[input.to_string(), self.policy.max_attempts.to_string()],
            )
            .await
            .map_err(VerifyCodeError::Unavailable)?;

        match result {
            0 => Ok(()),
            -1 => Err(VerifyCodeError::TooManyAttempts),
            -2 => Err(VerifyCodeError::Mismatch),
            -3 => Err(VerifyCodeError::NotFound),
            other => Err(VerifyCodeError::Unknown(other)),
        }
    }
}
