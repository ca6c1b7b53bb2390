//! Outbound SMS.
//!
//! Every sender implements [`SmsSender`]. The production chain is
//! [`RateLimitedSender`] over a [`FailoverSender`] ring of gateway clients:
//!
//! ```text
//! RateLimitedSender ("sms:gateway" budget)
//!   └── FailoverSender (rotates after consecutive timeouts)
//!         ├── HttpSmsSender (gateway 1)
//!         └── HttpSmsSender (gateway 2) ...
//! ```

mod failover;
mod http;
mod log;
mod rate_limited;

pub use failover::FailoverSender;
pub use http::HttpSmsSender;
pub use log::LogSmsSender;
pub use rate_limited::RateLimitedSender;

use async_trait::async_trait;
use thiserror::Error;

/// A named template argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageArg {
    pub name: String,
    pub value: String,
}

impl MessageArg {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SmsError {
    /// The gateway did not answer in time. Drives failover rotation.
    #[error("sms gateway timed out")]
    Timeout,
    /// The gateway refused the message; resending won't help.
    #[error("sms rejected by gateway: {0}")]
    Rejected(String),
    #[error("sms send failed")]
    Failed(#[source] anyhow::Error),
    #[error("sms budget exhausted, message to {recipient} not sent")]
    RateLimited { recipient: String },
    #[error("sms rate limiter unavailable")]
    LimiterUnavailable(#[source] anyhow::Error),
}

impl SmsError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SmsError::Timeout)
    }
}

/// Sends one templated message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        template_id: &str,
        args: &[MessageArg],
    ) -> Result<(), SmsError>;
}
