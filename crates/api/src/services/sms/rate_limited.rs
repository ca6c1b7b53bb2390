use std::sync::Arc;

use async_trait::async_trait;

use super::{MessageArg, SmsError, SmsSender};
use crate::stores::RateLimiter;

/// Limiter scope shared by every outbound SMS.
pub const SMS_LIMIT_SCOPE: &str = "sms:gateway";

/// Checks the shared SMS budget before delegating.
///
/// A limiter fault is reported as [`SmsError::LimiterUnavailable`], never as
/// "limited", so it can be alerted on.
pub struct RateLimitedSender {
    limiter: Arc<dyn RateLimiter>,
    inner: Arc<dyn SmsSender>,
    scope: String,
}

impl RateLimitedSender {
    pub fn new(limiter: Arc<dyn RateLimiter>, inner: Arc<dyn SmsSender>) -> Self {
        Self {
            limiter,
            inner,
            scope: SMS_LIMIT_SCOPE.to_string(),
        }
    }
}

#[async_trait]
impl SmsSender for RateLimitedSender {
    async fn send(
        &self,
        recipient: &str,
        template_id: &str,
        args: &[MessageArg],
    ) -> Result<(), SmsError> {
        let limited = self.limiter.limit(&self.scope).await.map_err(|e| {
            tracing::error!(scope = %self.scope, error = %e, "sms rate limiter unavailable");
            SmsError::LimiterUnavailable(e)
        })?;

        if limited {
            tracing::warn!(scope = %self.scope, recipient, template_id, "sms budget exhausted");
            return Err(SmsError::RateLimited {
                recipient: recipient.to_string(),
            });
        }

        self.inner.send(recipient, template_id, args).await
    }
}
