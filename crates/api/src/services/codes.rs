//! Issue and verify one-time codes delivered by SMS.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use super::sms::{MessageArg, SmsError, SmsSender};
use crate::stores::{CacheVerificationStore, VerificationStore, VerifyCodeError};

/// Business scope of login codes.
pub const LOGIN_BIZ: &str = "login";

#[derive(Debug, Error)]
pub enum CodeError {
    #[error(transparent)]
    Verify(#[from] VerifyCodeError),
    #[error(transparent)]
    Sms(#[from] SmsError),
}

pub struct CodeService {
    store: Arc<dyn VerificationStore>,
    sms: Arc<dyn SmsSender>,
    ttl: Duration,
}

impl CodeService {
    pub fn new(store: Arc<dyn VerificationStore>, sms: Arc<dyn SmsSender>, ttl: Duration) -> Self {
        Self { store, sms, ttl }
    }

    /// Issue a fresh code for `biz` and text it to `phone_number`.
    ///
    /// The code is stored before sending. If the send fails the stored code
    /// still holds the cooldown, so a flaky gateway can't be hammered.
    pub async fn send(&self, biz: &str, phone_number: &str) -> Result<(), CodeError> {
        let code = generate_code();
        let key = CacheVerificationStore::code_key(biz, phone_number);

        self.store.set_code(&key, &code, self.ttl).await?;

        let template = format!("{}_code", biz);
        self.sms
            .send(phone_number, &template, &[MessageArg::new("code", code)])
            .await?;

        tracing::info!(biz, "verification code sent");
        Ok(())
    }

    /// Consume `input` against the live code for `biz` and `phone_number`.
    pub async fn verify(&self, biz: &str, phone_number: &str, input: &str) -> Result<(), CodeError> {
        let key = CacheVerificationStore::code_key(biz, phone_number);
        self.store.check_code(&key, input).await?;
        Ok(())
    }
}

/// Six random decimal digits, zero padded.
fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}
