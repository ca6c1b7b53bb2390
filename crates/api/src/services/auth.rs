//! Session tokens.
//!
//! A token is `{user_id}.{expires_at}.{signature}` where `expires_at` is in
//! epoch seconds and the signature is hex HMAC-SHA256 over the first two
//! parts.

use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Issues and checks session tokens.
#[cfg_attr(test, mockall::automock)]
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: i64) -> Result<String>;

    /// User id carried by a valid, unexpired token.
    fn verify(&self, token: &str) -> Option<i64>;
}

pub struct HmacTokenService {
    secret: Vec<u8>,
    ttl: Duration,
}

impl HmacTokenService {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    fn mac(&self, claims: &str) -> Result<HmacSha256> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|e| anyhow!("bad token secret: {e}"))?;
        mac.update(claims.as_bytes());
        Ok(mac)
    }

    fn issue_at(&self, user_id: i64, now: i64) -> Result<String> {
        let expires_at = now + self.ttl.as_secs() as i64;
        let claims = format!("{}.{}", user_id, expires_at);
        let signature = hex::encode(self.mac(&claims)?.finalize().into_bytes());
        Ok(format!("{}.{}", claims, signature))
    }

    fn verify_at(&self, token: &str, now: i64) -> Option<i64> {
        let (claims, signature) = token.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.mac(claims).ok()?.verify_slice(&signature).ok()?;

        let (user_id, expires_at) = claims.split_once('.')?;
        let expires_at: i64 = expires_at.parse().ok()?;
        if expires_at <= now {
            return None;
        }
        user_id.parse().ok()
    }
}

impl TokenService for HmacTokenService {
    fn issue(&self, user_id: i64) -> Result<String> {
        self.issue_at(user_id, Utc::now().timestamp())
    }

    fn verify(&self, token: &str) -> Option<i64> {
        self.verify_at(token, Utc::now().timestamp())
    }
}
