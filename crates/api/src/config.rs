use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stores::CodePolicy;

/// Service configuration, read from `IBOOK_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// HMAC key for session tokens
    pub token_secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Requests per window per client IP.
    #[serde(default = "default_http_rate_limit")]
    pub http_rate_limit: u64,
    /// Messages per window across all SMS gateways.
    #[serde(default = "default_sms_rate_limit")]
    pub sms_rate_limit: u64,
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub article_cache_ttl_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub hot_list_ttl_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub interactive_cache_ttl_secs: u64,
    /// Pending cache writes kept before new ones are dropped.
    #[serde(default = "default_cache_queue_capacity")]
    pub cache_queue_capacity: usize,

    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,
    #[serde(default = "default_code_cooldown_secs")]
    pub code_cooldown_secs: u64,
    #[serde(default = "default_code_max_attempts")]
    pub code_max_attempts: u32,
    #[serde(default = "default_code_min_ttl_secs")]
    pub code_min_ttl_secs: u64,
    #[serde(default = "default_code_max_ttl_secs")]
    pub code_max_ttl_secs: u64,

    /// SMS gateway base URLs in failover order (comma-separated).
    /// Empty means log messages instead of sending them.
    #[serde(default)]
    pub sms_gateways: Vec<String>,
    #[serde(default)]
    pub sms_api_key: Option<String>,
    #[serde(default = "default_sms_timeout_ms")]
    pub sms_timeout_ms: u64,
    /// Consecutive timeouts tolerated before switching gateway.
    #[serde(default = "default_sms_failover_threshold")]
    pub sms_failover_threshold: u32,

    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_token_ttl_secs() -> u64 {
    7 * 24 * 3600
}

fn default_http_rate_limit() -> u64 {
    100
}

fn default_sms_rate_limit() -> u64 {
    3000
}

fn default_rate_limit_window_ms() -> u64 {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_cache_queue_capacity() -> usize {
    1024
}

fn default_code_ttl_secs() -> u64 {
    1800
}

fn default_code_cooldown_secs() -> u64 {
    60
}

fn default_code_max_attempts() -> u32 {
    3
}

fn default_code_min_ttl_secs() -> u64 {
    120
}

fn default_code_max_ttl_secs() -> u64 {
    3600
}

fn default_sms_timeout_ms() -> u64 {
    3000
}

fn default_sms_failover_threshold() -> u32 {
    3
}

fn default_publish_attempts() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn article_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.article_cache_ttl_secs)
    }

    pub fn hot_list_ttl(&self) -> Duration {
        Duration::from_secs(self.hot_list_ttl_secs)
    }

    pub fn interactive_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.interactive_cache_ttl_secs)
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_secs)
    }

    pub fn code_policy(&self) -> CodePolicy {
        CodePolicy {
            cooldown: Duration::from_secs(self.code_cooldown_secs),
            max_attempts: self.code_max_attempts,
            min_lifetime: Duration::from_secs(self.code_min_ttl_secs),
            max_lifetime: Duration::from_secs(self.code_max_ttl_secs),
        }
    }

    pub fn sms_timeout(&self) -> Duration {
        Duration::from_millis(self.sms_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
