//! Shared key-value cache with server-side atomic scripts.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

/// A Lua program evaluated atomically by the cache server.
///
/// `name` identifies the program independently of its source so callers and
/// test doubles agree on which script ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheScript {
    name: &'static str,
    source: &'static str,
}

impl CacheScript {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn source(&self) -> &'static str {
        self.source
    }
}

pub const SLIDE_WINDOW: CacheScript =
    CacheScript::new("slide_window", include_str!("../../scripts/slide_window.lua"));
pub const SET_CODE: CacheScript =
    CacheScript::new("set_code", include_str!("../../scripts/set_code.lua"));
pub const CHECK_CODE: CacheScript =
    CacheScript::new("check_code", include_str!("../../scripts/check_code.lua"));
pub const INCR_CNT: CacheScript =
    CacheScript::new("incr_cnt", include_str!("../../scripts/incr_cnt.lua"));

/// Cache operations the core depends on.
///
/// Errors are transport or protocol failures. A missing key is `Ok(None)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    /// Health check - verify cache connectivity.
    async fn health_check(&self) -> Result<bool>;

    /// Run `script` as one indivisible operation and return its integer result.
    async fn eval(&self, script: &CacheScript, keys: &[String], args: &[String]) -> Result<i64>;

    /// Get raw bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store bytes under `key` with a TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Delete `key` (returns true if it existed).
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All fields of the hash at `key`. Empty when the key is absent.
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Replace the hash at `key` with `fields` and set its TTL.
    async fn set_hash(&self, key: &str, fields: &[(String, String)], ttl: Duration)
    -> Result<()>;
}

/// Redis implementation of Cache.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(result == "PONG")
    }

    async fn eval(&self, script: &CacheScript, keys: &[String], args: &[String]) -> Result<i64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // EVALSHA first, falls back to SCRIPT LOAD when the server doesn't know the hash
        let redis_script = redis::Script::new(script.source());
        let mut invocation = redis_script.prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(arg);
        }

        let code: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(code)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn set_hash(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(key, fields)
                .ignore()
                .expire(key, ttl.as_secs().max(1) as i64)
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
