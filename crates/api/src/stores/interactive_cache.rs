//! Cached interaction counters, one hash per article.
//!
//! Increments only touch a hash that is already cached. A missing hash is
//! loaded from the database on the next read, which already includes the
//! increment.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use super::cache::{Cache, INCR_CNT};
use crate::models::ArticleStats;

const READ_FIELD: &str = "read_cnt";
const LIKE_FIELD: &str = "like_cnt";

/// Which counter an increment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Read,
    Like,
}

impl Counter {
    fn field(self) -> &'static str {
        match self {
            Counter::Read => READ_FIELD,
            Counter::Like => LIKE_FIELD,
        }
    }
}

#[derive(Clone)]
pub struct InteractiveCache {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl InteractiveCache {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn key(article_id: i64) -> String {
        format!("article:interactive:{}", article_id)
    }

    /// Cached counters, `Ok(None)` when the hash is absent.
    pub async fn get(&self, article_id: i64) -> Result<Option<ArticleStats>> {
        let fields = self.cache.get_hash(&Self::key(article_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let counter = |name: &str| -> Result<i64> {
            match fields.get(name) {
                Some(value) => value
                    .parse()
                    .with_context(|| format!("corrupt {} in interaction cache", name)),
                None => Ok(0),
            }
        };
        Ok(Some(ArticleStats {
            article_id,
            read_cnt: counter(READ_FIELD)?,
            like_cnt: counter(LIKE_FIELD)?,
        }))
    }

    pub async fn set(&self, stats: &ArticleStats) -> Result<()> {
        let fields = [
            (READ_FIELD.to_string(), stats.read_cnt.to_string()),
            (LIKE_FIELD.to_string(), stats.like_cnt.to_string()),
        ];
        self.cache
            .set_hash(&Self::key(stats.article_id), &fields, self.ttl)
            .await
    }

    /// Add `delta` to one counter. Returns false when nothing is cached for
    /// the article, so there was nothing to adjust.
    pub async fn incr(&self, article_id: i64, counter: Counter, delta: i64) -> Result<bool> {
        let keys = [Self::key(article_id)];
        let args = [counter.field().to_string(), delta.to_string()];
        let applied = self.cache.eval(&INCR_CNT, &keys, &args).await?;
        Ok(applied == 1)
    }
}
