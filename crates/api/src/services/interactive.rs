//! Read and like counters.
//!
//! The database is authoritative. The cached hash is adjusted after each
//! committed change and may lag it briefly; cache faults are logged and never
//! fail the operation.

use std::sync::Arc;

use super::article_sync::ArticleError;
use crate::models::ArticleStats;
use crate::repos::InteractiveRepo;
use crate::stores::{Counter, InteractiveCache};

pub struct InteractiveService {
    repo: Arc<dyn InteractiveRepo>,
    cache: InteractiveCache,
}

impl InteractiveService {
    pub fn new(repo: Arc<dyn InteractiveRepo>, cache: InteractiveCache) -> Self {
        Self { repo, cache }
    }

    pub async fn record_read(&self, article_id: i64) -> Result<(), ArticleError> {
        self.repo.incr_read(article_id).await?;
        self.adjust_cache(article_id, Counter::Read, 1).await;
        Ok(())
    }

    /// Set or clear the user's like. Returns whether anything changed.
    pub async fn set_liked(
        &self,
        user_id: i64,
        article_id: i64,
        liked: bool,
    ) -> Result<bool, ArticleError> {
        let (changed, delta) = if liked {
            (self.repo.like(user_id, article_id).await?, 1)
        } else {
            (self.repo.unlike(user_id, article_id).await?, -1)
        };
        if changed {
            self.adjust_cache(article_id, Counter::Like, delta).await;
        }
        Ok(changed)
    }

    pub async fn stats(&self, article_id: i64) -> Result<ArticleStats, ArticleError> {
        match self.cache.get(article_id).await {
            Ok(Some(stats)) => return Ok(stats),
            Ok(None) => {}
            Err(e) => tracing::warn!(article_id, error = %e, "interaction cache read failed"),
        }

        let stats = self.repo.stats(article_id).await?;
        if let Err(e) = self.cache.set(&stats).await {
            tracing::warn!(article_id, error = %e, "interaction cache write failed");
        }
        Ok(stats)
    }

    async fn adjust_cache(&self, article_id: i64, counter: Counter, delta: i64) {
        if let Err(e) = self.cache.incr(article_id, counter, delta).await {
            tracing::warn!(article_id, ?counter, error = %e, "interaction cache update failed");
        }
    }
}
