//! Read cache for published articles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use super::cache::Cache;
use crate::models::Article;

/// Number of articles kept in the hot list.
pub const HOT_LIST_SIZE: i64 = 100;

const HOT_LIST_KEY: &str = "article:first_page";

/// Per-article and hot-list cache entries, stored as JSON.
#[derive(Clone)]
pub struct ArticleCache {
    cache: Arc<dyn Cache>,
    article_ttl: Duration,
    hot_list_ttl: Duration,
}

impl ArticleCache {
    pub fn new(cache: Arc<dyn Cache>, article_ttl: Duration, hot_list_ttl: Duration) -> Self {
        Self {
            cache,
            article_ttl,
            hot_list_ttl,
        }
    }

    pub fn article_key(id: i64) -> String {
        format!("article:{}", id)
    }

    /// Cached article, `Ok(None)` when absent.
    /// Errors are transport or decoding faults.
    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let Some(bytes) = self.cache.get(&Self::article_key(id)).await? else {
            return Ok(None);
        };
        let article = serde_json::from_slice(&bytes).context("corrupt article cache entry")?;
        Ok(Some(article))
    }

    pub async fn set_article(&self, article: &Article) -> Result<()> {
        let json = serde_json::to_vec(article)?;
        self.cache
            .set(&Self::article_key(article.id), &json, self.article_ttl)
            .await
    }

    pub async fn delete_article(&self, id: i64) -> Result<()> {
        self.cache.delete(&Self::article_key(id)).await?;
        Ok(())
    }

    /// Cached hot list, `Ok(None)` when absent or empty.
    /// Errors are transport or decoding faults.
    pub async fn get_hot_list(&self) -> Result<Option<Vec<Article>>> {
        let Some(bytes) = self.cache.get(HOT_LIST_KEY).await? else {
            return Ok(None);
        };
        let articles: Vec<Article> =
            serde_json::from_slice(&bytes).context("corrupt hot list cache entry")?;
        if articles.is_empty() {
            return Ok(None);
        }
        Ok(Some(articles))
    }

    pub async fn set_hot_list(&self, articles: &[Article]) -> Result<()> {
        let json = serde_json::to_vec(articles)?;
        self.cache.set(HOT_LIST_KEY, &json, self.hot_list_ttl).await
    }

    pub async fn delete_hot_list(&self) -> Result<()> {
        self.cache.delete(HOT_LIST_KEY).await?;
        Ok(())
    }
}
