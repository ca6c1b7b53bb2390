//! Keeps the reader store and read caches in step with the author store.
//!
//! Writes go author store first, then reader store, in one transaction. The
//! cache is touched only after commit and never fails the write: priming goes
//! through the [`CachePrimer`] queue, eviction of withdrawn content is also
//! done inline so it takes effect immediately.
//!
//! The one place a cache fault is fatal is the hot-list read: if the cache is
//! down, falling through to the database for every top-page read would
//! overload it, so the error is surfaced instead.

use std::sync::Arc;

use thiserror::Error;

use super::cache_primer::{CachePrimer, CacheTask};
use crate::models::{Article, ArticleStatus, AuthorArticle, ReaderArticle};
use crate::repos::{ArticleSyncRepo, ReaderArticleRepo, StoreError};
use crate::stores::{ArticleCache, HOT_LIST_SIZE};

/// Failures of article operations.
#[derive(Debug, Error)]
pub enum ArticleError {
    #[error("article not found or not owned by this author")]
    NotFound,
    #[error("article cache unavailable")]
    CacheUnavailable(#[source] anyhow::Error),
    #[error("article store failure")]
    Store(#[source] sqlx::Error),
}

impl From<StoreError> for ArticleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ArticleError::NotFound,
            StoreError::Database(e) => ArticleError::Store(e),
        }
    }
}

pub struct ArticleSynchronizer {
    sync_repo: Arc<dyn ArticleSyncRepo>,
    readers: Arc<dyn ReaderArticleRepo>,
    cache: ArticleCache,
    primer: CachePrimer,
}

impl ArticleSynchronizer {
    pub fn new(
        sync_repo: Arc<dyn ArticleSyncRepo>,
        readers: Arc<dyn ReaderArticleRepo>,
        cache: ArticleCache,
        primer: CachePrimer,
    ) -> Self {
        Self {
            sync_repo,
            readers,
            cache,
            primer,
        }
    }

    /// Write both projections and assign the article id back onto them.
    pub async fn sync(
        &self,
        author: &mut AuthorArticle,
        reader: &mut ReaderArticle,
    ) -> Result<i64, ArticleError> {
        let article = self.sync_repo.sync(author, reader).await?;
        author.id = Some(article.id);
        reader.id = Some(article.id);

        let id = article.id;
        if article.status == ArticleStatus::Published {
            self.primer.submit(CacheTask::RefreshArticle(id));
        } else {
            self.primer.submit(CacheTask::DeleteArticle(id));
        }
        // The changed article now sorts first; the next top-page read rebuilds the list
        self.primer.submit(CacheTask::DeleteHotList);

        tracing::debug!(article_id = id, "article synced");
        Ok(id)
    }

    /// Set the status in both stores. Anything but Published is evicted from
    /// the read caches.
    pub async fn sync_update_status(
        &self,
        id: i64,
        author_id: i64,
        status: ArticleStatus,
    ) -> Result<(), ArticleError> {
        self.sync_repo.sync_status(id, author_id, status).await?;

        if status != ArticleStatus::Published {
            self.evict(id).await;
        }

        tracing::debug!(article_id = id, ?status, "article status synced");
        Ok(())
    }

    /// Published articles, most recently updated first.
    ///
    /// Pages that fall inside the hot list are served from the cache. A miss
    /// loads the whole hot list from the store and re-primes it.
    pub async fn list_all(&self, offset: i64, limit: i64) -> Result<Vec<Article>, ArticleError> {
        if offset.saturating_add(limit) > HOT_LIST_SIZE {
            return Ok(self.readers.list_published(offset, limit).await?);
        }

        match self.cache.get_hot_list().await {
            Ok(Some(articles)) => return Ok(page(articles, offset, limit)),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "hot list cache unavailable, refusing store fallback");
                return Err(ArticleError::CacheUnavailable(e));
            }
        }

        let top = self.readers.list_published(0, HOT_LIST_SIZE).await?;
        if !top.is_empty() {
            self.primer.submit(CacheTask::RefreshHotList);
        }
        Ok(page(top, offset, limit))
    }

    /// Published articles of one author. Not cached.
    pub async fn list_by_author(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, ArticleError> {
        Ok(self
            .readers
            .list_published_by_author(author_id, offset, limit)
            .await?)
    }

    /// A published article, from the cache when possible.
    pub async fn find_published(&self, id: i64) -> Result<Article, ArticleError> {
        match self.cache.get_article(id).await {
            Ok(Some(article)) => return Ok(article),
            Ok(None) => {}
            Err(e) => tracing::warn!(article_id = id, error = %e, "article cache read failed"),
        }

        let article = self
            .readers
            .find_published(id)
            .await?
            .ok_or(ArticleError::NotFound)?;

        self.primer.submit(CacheTask::RefreshArticle(id));
        Ok(article)
    }

    /// Drop an article from both read caches, now and again behind any
    /// queued writes that could bring it back.
    async fn evict(&self, id: i64) {
        if let Err(e) = self.cache.delete_article(id).await {
            tracing::warn!(article_id = id, error = %e, "failed to evict article from cache");
        }
        if let Err(e) = self.cache.delete_hot_list().await {
            tracing::warn!(article_id = id, error = %e, "failed to evict hot list from cache");
        }

        self.primer.submit(CacheTask::DeleteArticle(id));
        self.primer.submit(CacheTask::DeleteHotList);
    }
}

fn page(articles: Vec<Article>, offset: i64, limit: i64) -> Vec<Article> {
    let skip = usize::try_from(offset).unwrap_or(0);
    let take = usize::try_from(limit).unwrap_or(0);
    articles.into_iter().skip(skip).take(take).collect()
}
