//! Writes that keep the author and reader stores in step.
//!
//! Both projections are written in one transaction. Returning early drops
//! the transaction, which rolls it back.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::error::StoreError;
use super::{author_articles, reader_articles};
use crate::models::{Article, ArticleStatus, AuthorArticle, ReaderArticle};

/// Repository for cross-store article writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleSyncRepo: Send + Sync {
    /// Create or update the author row, then upsert the reader row under the
    /// same id. Returns the committed reader row.
    async fn sync(
        &self,
        author: &AuthorArticle,
        reader: &ReaderArticle,
    ) -> Result<Article, StoreError>;

    /// Set the status of both rows. Repeating the current status succeeds.
    async fn sync_status(
        &self,
        id: i64,
        author_id: i64,
        status: ArticleStatus,
    ) -> Result<(), StoreError>;
}

/// PostgreSQL implementation of ArticleSyncRepo.
#[derive(Clone)]
pub struct PgArticleSyncRepo {
    pool: Pool<Postgres>,
}

impl PgArticleSyncRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleSyncRepo for PgArticleSyncRepo {
    async fn sync(
        &self,
        author: &AuthorArticle,
        reader: &ReaderArticle,
    ) -> Result<Article, StoreError> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let id = match author.id {
            Some(id) => {
                let rows = author_articles::update(&mut *tx, id, author, now).await?;
                if rows == 0 {
                    return Err(StoreError::NotFound);
                }
                id
            }
            None => author_articles::insert(&mut *tx, author, now).await?,
        };

        let article = reader_articles::upsert(&mut *tx, id, reader, now).await?;

        tx.commit().await?;
        Ok(article)
    }

    async fn sync_status(
        &self,
        id: i64,
        author_id: i64,
        status: ArticleStatus,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        if author_articles::update_status(&mut *tx, id, author_id, status, now).await? == 0 {
            return Err(StoreError::NotFound);
        }
        if reader_articles::update_status(&mut *tx, id, author_id, status, now).await? == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
