//! Author store: the authoritative article rows.
//!
//! Every mutation is addressed by (id, author_id). A write that matches no
//! row is rejected, which also stops one author from touching another's
//! article without taking any lock.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgExecutor, Pool, Postgres};

use super::error::StoreError;
use crate::models::{Article, ArticleStatus, AuthorArticle};

const COLUMNS: &str = "id, title, content, author_id, status, created_at, updated_at";

/// Repository for author-side article operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorArticleRepo: Send + Sync {
    /// Create a new article and return its id.
    async fn create(&self, article: &AuthorArticle) -> Result<i64, StoreError>;

    /// Update title, content and status of an existing article.
    async fn update(&self, article: &AuthorArticle) -> Result<(), StoreError>;

    /// Find an article owned by `author_id`.
    async fn find(&self, id: i64, author_id: i64) -> Result<Option<Article>, StoreError>;
}

/// PostgreSQL implementation of AuthorArticleRepo.
#[derive(Clone)]
pub struct PgAuthorArticleRepo {
    pool: Pool<Postgres>,
}

impl PgAuthorArticleRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorArticleRepo for PgAuthorArticleRepo {
    async fn create(&self, article: &AuthorArticle) -> Result<i64, StoreError> {
        let id = insert(&self.pool, article, Utc::now().timestamp_millis()).await?;
        Ok(id)
    }

    async fn update(&self, article: &AuthorArticle) -> Result<(), StoreError> {
        let id = article.id.ok_or(StoreError::NotFound)?;
        let rows = update(&self.pool, id, article, Utc::now().timestamp_millis()).await?;
        if rows == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find(&self, id: i64, author_id: i64) -> Result<Option<Article>, StoreError> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {COLUMNS} FROM article_author WHERE id = $1 AND author_id = $2"
        ))
        .bind(id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }
}

pub(super) async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    article: &AuthorArticle,
    now: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO article_author (title, content, author_id, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING id
        "#,
    )
    .bind(&article.title)
    .bind(&article.content)
    .bind(article.author_id)
    .bind(article.status)
    .bind(now)
    .fetch_one(executor)
    .await
}

/// Returns the number of rows matched. author_id and created_at never change.
pub(super) async fn update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    article: &AuthorArticle,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE article_author
        SET title = $3, content = $4, status = $5, updated_at = $6
        WHERE id = $1 AND author_id = $2
        "#,
    )
    .bind(id)
    .bind(article.author_id)
    .bind(&article.title)
    .bind(&article.content)
    .bind(article.status)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Returns the number of rows matched, including rows already in `status`.
pub(super) async fn update_status<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    author_id: i64,
    status: ArticleStatus,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE article_author SET status = $3, updated_at = $4 WHERE id = $1 AND author_id = $2",
    )
    .bind(id)
    .bind(author_id)
    .bind(status)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
