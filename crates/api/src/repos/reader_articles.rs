//! Reader store: the denormalized copy of published articles.

use async_trait::async_trait;
use sqlx::{PgExecutor, Pool, Postgres};

use super::error::StoreError;
use crate::models::{Article, ArticleStatus, ReaderArticle};

/// Repository for reader-side article queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReaderArticleRepo: Send + Sync {
    /// Find a published article by id.
    async fn find_published(&self, id: i64) -> Result<Option<Article>, StoreError>;

    /// Published articles, most recently updated first.
    async fn list_published(&self, offset: i64, limit: i64) -> Result<Vec<Article>, StoreError>;

    /// Published articles of one author, most recently updated first.
    async fn list_published_by_author(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError>;
}

/// PostgreSQL implementation of ReaderArticleRepo.
#[derive(Clone)]
pub struct PgReaderArticleRepo {
    pool: Pool<Postgres>,
}

impl PgReaderArticleRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReaderArticleRepo for PgReaderArticleRepo {
    async fn find_published(&self, id: i64) -> Result<Option<Article>, StoreError> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author_id, status, created_at, updated_at
            FROM article_reader
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(ArticleStatus::Published)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    async fn list_published(&self, offset: i64, limit: i64) -> Result<Vec<Article>, StoreError> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author_id, status, created_at, updated_at
            FROM article_reader
            WHERE status = $1
            ORDER BY updated_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(ArticleStatus::Published)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    async fn list_published_by_author(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, title, content, author_id, status, created_at, updated_at
            FROM article_reader
            WHERE author_id = $1 AND status = $2
            ORDER BY updated_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(author_id)
        .bind(ArticleStatus::Published)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }
}

/// Insert or update the reader row for `id`. created_at is kept on update.
pub(super) async fn upsert<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    article: &ReaderArticle,
    now: i64,
) -> Result<Article, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        r#"
        INSERT INTO article_reader (id, title, content, author_id, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (id) DO UPDATE
        SET title = EXCLUDED.title,
            content = EXCLUDED.content,
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at
        RETURNING id, title, content, author_id, status, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(&article.title)
    .bind(&article.content)
    .bind(article.author_id)
    .bind(article.status)
    .bind(now)
    .fetch_one(executor)
    .await
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
        "UPDATE article_reader SET status = $3, updated_at = $4 WHERE id = $1 AND author_id = $2",
    )
    .bind(id)
    .bind(author_id)
    .bind(status)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
