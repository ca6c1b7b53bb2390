//! Read and like counters per article, plus who liked what.
//!
//! A like or unlike changes `like_record` and `interactive` in one
//! transaction, so the counter always equals the number of set flags.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgExecutor, Pool, Postgres};

use super::error::StoreError;
use crate::models::ArticleStats;

/// Repository for interaction counters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractiveRepo: Send + Sync {
    /// Count one read of `article_id`.
    async fn incr_read(&self, article_id: i64) -> Result<(), StoreError>;

    /// Record that `user_id` likes `article_id`. Returns false if they
    /// already did, in which case nothing changes.
    async fn like(&self, user_id: i64, article_id: i64) -> Result<bool, StoreError>;

    /// Withdraw a like. Returns false if there was none to withdraw.
    async fn unlike(&self, user_id: i64, article_id: i64) -> Result<bool, StoreError>;

    /// Current counters. Zeros for an article nobody has touched.
    async fn stats(&self, article_id: i64) -> Result<ArticleStats, StoreError>;
}

/// PostgreSQL implementation of InteractiveRepo.
#[derive(Clone)]
pub struct PgInteractiveRepo {
    pool: Pool<Postgres>,
}

impl PgInteractiveRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

async fn bump_like_cnt<'e>(
    executor: impl PgExecutor<'e>,
    article_id: i64,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO interactive (article_id, read_cnt, like_cnt, created_at, updated_at)
        VALUES ($1, 0, 1, $2, $2)
        ON CONFLICT (article_id) DO UPDATE
        SET like_cnt = interactive.like_cnt + 1, updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(article_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl InteractiveRepo for PgInteractiveRepo {
    async fn incr_read(&self, article_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO interactive (article_id, read_cnt, like_cnt, created_at, updated_at)
            VALUES ($1, 1, 0, $2, $2)
            ON CONFLICT (article_id) DO UPDATE
            SET read_cnt = interactive.read_cnt + 1, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(article_id)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn like(&self, user_id: i64, article_id: i64) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        // Zero rows when the flag is already set
        let changed = sqlx::query(
            r#"
            INSERT INTO like_record (user_id, article_id, liked, created_at, updated_at)
            VALUES ($1, $2, TRUE, $3, $3)
            ON CONFLICT (user_id, article_id) DO UPDATE
            SET liked = TRUE, updated_at = EXCLUDED.updated_at
            WHERE NOT like_record.liked
            "#,
        )
        .bind(user_id)
        .bind(article_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if changed == 0 {
            return Ok(false);
        }

        bump_like_cnt(&mut *tx, article_id, now).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn unlike(&self, user_id: i64, article_id: i64) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let changed = sqlx::query(
            r#"
            UPDATE like_record SET liked = FALSE, updated_at = $3
            WHERE user_id = $1 AND article_id = $2 AND liked
            "#,
        )
        .bind(user_id)
        .bind(article_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if changed == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE interactive SET like_cnt = like_cnt - 1, updated_at = $2
            WHERE article_id = $1 AND like_cnt > 0
            "#,
        )
        .bind(article_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn stats(&self, article_id: i64) -> Result<ArticleStats, StoreError> {
        let stats = sqlx::query_as::<_, ArticleStats>(
            "SELECT article_id, read_cnt, like_cnt FROM interactive WHERE article_id = $1",
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stats.unwrap_or_else(|| ArticleStats::empty(article_id)))
    }
}
