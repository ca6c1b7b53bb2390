//! User repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::models::User;

const USER_COLUMNS: &str = "id, phone_number, email, nickname, password_hash, created_at";

/// Repository for user operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Health check - verify database connectivity.
    async fn health_check(&self) -> Result<bool>;

    /// Find a user by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Find the user owning `phone_number`, creating it on first login.
    async fn find_or_create_by_phone(&self, phone_number: &str) -> Result<User>;

    /// Find a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Create a password account. `None` if the email is already registered.
    async fn create_with_password(
        &self,
        email: &str,
        nickname: &str,
        password_hash: &str,
    ) -> Result<Option<User>>;

    /// Change the nickname. `None` if the user doesn't exist.
    async fn update_nickname(&self, id: i64, nickname: &str) -> Result<Option<User>>;
}

/// PostgreSQL implementation of UserRepo.
#[derive(Clone)]
pub struct PgUserRepo {
    pool: Pool<Postgres>,
}

impl PgUserRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn health_check(&self) -> Result<bool> {
        let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(result == 1)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_or_create_by_phone(&self, phone_number: &str) -> Result<User> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (phone_number, created_at) VALUES ($1, $2)
            ON CONFLICT (phone_number) DO UPDATE SET phone_number = EXCLUDED.phone_number
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(phone_number)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_with_password(
        &self,
        email: &str,
        nickname: &str,
        password_hash: &str,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, nickname, password_hash, created_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(nickname)
        .bind(password_hash)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_nickname(&self, id: i64, nickname: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET nickname = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(nickname)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
