//! Email and password accounts: signup, login and profile edits.
//!
//! Passwords are stored as Argon2id PHC strings. Hashing is CPU-bound, so it
//! runs on the blocking pool.

use std::sync::Arc;

use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

use crate::models::User;
use crate::repos::UserRepo;

const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("email already registered")]
    EmailTaken,
    /// Unknown email and wrong password look the same to the caller.
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct AccountService {
    users: Arc<dyn UserRepo>,
    hasher: Argon2<'static>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepo>, hasher: Argon2<'static>) -> Self {
        Self { users, hasher }
    }

    pub async fn signup(
        &self,
        email: &str,
        nickname: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User, AccountError> {
        if password != confirm_password {
            return Err(AccountError::PasswordMismatch);
        }

        let hash = self.hash(password).await?;
        self.users
            .create_with_password(email, nickname, &hash)
            .await?
            .ok_or(AccountError::EmailTaken)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        // Phone-only accounts have no password to check
        let Some(hash) = user.password_hash.clone() else {
            return Err(AccountError::InvalidCredentials);
        };

        if !self.verify(password, hash).await? {
            return Err(AccountError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn edit_profile(&self, user_id: i64, nickname: &str) -> Result<User, AccountError> {
        self.users
            .update_nickname(user_id, nickname)
            .await?
            .ok_or(AccountError::NotFound)
    }

    async fn hash(&self, password: &str) -> anyhow::Result<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let salt_bytes: [u8; SALT_LEN] = rand::random();

        tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let salt = SaltString::encode_b64(&salt_bytes)
                .map_err(|e| anyhow!("failed to encode salt: {}", e))?;
            let hash = hasher
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| anyhow!("failed to hash password: {}", e))?;
            Ok(hash.to_string())
        })
        .await?
    }

    async fn verify(&self, password: &str, hash: String) -> anyhow::Result<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let parsed = PasswordHash::new(&hash)
                .map_err(|e| anyhow!("corrupt password hash: {}", e))?;
            match hasher.verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(anyhow!("failed to verify password: {}", e)),
            }
        })
        .await?
    }
}
