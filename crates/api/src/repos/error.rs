use thiserror::Error;

/// Failures of article store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Zero rows matched: the article doesn't exist or belongs to someone else.
    #[error("article not found or not owned by this author")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
