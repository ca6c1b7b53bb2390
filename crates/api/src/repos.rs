//! Database repositories (PostgreSQL).
//!
//! This module contains traits and implementations for database access.
//! Each repository is abstracted behind a trait to enable mocking in tests.
//!
//! ## Repositories
//!
//! - **author_articles** - Authoritative article rows, addressed by (id, author)
//! - **reader_articles** - Denormalized published copies for public reads
//! - **article_sync** - Transactional writes spanning both article tables
//! - **interactive** - Read/like counters and per-user like flags
//! - **users** - Phone users created on first SMS login, and password accounts
//!
//! ## Usage
//!
//! Repositories are handed to services at startup and reached via `state.repos`:
//!
//! ```ignore
//! let article = state.repos.author_articles.find(id, user.id).await?;
//! ```

mod article_sync;
mod author_articles;
mod error;
mod interactive;
mod reader_articles;
mod users;

pub use article_sync::{ArticleSyncRepo, PgArticleSyncRepo};
pub use author_articles::{AuthorArticleRepo, PgAuthorArticleRepo};
pub use error::StoreError;
pub use interactive::{InteractiveRepo, PgInteractiveRepo};
pub use reader_articles::{PgReaderArticleRepo, ReaderArticleRepo};
pub use users::{PgUserRepo, UserRepo};

#[cfg(test)]
pub use article_sync::MockArticleSyncRepo;
#[cfg(test)]
pub use author_articles::MockAuthorArticleRepo;
#[cfg(test)]
pub use interactive::MockInteractiveRepo;
#[cfg(test)]
pub use reader_articles::MockReaderArticleRepo;
#[cfg(test)]
pub use users::MockUserRepo;

use std::sync::Arc;

/// Collection of all database repositories.
#[derive(Clone)]
pub struct Repos {
    pub users: Arc<dyn UserRepo>,
    pub author_articles: Arc<dyn AuthorArticleRepo>,
    pub reader_articles: Arc<dyn ReaderArticleRepo>,
    pub article_sync: Arc<dyn ArticleSyncRepo>,
    pub interactive: Arc<dyn InteractiveRepo>,
}
