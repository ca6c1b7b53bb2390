use serde::{Deserialize, Serialize};
use shared::api::{ArticleDetail, ArticleSummary};
use sqlx::FromRow;

/// Visibility of an article. Stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum ArticleStatus {
    Unpublished = 1,
    Published = 2,
    Private = 3,
}

/// A row of either article projection. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub status: ArticleStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Characters kept when shortening content for listings.
const ABSTRACT_CHARS: usize = 128;

impl Article {
    pub fn abstract_text(&self) -> String {
        self.content.chars().take(ABSTRACT_CHARS).collect()
    }

    pub fn to_summary(&self) -> ArticleSummary {
        ArticleSummary {
            id: self.id,
            title: self.title.clone(),
            abstract_text: self.abstract_text(),
            status: self.status as u8,
            author_id: self.author_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn to_detail(&self) -> ArticleDetail {
        ArticleDetail {
            id: self.id,
            title: self.title.clone(),
            content: self.content.clone(),
            status: self.status as u8,
            author_id: self.author_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Authoritative write model. `id: None` means the article doesn't exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorArticle {
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub status: ArticleStatus,
}

/// Denormalized copy served to readers, keyed by the author article's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderArticle {
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub status: ArticleStatus,
}

impl From<&AuthorArticle> for ReaderArticle {
    fn from(article: &AuthorArticle) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            content: article.content.clone(),
            author_id: article.author_id,
            status: article.status,
        }
    }
}

/// Read and like counters of one article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ArticleStats {
    pub article_id: i64,
    pub read_cnt: i64,
    pub like_cnt: i64,
}

impl ArticleStats {
    pub fn empty(article_id: i64) -> Self {
        Self {
            article_id,
            ..Self::default()
        }
    }
}

/// A user signs in by phone (SMS code), by email and password, or both.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub nickname: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub created_at: i64,
}
