//! Article use cases: edit, publish, withdraw and detail for authors; listing,
//! reading and liking for readers.

use std::sync::Arc;

use super::article_sync::{ArticleError, ArticleSynchronizer};
use super::interactive::InteractiveService;
use crate::models::{Article, ArticleStats, ArticleStatus, AuthorArticle, ReaderArticle};
use crate::repos::AuthorArticleRepo;

/// Title stored for drafts saved without one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Article content as submitted by its author.
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    /// `None` creates a new article.
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub author_id: i64,
}

impl ArticleDraft {
    fn into_author_article(self, status: ArticleStatus) -> AuthorArticle {
        let title = if self.title.trim().is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            self.title
        };
        AuthorArticle {
            id: self.id,
            title,
            content: self.content,
            author_id: self.author_id,
            status,
        }
    }
}

pub struct ArticleService {
    authors: Arc<dyn AuthorArticleRepo>,
    synchronizer: ArticleSynchronizer,
    interactive: InteractiveService,
    publish_attempts: u32,
}

impl ArticleService {
    pub fn new(
        authors: Arc<dyn AuthorArticleRepo>,
        synchronizer: ArticleSynchronizer,
        interactive: InteractiveService,
        publish_attempts: u32,
    ) -> Self {
        Self {
            authors,
            synchronizer,
            interactive,
            publish_attempts: publish_attempts.max(1),
        }
    }

    /// Save a draft in the author store only.
    pub async fn edit(&self, draft: ArticleDraft) -> Result<i64, ArticleError> {
        let article = draft.into_author_article(ArticleStatus::Unpublished);
        match article.id {
            Some(id) => {
                self.authors.update(&article).await?;
                Ok(id)
            }
            None => Ok(self.authors.create(&article).await?),
        }
    }

    /// Publish to both stores, retrying the whole sync on any failure.
    pub async fn publish(&self, draft: ArticleDraft) -> Result<i64, ArticleError> {
        let author_id = draft.author_id;
        let mut author = draft.into_author_article(ArticleStatus::Published);
        let mut reader = ReaderArticle::from(&author);

        let mut attempt = 1;
        loop {
            match self.synchronizer.sync(&mut author, &mut reader).await {
                Ok(id) => return Ok(id),
                Err(e) if attempt < self.publish_attempts => {
                    tracing::warn!(author_id, attempt, error = %e, "publish failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(author_id, attempt, error = %e, "publish failed");
                    return Err(e);
                }
            }
        }
    }

    /// Make an article private in both stores.
    pub async fn withdraw(&self, id: i64, author_id: i64) -> Result<(), ArticleError> {
        self.synchronizer
            .sync_update_status(id, author_id, ArticleStatus::Private)
            .await
    }

    /// An article as its author sees it, whatever its status.
    pub async fn detail(&self, id: i64, author_id: i64) -> Result<Article, ArticleError> {
        self.authors
            .find(id, author_id)
            .await?
            .ok_or(ArticleError::NotFound)
    }

    /// Published articles, optionally of one author.
    pub async fn list_published(
        &self,
        author_id: Option<i64>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, ArticleError> {
        match author_id {
            Some(author_id) => {
                self.synchronizer
                    .list_by_author(author_id, offset, limit)
                    .await
            }
            None => self.synchronizer.list_all(offset, limit).await,
        }
    }

    /// A published article with its counters. Counts as one read; failing
    /// to count it doesn't fail the read.
    pub async fn published_detail(
        &self,
        id: i64,
    ) -> Result<(Article, ArticleStats), ArticleError> {
        let article = self.synchronizer.find_published(id).await?;
        if let Err(e) = self.interactive.record_read(id).await {
            tracing::warn!(article_id = id, error = %e, "failed to count read");
        }
        let stats = self.interactive.stats(id).await?;
        Ok((article, stats))
    }

    /// Like or unlike a published article. Returns whether anything changed.
    pub async fn like(&self, user_id: i64, id: i64, liked: bool) -> Result<bool, ArticleError> {
        self.synchronizer.find_published(id).await?;
        self.interactive.set_liked(user_id, id, liked).await
    }
}
