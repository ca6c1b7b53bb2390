//! Best-effort cache writes, applied off the request path.
//!
//! Tasks go through a bounded queue drained by a single worker, so tasks for
//! one key are applied in submission order. When the queue is full new tasks
//! are dropped and logged: the cache only speeds reads up, and callers must
//! never wait on it.
//!
//! Refresh tasks carry no data. The worker reads the reader store when it
//! gets to them, so a refresh queued before a withdraw can't put the
//! withdrawn article back: either it runs first and the withdraw's delete
//! follows it, or it runs after the withdraw committed and finds nothing.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::repos::ReaderArticleRepo;
use crate::stores::{ArticleCache, HOT_LIST_SIZE};

/// A cache mutation to apply in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTask {
    /// Cache the article if it is published, evict it otherwise.
    RefreshArticle(i64),
    DeleteArticle(i64),
    /// Rebuild the hot list from the reader store.
    RefreshHotList,
    DeleteHotList,
}

impl CacheTask {
    fn name(&self) -> &'static str {
        match self {
            CacheTask::RefreshArticle(_) => "refresh_article",
            CacheTask::DeleteArticle(_) => "delete_article",
            CacheTask::RefreshHotList => "refresh_hot_list",
            CacheTask::DeleteHotList => "delete_hot_list",
        }
    }
}

enum Message {
    Task(CacheTask),
    Flush(oneshot::Sender<()>),
}

/// Handle for submitting cache tasks. Cheap to clone.
#[derive(Clone)]
pub struct CachePrimer {
    sender: mpsc::Sender<Message>,
}

impl CachePrimer {
    /// Start the worker. It exits once every handle has been dropped.
    pub fn spawn(
        cache: ArticleCache,
        readers: Arc<dyn ReaderArticleRepo>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run(Worker { cache, readers }, receiver));
        (Self { sender }, worker)
    }

    /// Queue `task` without waiting. Returns false if it was dropped.
    pub fn submit(&self, task: CacheTask) -> bool {
        match self.sender.try_send(Message::Task(task)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(task = task.name(), "cache queue full, dropping task");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(task = task.name(), "cache worker stopped, dropping task");
                false
            }
        }
    }

    /// Wait until every task submitted before this call has been applied.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Message::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

struct Worker {
    cache: ArticleCache,
    readers: Arc<dyn ReaderArticleRepo>,
}

impl Worker {
    async fn apply(&self, task: CacheTask) -> anyhow::Result<()> {
        match task {
            CacheTask::RefreshArticle(id) => match self.readers.find_published(id).await? {
                Some(article) => self.cache.set_article(&article).await,
                None => self.cache.delete_article(id).await,
            },
            CacheTask::DeleteArticle(id) => self.cache.delete_article(id).await,
            CacheTask::RefreshHotList => {
                let top = self.readers.list_published(0, HOT_LIST_SIZE).await?;
                if top.is_empty() {
                    self.cache.delete_hot_list().await
                } else {
                    self.cache.set_hot_list(&top).await
                }
            }
            CacheTask::DeleteHotList => self.cache.delete_hot_list().await,
        }
    }
}

async fn run(worker: Worker, mut receiver: mpsc::Receiver<Message>) {
    while let Some(message) = receiver.recv().await {
        match message {
            Message::Task(task) => {
                if let Err(e) = worker.apply(task).await {
                    tracing::warn!(task = task.name(), error = %e, "cache write failed");
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
