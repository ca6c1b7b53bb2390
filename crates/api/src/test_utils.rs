//! Shared test utilities.
//!
//! Provides in-memory fakes for the cache, the article and interaction
//! stores and the SMS gateway, plus a `TestStateBuilder` for constructing `AppState` instances
//! with only the doubles each test cares about.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, mock_user};
//!
//! let mut user_repo = MockUserRepo::new();
//! user_repo.expect_find_by_id().returning(|_| Ok(Some(mock_user(42, "+15550100"))));
//!
//! let state = TestStateBuilder::new()
//!     .with_user_repo(user_repo)
//!     .build();
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow, bail};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::Utc;

use crate::config::Config;
use crate::models::{Article, ArticleStats, ArticleStatus, AuthorArticle, ReaderArticle, User};
use crate::repos::{
    ArticleSyncRepo, AuthorArticleRepo, InteractiveRepo, MockUserRepo, ReaderArticleRepo, Repos,
    StoreError,
};
use crate::services::{
    AccountService, ArticleService, ArticleSynchronizer, CachePrimer, CodeService,
    HmacTokenService, InteractiveService, MessageArg, SmsError, SmsSender,
};
use crate::state::AppState;
use crate::stores::{
    ArticleCache, Cache, CacheScript, CacheVerificationStore, InteractiveCache, RateLimiter,
    SlidingWindowLimiter, Stores,
};

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        database_url: "postgres://test".to_string(),
        redis_url: "redis://test".to_string(),
        env: "test".to_string(),
        sentry_dsn: None,
        token_secret: "test-secret".to_string(),
        token_ttl_secs: 3600,
        http_rate_limit: 100,
        sms_rate_limit: 3000,
        rate_limit_window_ms: 1000,
        article_cache_ttl_secs: 600,
        hot_list_ttl_secs: 600,
        interactive_cache_ttl_secs: 600,
        cache_queue_capacity: 64,
        code_ttl_secs: 1800,
        code_cooldown_secs: 60,
        code_max_attempts: 3,
        code_min_ttl_secs: 120,
        code_max_ttl_secs: 3600,
        sms_gateways: Vec::new(),
        sms_api_key: None,
        sms_timeout_ms: 3000,
        sms_failover_threshold: 3,
        publish_attempts: 3,
        request_timeout_secs: 10,
    }
}

/// Creates a mock user with the given id and phone number.
pub fn mock_user(id: i64, phone_number: &str) -> User {
    User {
        id,
        phone_number: Some(phone_number.to_string()),
        email: None,
        nickname: String::new(),
        password_hash: None,
        created_at: Utc::now().timestamp_millis(),
    }
}

/// Creates a published article.
pub fn mock_article(id: i64, author_id: i64) -> Article {
    Article {
        id,
        title: format!("Article {}", id),
        content: "Lorem ipsum dolor sit amet".to_string(),
        author_id,
        status: ArticleStatus::Published,
        created_at: 1_700_000_000_000,
        updated_at: 1_700_000_000_000 + id,
    }
}

/// Argon2id at minimum cost so password tests stay fast.
pub fn fast_hasher() -> Argon2<'static> {
    Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(8, 1, 1, None).unwrap(),
    )
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

enum Value {
    Bytes(Vec<u8>),
    /// Sorted set of (score, member).
    Window(Vec<(i64, String)>),
    Code {
        code: String,
        attempts: u32,
        lifetime: i64,
    },
    Hash(HashMap<String, String>),
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process cache. Scripts are emulated by name and run under one lock,
/// which makes them as atomic as they are on the server.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the connection dropped.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        Ok(())
    }

    fn live_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        entries
    }

    fn slide_window(&self, key: &str, args: &[String]) -> Result<i64> {
        let window: i64 = args[0].parse()?;
        let threshold: usize = args[1].parse()?;
        let now: i64 = args[2].parse()?;
        let member = args[3].clone();

        let mut entries = self.live_entries();
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Window(Vec::new()),
            expires_at: Instant::now(),
        });
        let Value::Window(members) = &mut entry.value else {
            bail!("WRONGTYPE");
        };
        members.retain(|(score, _)| *score > now - window);
        members.push((now, member));
        let count = members.len();
        entry.expires_at = Instant::now() + Duration::from_millis(window as u64);

        Ok(if count > threshold { 1 } else { 0 })
    }

    fn set_code(&self, key: &str, args: &[String]) -> Result<i64> {
        let code = args[0].clone();
        let lifetime: i64 = args[1].parse()?;
        let cooldown: i64 = args[2].parse()?;
        let min: i64 = args[3].parse()?;
        let max: i64 = args[4].parse()?;

        if lifetime < min || lifetime > max || lifetime <= cooldown {
            return Ok(-2);
        }

        let mut entries = self.live_entries();
        if let Some(entry) = entries.get(key) {
            let Value::Code { lifetime: issued, .. } = &entry.value else {
                bail!("WRONGTYPE");
            };
            let remaining = entry.expires_at.saturating_duration_since(Instant::now());
            if issued * 1000 - (remaining.as_millis() as i64) < cooldown * 1000 {
                return Ok(-1);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Code {
                    code,
                    attempts: 0,
                    lifetime,
                },
                expires_at: Instant::now() + Duration::from_secs(lifetime as u64),
            },
        );
        Ok(0)
    }

    fn check_code(&self, key: &str, args: &[String]) -> Result<i64> {
        let input = &args[0];
        let max_attempts: u32 = args[1].parse()?;

        let mut entries = self.live_entries();
        let Some(entry) = entries.get_mut(key) else {
            return Ok(-3);
        };
        let Value::Code { code, attempts, .. } = &mut entry.value else {
            bail!("WRONGTYPE");
        };

        if *attempts >= max_attempts {
            entries.remove(key);
            return Ok(-1);
        }
        if code == input {
            entries.remove(key);
            return Ok(0);
        }
        *attempts += 1;
        Ok(-2)
    }

    fn incr_cnt(&self, key: &str, args: &[String]) -> Result<i64> {
        let field = args[0].clone();
        let delta: i64 = args[1].parse()?;

        let mut entries = self.live_entries();
        let Some(entry) = entries.get_mut(key) else {
            return Ok(0);
        };
        let Value::Hash(fields) = &mut entry.value else {
            bail!("WRONGTYPE");
        };
        let current: i64 = fields.get(&field).map_or(Ok(0), |v| v.parse())?;
        fields.insert(field, (current + delta).to_string());
        Ok(1)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn health_check(&self) -> Result<bool> {
        self.check_available()?;
        Ok(true)
    }

    async fn eval(&self, script: &CacheScript, keys: &[String], args: &[String]) -> Result<i64> {
        self.check_available()?;
        let key = keys.first().ok_or_else(|| anyhow!("script needs a key"))?;
        match script.name() {
            "slide_window" => self.slide_window(key, args),
            "set_code" => self.set_code(key, args),
            "check_code" => self.check_code(key, args),
            "incr_cnt" => self.incr_cnt(key, args),
            other => bail!("unknown script {}", other),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        match self.live_entries().get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => bail!("WRONGTYPE"),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.check_available()?;
        self.live_entries().insert(
            key.to_string(),
            Entry {
                value: Value::Bytes(value.to_vec()),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.live_entries().remove(key).is_some())
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>> {
        self.check_available()?;
        match self.live_entries().get(key) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields.clone()),
            Some(_) => bail!("WRONGTYPE"),
        }
    }

    async fn set_hash(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        self.check_available()?;
        let mut entries = self.live_entries();
        if fields.is_empty() {
            entries.remove(key);
            return Ok(());
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Hash(fields.iter().cloned().collect()),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Article stores
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    next_id: i64,
    last_millis: i64,
    authors: BTreeMap<i64, Article>,
    readers: BTreeMap<i64, Article>,
}

impl Tables {
    /// Strictly increasing clock so "most recently updated" is deterministic.
    fn tick(&mut self) -> i64 {
        self.last_millis = Utc::now().timestamp_millis().max(self.last_millis + 1);
        self.last_millis
    }

    fn insert_author(&mut self, article: &AuthorArticle, now: i64) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        self.authors.insert(id, row(id, article, now));
        id
    }

    fn update_author(&mut self, id: i64, article: &AuthorArticle, now: i64) -> bool {
        match self.authors.get_mut(&id) {
            Some(existing) if existing.author_id == article.author_id => {
                existing.title = article.title.clone();
                existing.content = article.content.clone();
                existing.status = article.status;
                existing.updated_at = now;
                true
            }
            _ => false,
        }
    }
}

fn row(id: i64, article: &AuthorArticle, now: i64) -> Article {
    Article {
        id,
        title: article.title.clone(),
        content: article.content.clone(),
        author_id: article.author_id,
        status: article.status,
        created_at: now,
        updated_at: now,
    }
}

/// Author and reader tables in memory, with the same matched-row semantics
/// as the Postgres repositories. Every call is one critical section, so
/// multi-table writes are atomic.
#[derive(Default)]
pub struct MemoryArticleStore {
    tables: Mutex<Tables>,
    failing_syncs: AtomicU32,
    list_calls: AtomicUsize,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sync calls with a pool timeout, writing nothing.
    pub fn fail_next_syncs(&self, n: u32) {
        self.failing_syncs.store(n, Ordering::SeqCst);
    }

    /// Insert a published article into both tables, as a committed publish would.
    pub fn publish(&self, author_id: i64, title: &str) -> Article {
        let mut tables = self.tables.lock().unwrap();
        let now = tables.tick();
        let author = AuthorArticle {
            id: None,
            title: title.to_string(),
            content: "body".to_string(),
            author_id,
            status: ArticleStatus::Published,
        };
        let id = tables.insert_author(&author, now);
        let article = row(id, &author, now);
        tables.readers.insert(id, article.clone());
        article
    }

    pub fn reader_row(&self, id: i64) -> Option<Article> {
        self.tables.lock().unwrap().readers.get(&id).cloned()
    }

    /// Number of reader list queries served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failing_syncs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn published(&self, author_id: Option<i64>, offset: i64, limit: i64) -> Vec<Article> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Article> = tables
            .readers
            .values()
            .filter(|a| a.status == ArticleStatus::Published)
            .filter(|a| author_id.is_none_or(|author| a.author_id == author))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect()
    }
}

#[async_trait]
impl AuthorArticleRepo for MemoryArticleStore {
    async fn create(&self, article: &AuthorArticle) -> Result<i64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let now = tables.tick();
        Ok(tables.insert_author(article, now))
    }

    async fn update(&self, article: &AuthorArticle) -> Result<(), StoreError> {
        let id = article.id.ok_or(StoreError::NotFound)?;
        let mut tables = self.tables.lock().unwrap();
        let now = tables.tick();
        if !tables.update_author(id, article, now) {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find(&self, id: i64, author_id: i64) -> Result<Option<Article>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .authors
            .get(&id)
            .filter(|a| a.author_id == author_id)
            .cloned())
    }
}

#[async_trait]
impl ReaderArticleRepo for MemoryArticleStore {
    async fn find_published(&self, id: i64) -> Result<Option<Article>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .readers
            .get(&id)
            .filter(|a| a.status == ArticleStatus::Published)
            .cloned())
    }

    async fn list_published(&self, offset: i64, limit: i64) -> Result<Vec<Article>, StoreError> {
        Ok(self.published(None, offset, limit))
    }

    async fn list_published_by_author(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError> {
        Ok(self.published(Some(author_id), offset, limit))
    }
}

#[async_trait]
impl ArticleSyncRepo for MemoryArticleStore {
    async fn sync(
        &self,
        author: &AuthorArticle,
        reader: &ReaderArticle,
    ) -> Result<Article, StoreError> {
        if self.take_failure() {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut tables = self.tables.lock().unwrap();
        let now = tables.tick();
        let id = match author.id {
            Some(id) => {
                if !tables.update_author(id, author, now) {
                    return Err(StoreError::NotFound);
                }
                id
            }
            None => tables.insert_author(author, now),
        };

        let created_at = tables.readers.get(&id).map_or(now, |a| a.created_at);
        let article = Article {
            id,
            title: reader.title.clone(),
            content: reader.content.clone(),
            author_id: reader.author_id,
            status: reader.status,
            created_at,
            updated_at: now,
        };
        tables.readers.insert(id, article.clone());
        Ok(article)
    }

    async fn sync_status(
        &self,
        id: i64,
        author_id: i64,
        status: ArticleStatus,
    ) -> Result<(), StoreError> {
        let mut guard = self.tables.lock().unwrap();
        let tables = &mut *guard;
        let now = tables.tick();
        let owned = |rows: &BTreeMap<i64, Article>| {
            rows.get(&id).is_some_and(|a| a.author_id == author_id)
        };
        if !owned(&tables.authors) || !owned(&tables.readers) {
            return Err(StoreError::NotFound);
        }
        for rows in [&mut tables.authors, &mut tables.readers] {
            if let Some(article) = rows.get_mut(&id) {
                article.status = status;
                article.updated_at = now;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Interaction counters
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Interactions {
    stats: HashMap<i64, ArticleStats>,
    liked: HashMap<(i64, i64), bool>,
}

/// Counters and like flags in memory. Each call is one critical section,
/// matching the single transaction of the Postgres repository.
#[derive(Default)]
pub struct MemoryInteractiveStore {
    inner: Mutex<Interactions>,
}

impl MemoryInteractiveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InteractiveRepo for MemoryInteractiveStore {
    async fn incr_read(&self, article_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .stats
            .entry(article_id)
            .or_insert_with(|| ArticleStats::empty(article_id))
            .read_cnt += 1;
        Ok(())
    }

    async fn like(&self, user_id: i64, article_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let liked = inner.liked.entry((user_id, article_id)).or_insert(false);
        if *liked {
            return Ok(false);
        }
        *liked = true;
        inner
            .stats
            .entry(article_id)
            .or_insert_with(|| ArticleStats::empty(article_id))
            .like_cnt += 1;
        Ok(true)
    }

    async fn unlike(&self, user_id: i64, article_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.liked.get_mut(&(user_id, article_id)) {
            Some(liked) if *liked => *liked = false,
            _ => return Ok(false),
        }
        if let Some(stats) = inner.stats.get_mut(&article_id) {
            stats.like_cnt = (stats.like_cnt - 1).max(0);
        }
        Ok(true)
    }

    async fn stats(&self, article_id: i64) -> Result<ArticleStats, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .stats
            .get(&article_id)
            .copied()
            .unwrap_or_else(|| ArticleStats::empty(article_id)))
    }
}

// ---------------------------------------------------------------------------
// SMS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SentSms {
    pub recipient: String,
    pub template_id: String,
    pub args: Vec<MessageArg>,
}

impl SentSms {
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| arg.value.as_str())
    }
}

/// Gateway double that accepts everything and remembers it.
#[derive(Default)]
pub struct RecordingSmsSender {
    sent: Mutex<Vec<SentSms>>,
}

impl RecordingSmsSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSender for RecordingSmsSender {
    async fn send(
        &self,
        recipient: &str,
        template_id: &str,
        args: &[MessageArg],
    ) -> Result<(), SmsError> {
        self.sent.lock().unwrap().push(SentSms {
            recipient: recipient.to_string(),
            template_id: template_id.to_string(),
            args: args.to_vec(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Builder for constructing test `AppState`.
///
/// Anything not set explicitly gets a working in-memory default, so tests
/// only configure the doubles they assert on.
pub struct TestStateBuilder {
    config: Config,
    user_repo: Option<MockUserRepo>,
    article_store: Option<Arc<MemoryArticleStore>>,
    cache: Option<Arc<MemoryCache>>,
    http_limiter: Option<Arc<dyn RateLimiter>>,
    sms: Option<Arc<dyn SmsSender>>,
}

impl TestStateBuilder {
    /// Creates a new builder with defaults for everything.
    pub fn new() -> Self {
        Self {
            config: test_config(),
            user_repo: None,
            article_store: None,
            cache: None,
            http_limiter: None,
            sms: None,
        }
    }

    pub fn with_user_repo(mut self, repo: MockUserRepo) -> Self {
        self.user_repo = Some(repo);
        self
    }

    pub fn with_article_store(mut self, store: Arc<MemoryArticleStore>) -> Self {
        self.article_store = Some(store);
        self
    }

    pub fn with_cache(mut self, cache: Arc<MemoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_http_limiter(mut self, limiter: impl RateLimiter + 'static) -> Self {
        self.http_limiter = Some(Arc::new(limiter));
        self
    }

    pub fn with_sms_sender(mut self, sender: Arc<dyn SmsSender>) -> Self {
        self.sms = Some(sender);
        self
    }

    /// Builds the `AppState`. Spawns the cache worker, so call it inside a
    /// tokio runtime.
    pub fn build(self) -> AppState {
        let config = self.config;
        let cache = self.cache.unwrap_or_default();
        let store = self.article_store.unwrap_or_default();

        let repos = Repos {
            users: Arc::new(self.user_repo.unwrap_or_else(MockUserRepo::new)),
            author_articles: store.clone(),
            reader_articles: store.clone(),
            article_sync: store,
            interactive: Arc::new(MemoryInteractiveStore::new()),
        };

        let http_limiter = self.http_limiter.unwrap_or_else(|| {
            Arc::new(SlidingWindowLimiter::per_second(
                cache.clone(),
                config.http_rate_limit,
            ))
        });
        let stores = Stores {
            cache: cache.clone(),
            http_limiter,
        };

        let article_cache = ArticleCache::new(
            cache.clone(),
            config.article_cache_ttl(),
            config.hot_list_ttl(),
        );
        let (primer, _worker) = CachePrimer::spawn(
            article_cache.clone(),
            repos.reader_articles.clone(),
            config.cache_queue_capacity,
        );
        let synchronizer = ArticleSynchronizer::new(
            repos.article_sync.clone(),
            repos.reader_articles.clone(),
            article_cache,
            primer,
        );
        let interactive = InteractiveService::new(
            repos.interactive.clone(),
            InteractiveCache::new(cache.clone(), config.interactive_cache_ttl()),
        );
        let articles = ArticleService::new(
            repos.author_articles.clone(),
            synchronizer,
            interactive,
            config.publish_attempts,
        );
        let accounts = AccountService::new(repos.users.clone(), fast_hasher());

        let verification = CacheVerificationStore::new(cache, config.code_policy());
        let sms = self
            .sms
            .unwrap_or_else(|| Arc::new(RecordingSmsSender::new()));
        let codes = CodeService::new(Arc::new(verification), sms, config.code_ttl());

        let tokens = HmacTokenService::new(config.token_secret.clone(), config.token_ttl());

        AppState {
            repos,
            stores,
            articles: Arc::new(articles),
            accounts: Arc::new(accounts),
            codes: Arc::new(codes),
            tokens: Arc::new(tokens),
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
