mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod repos;
mod services;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use argon2::Argon2;
use axum::{Router, http, middleware::from_fn_with_state};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    repos::{
        PgArticleSyncRepo, PgAuthorArticleRepo, PgInteractiveRepo, PgReaderArticleRepo,
        PgUserRepo, Repos,
    },
    services::{
        AccountService, ArticleService, ArticleSynchronizer, CachePrimer, CodeService,
        FailoverSender, HmacTokenService, HttpSmsSender, InteractiveService, LogSmsSender,
        RateLimitedSender, SmsSender,
    },
    state::AppState,
    stores::{
        ArticleCache, Cache, CacheVerificationStore, InteractiveCache, RedisCache,
        SlidingWindowLimiter, Stores,
    },
};

#[derive(Parser)]
#[command(name = "api")]
#[command(about = "ibook API server")]
struct Args {
    /// Run database migrations and exit
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = envy::prefixed("IBOOK_").from_env::<Config>()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let database = PgPoolOptions::new()
        .max_connections(25)
        .acquire_timeout(config.request_timeout())
        .connect(&config.database_url)
        .await?;

    // Run migrations via init container only (--migrate flag)
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&database).await?;
        tracing::info!("Migrations complete");
        return Ok(());
    }

    let redis = redis::Client::open(config.redis_url.as_str())?;
    let cache: Arc<dyn Cache> = Arc::new(RedisCache::new(redis));

    // Build repositories
    let repos = Repos {
        users: Arc::new(PgUserRepo::new(database.clone())),
        author_articles: Arc::new(PgAuthorArticleRepo::new(database.clone())),
        reader_articles: Arc::new(PgReaderArticleRepo::new(database.clone())),
        article_sync: Arc::new(PgArticleSyncRepo::new(database.clone())),
        interactive: Arc::new(PgInteractiveRepo::new(database)),
    };

    // Build stores
    let stores = Stores {
        cache: cache.clone(),
        http_limiter: Arc::new(SlidingWindowLimiter::new(
            cache.clone(),
            config.rate_limit_window(),
            config.http_rate_limit,
        )),
    };

    // Articles: author store -> reader store -> cache (via the primer queue)
    let article_cache = ArticleCache::new(
        cache.clone(),
        config.article_cache_ttl(),
        config.hot_list_ttl(),
    );
    let (primer, primer_worker) = CachePrimer::spawn(
        article_cache.clone(),
        repos.reader_articles.clone(),
        config.cache_queue_capacity,
    );
    let synchronizer = ArticleSynchronizer::new(
        repos.article_sync.clone(),
        repos.reader_articles.clone(),
        article_cache,
        primer.clone(),
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
    let accounts = AccountService::new(repos.users.clone(), Argon2::default());

    // SMS: budget check -> failover ring of gateways
    let sms = build_sms_sender(&config, cache.clone())?;
    let verification = CacheVerificationStore::new(cache, config.code_policy());
    let codes = CodeService::new(Arc::new(verification), sms, config.code_ttl());

    let tokens = HmacTokenService::new(config.token_secret.clone(), config.token_ttl());

    let state = AppState {
        repos,
        stores,
        articles: Arc::new(articles),
        accounts: Arc::new(accounts),
        codes: Arc::new(codes),
        tokens: Arc::new(tokens),
    };

    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    let app = Router::new()
        .nest("/health", handlers::health::router())
        .nest("/articles", handlers::articles::router())
        .nest("/users", handlers::users::router())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::limit_by_ip,
        ))
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout()))
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB limit

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Let queued cache writes land before exiting
    if tokio::time::timeout(Duration::from_secs(5), primer.flush())
        .await
        .is_err()
    {
        tracing::warn!("Timed out flushing cache writes");
    }
    drop(primer);
    let _ = primer_worker.await;

    tracing::info!("Shutdown complete");

    Ok(())
}

/// Gateways from config in failover order, or the log sender when none are
/// configured, behind the shared SMS budget.
fn build_sms_sender(config: &Config, cache: Arc<dyn Cache>) -> Result<Arc<dyn SmsSender>> {
    let gateways: Vec<Arc<dyn SmsSender>> = if config.sms_gateways.is_empty() {
        tracing::warn!("No SMS gateways configured, codes will only be logged");
        vec![Arc::new(LogSmsSender)]
    } else {
        config
            .sms_gateways
            .iter()
            .map(|url| {
                HttpSmsSender::new(url, config.sms_api_key.clone(), config.sms_timeout())
                    .map(|sender| Arc::new(sender) as Arc<dyn SmsSender>)
            })
            .collect::<Result<_>>()?
    };

    let failover = FailoverSender::new(
        gateways,
        config.sms_failover_threshold,
        config.sms_timeout(),
    )?;
    let limiter = SlidingWindowLimiter::new(
        cache,
        config.rate_limit_window(),
        config.sms_rate_limit,
    );

    Ok(Arc::new(RateLimitedSender::new(
        Arc::new(limiter),
        Arc::new(failover),
    )))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
