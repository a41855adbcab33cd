//! # rusty-social
//!
//! Assembles the adapters selected at compile time and serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use api_adapters::middleware::BasicCredentials;
use api_adapters::{AppState, Metrics};
use auth_adapters::{Argon2PasswordHasher, JwtAuthenticator, JwtConfig, LogInvitationNotifier};
use configs::{CacheBackend, Settings};
use domains::AccountCache;
use secrecy::ExposeSecret;
use services::{AccountService, FeedService, FollowService, PostService};
use storage_adapters::{FixedWindowLimiter, MemoryAccountCache, RateLimitConfig, SqliteStore};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn account_cache(settings: &Settings) -> anyhow::Result<Arc<dyn AccountCache>> {
    match settings.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryAccountCache::new(settings.cache.ttl()))),
        #[cfg(feature = "redis")]
        CacheBackend::Redis => {
            let url = settings
                .cache
                .redis_url
                .as_ref()
                .context("cache.redis_url is not set")?;
            let cache = storage_adapters::RedisAccountCache::connect(
                url.expose_secret(),
                settings.cache.ttl(),
                settings.cache.timeout(),
            )?;
            Ok(Arc::new(cache))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => anyhow::bail!("built without the `redis` feature"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(settings.log.json);

    // 1. Storage
    let store = SqliteStore::connect(
        settings.database.url.expose_secret(),
        settings.database.max_connections,
        settings.database.query_timeout(),
    )
    .await?;
    store.migrate().await?;

    // 2. Cache and admission control
    let cache = account_cache(&settings)?;
    let limiter = Arc::new(FixedWindowLimiter::new(RateLimitConfig {
        requests_per_window: settings.rate_limit.requests_per_window,
        window: settings.rate_limit.window(),
        enabled: settings.rate_limit.enabled,
    }));
    let sweeper = limiter.spawn_eviction();

    // 3. Auth
    let tokens = Arc::new(JwtAuthenticator::new(JwtConfig {
        secret: settings.auth.jwt_secret.expose_secret().to_string(),
        issuer: settings.auth.issuer.clone(),
        ttl: chrono::Duration::seconds(settings.auth.token_ttl_secs as i64),
    }));
    let notifier = Arc::new(LogInvitationNotifier::new(
        settings.server.frontend_url.clone(),
    ));

    // 4. Services
    let roles = Arc::new(store.roles());
    let posts_repo = Arc::new(store.posts());
    let accounts = AccountService::new(
        Arc::new(store.accounts()),
        roles.clone(),
        cache,
        Arc::new(Argon2PasswordHasher::new()),
        notifier,
        chrono::Duration::seconds(settings.auth.invitation_ttl_secs as i64),
    );
    let state = AppState {
        posts: PostService::new(posts_repo.clone(), Arc::new(store.comments()), roles),
        feed: FeedService::new(posts_repo),
        follows: FollowService::new(Arc::new(store.followers()), accounts.clone()),
        accounts,
        tokens,
        limiter,
        metrics: Arc::new(Metrics::new()),
        metrics_auth: settings.basic.pass.as_ref().map(|pass| BasicCredentials {
            user: settings.basic.user.clone(),
            pass: pass.expose_secret().to_string(),
        }),
        trust_forwarded_for: settings.rate_limit.trust_forwarded_for,
        env: settings.server.env.clone(),
    };

    if state.metrics_auth.is_none() {
        info!("basic.pass is not set; /metrics is disabled");
    }

    // 5. Serve
    let address = settings.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, env = %settings.server.env, "rusty-social listening");

    axum::serve(
        listener,
        api_adapters::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();
    store.close().await;
    info!("rusty-social stopped");
    Ok(())
}
