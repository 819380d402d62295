//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache setup, the expiration listener, and
//! the Axum server lifecycle.

use crate::config::Config;
use crate::domain::expiration_listener::{ExpirationListener, ListenerState};
use crate::domain::repositories::UrlRepository;
use crate::infrastructure::cache::{CacheService, MemoryCache, RedisCache};
use crate::infrastructure::persistence::PgUrlRepository;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const MEMORY_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Redis cache (in-process fallback only when no Redis is configured)
/// - Expiration listener
/// - Axum HTTP server with graceful shutdown on Ctrl-C
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - A configured Redis cannot be reached
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let cache = build_cache(config.redis_url.as_deref(), &config.cache_key_prefix).await?;
    let repository: Arc<dyn UrlRepository> = Arc::new(PgUrlRepository::new(Arc::new(pool)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (listener_state, listener_handle) = if config.expiration_listener_enabled {
        let listener = ExpirationListener::new(repository.clone(), cache.clone());
        let state = listener.state();
        (state, Some(listener.spawn(shutdown_rx)))
    } else {
        tracing::warn!("Expiration listener disabled, expired links stay active in the database");
        let (_, state) = watch::channel(ListenerState::Stopped);
        (state, None)
    };

    let state = AppState::new(repository, cache, config.base_url.clone(), listener_state);
    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    if let Some(handle) = listener_handle
        && let Err(e) = handle.await
    {
        tracing::error!(error = %e, "Expiration listener task failed");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Connects the configured Redis, or falls back to an in-process cache when
/// none is configured.
///
/// # Errors
///
/// Fails when `redis_url` is set but Redis cannot be reached.
async fn build_cache(redis_url: Option<&str>, key_prefix: &str) -> Result<Arc<dyn CacheService>> {
    let Some(redis_url) = redis_url else {
        tracing::warn!("Redis not configured. Using in-process cache, links will not survive a restart.");
        let memory = Arc::new(MemoryCache::new());
        memory.spawn_sweeper(MEMORY_SWEEP_PERIOD);
        return Ok(memory);
    };

    let redis = RedisCache::connect(redis_url, key_prefix)
        .await
        .context("Failed to connect to Redis")?;
    tracing::info!("Cache enabled (Redis)");
    Ok(Arc::new(redis))
}

/// Resolves on Ctrl-C and tells background tasks to stop.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }

    tracing::info!("Shutdown signal received");
    shutdown_tx.send_replace(true);
}
