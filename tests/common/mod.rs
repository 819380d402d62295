#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, middleware, routing::get};
use shortkeep::api;
use shortkeep::api::handlers::{health_handler, redirect_handler};
use shortkeep::api::middleware::identity;
use shortkeep::domain::entities::UrlRecord;
use shortkeep::domain::expiration_listener::ListenerState;
use shortkeep::infrastructure::cache::{
    CacheError, CacheResult, CacheService, ExpirationStream, KeyTtl, MemoryCache,
};
use shortkeep::infrastructure::persistence::MemoryUrlRepository;
use shortkeep::state::AppState;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;

pub const BASE_URL: &str = "https://s.example.com";

/// [`MemoryCache`] with switchable faults, standing in for a flaky Redis.
#[derive(Default)]
pub struct FlakyCache {
    inner: MemoryCache,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyCache {
    pub fn inner(&self) -> &MemoryCache {
        &self.inner
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> CacheResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(CacheError::OperationError("injected fault".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheService for FlakyCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Self::check(&self.fail_reads)?;
        self.inner.get(key).await
    }

    async fn set_entries(&self, entries: &[(String, String)], ttl: Duration) -> CacheResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.set_entries(entries, ttl).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Self::check(&self.fail_reads)?;
        self.inner.exists(key).await
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete(keys).await
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        Self::check(&self.fail_reads)?;
        self.inner.ttl(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        Self::check(&self.fail_writes)?;
        self.inner.expire(key, ttl).await
    }

    async fn enable_expiration_notifications(&self) -> CacheResult<()> {
        self.inner.enable_expiration_notifications().await
    }

    async fn subscribe_expirations(&self) -> CacheResult<ExpirationStream> {
        self.inner.subscribe_expirations().await
    }

    async fn health_check(&self) -> bool {
        !self.fail_reads.load(Ordering::SeqCst)
    }
}

/// In-memory stores wired into a full [`AppState`].
pub struct TestContext {
    pub state: AppState,
    pub repository: Arc<MemoryUrlRepository>,
    pub cache: Arc<FlakyCache>,
}

pub fn test_context() -> TestContext {
    test_context_with_listener(ListenerState::Listening)
}

pub fn test_context_with_listener(listener: ListenerState) -> TestContext {
    let repository = Arc::new(MemoryUrlRepository::new());
    let cache = Arc::new(FlakyCache::default());
    let (_tx, listener_state) = watch::channel(listener);

    let state = AppState::new(
        repository.clone(),
        cache.clone(),
        BASE_URL,
        listener_state,
    );

    TestContext {
        state,
        repository,
        cache,
    }
}

/// Router with every route, without path normalization.
pub fn test_router(state: AppState) -> Router {
    Router::new()
        .route("/{code}", get(redirect_handler))
        .route("/health", get(health_handler))
        .nest(
            "/api",
            api::routes::protected_routes().route_layer(middleware::from_fn(identity::layer)),
        )
        .with_state(state)
}

pub async fn create_link(ctx: &TestContext, user_id: i64, url: &str, ttl_hours: i64) -> UrlRecord {
    ctx.state
        .shorten_service
        .create(user_id, url.to_string(), None, ttl_hours)
        .await
        .unwrap()
}

/// Polls `condition` until it holds, sleeping between attempts.
///
/// Works with a paused clock: each sleep auto-advances time and lets
/// spawned tasks run.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
