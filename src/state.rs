//! Shared application state injected into every handler.

use std::sync::Arc;

use tokio::sync::watch;

use crate::application::services::{LifecycleService, RedirectService, ShortenService};
use crate::domain::expiration_listener::ListenerState;
use crate::domain::repositories::UrlRepository;
use crate::infrastructure::cache::CacheService;

/// Services and store handles shared by all requests.
///
/// Cloning is cheap: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub shorten_service: Arc<ShortenService>,
    pub lifecycle_service: Arc<LifecycleService>,
    pub redirect_service: Arc<RedirectService>,
    pub repository: Arc<dyn UrlRepository>,
    pub cache: Arc<dyn CacheService>,
    /// Last published state of the expiration listener.
    pub listener_state: watch::Receiver<ListenerState>,
}

impl AppState {
    /// Wires the coordinators around one repository and one cache.
    pub fn new(
        repository: Arc<dyn UrlRepository>,
        cache: Arc<dyn CacheService>,
        base_url: impl Into<String>,
        listener_state: watch::Receiver<ListenerState>,
    ) -> Self {
        Self {
            shorten_service: Arc::new(ShortenService::new(
                repository.clone(),
                cache.clone(),
                base_url,
            )),
            lifecycle_service: Arc::new(LifecycleService::new(repository.clone(), cache.clone())),
            redirect_service: Arc::new(RedirectService::new(cache.clone())),
            repository,
            cache,
            listener_state,
        }
    }
}
