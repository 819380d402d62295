//! Short code resolution for redirects.

use std::sync::Arc;

use serde_json::json;

use crate::error::AppError;
use crate::infrastructure::cache::{CacheService, keys};

/// Resolves short codes from the cache alone.
///
/// The cache entry's TTL is the link's lifetime, so there is no fallback to
/// the durable store: a miss means the link is expired, deleted or unknown.
pub struct RedirectService {
    cache: Arc<dyn CacheService>,
}

impl RedirectService {
    pub fn new(cache: Arc<dyn CacheService>) -> Self {
        Self { cache }
    }

    /// Returns the original URL behind `short_code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] on a cache miss and [`AppError::Cache`]
    /// when the cache cannot be reached.
    pub async fn resolve(&self, short_code: &str) -> Result<String, AppError> {
        self.cache
            .get(&keys::short_key(short_code))
            .await?
            .ok_or_else(|| {
                AppError::not_found("Short link not found", json!({ "code": short_code }))
            })
    }
}
