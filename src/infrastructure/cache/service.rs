//! Cache service trait and error types.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    ConnectionError(String),
    #[error("Cache operation error: {0}")]
    OperationError(String),
    #[error("Cache notification error: {0}")]
    NotificationError(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            Self::ConnectionError(e.to_string())
        } else {
            Self::OperationError(e.to_string())
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Stream of expired cache keys, namespace prefix already stripped.
pub type ExpirationStream = BoxStream<'static, String>;

/// Remaining lifetime of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists without an expiry.
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

/// Expiring key-value store used for redirects and as the expiration trigger.
///
/// Unlike a read-through cache, this store is the sole source of redirect
/// truth, so implementations must report failures instead of swallowing them:
/// the coordinators rely on errors to run their compensations.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis with keyspace notifications
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process store for tests and local runs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Returns the value stored under `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Writes all `entries` with the same TTL as a single pipelined transaction.
    async fn set_entries(&self, entries: &[(String, String)], ttl: Duration) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Removes `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl>;

    /// Sets the TTL of an existing key. Returns `false` when the key is missing.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Configures the store to publish key-expiration events.
    async fn enable_expiration_notifications(&self) -> CacheResult<()>;

    /// Opens a subscription to key-expiration events.
    ///
    /// Dropping the returned stream closes the subscription.
    async fn subscribe_expirations(&self) -> CacheResult<ExpirationStream>;

    /// Checks if the cache backend is reachable.
    async fn health_check(&self) -> bool;
}
