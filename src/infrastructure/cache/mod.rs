//! Expiring key-value store backing redirects and expiration events.
//!
//! Provides a [`CacheService`] trait with two implementations:
//! - [`RedisCache`] - Production Redis-backed store with keyspace notifications
//! - [`MemoryCache`] - In-process store for tests and cache-less local runs

pub mod keys;
mod memory_cache;
mod redis_cache;
mod service;

pub use memory_cache::MemoryCache;
pub use redis_cache::RedisCache;
pub use service::{CacheError, CacheResult, CacheService, ExpirationStream, KeyTtl};

#[cfg(test)]
pub use service::MockCacheService;
