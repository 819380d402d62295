//! In-process expiring cache.

use super::service::{CacheResult, CacheService, ExpirationStream, KeyTtl};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

const EVENT_BUFFER: usize = 1024;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A [`CacheService`] kept in process memory.
///
/// Mirrors the Redis semantics the coordinators depend on: per-key TTLs,
/// `EXPIRE` being a no-op on missing keys, and expiration events published
/// only after [`CacheService::enable_expiration_notifications`]. Lapsed keys
/// are removed lazily on access and by [`MemoryCache::purge_expired`].
///
/// Time is read from `tokio::time`, so tests can drive expiry with a paused
/// clock.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    notifications: AtomicBool,
    expirations: broadcast::Sender<String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        debug!("Using in-memory cache");
        let (expirations, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            entries: Mutex::new(HashMap::new()),
            notifications: AtomicBool::new(false),
            expirations,
        }
    }

    /// Removes every lapsed key and publishes its expiration. Returns the
    /// number of keys removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = {
            let mut entries = self.entries.lock();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };

        for key in &expired {
            self.publish_expired(key);
        }
        expired.len()
    }

    /// Spawns a task purging lapsed keys every `period`. The task ends once
    /// the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else { break };
                cache.purge_expired();
            }
        })
    }

    fn publish_expired(&self, key: &str) {
        if self.notifications.load(Ordering::Acquire) {
            // No subscribers is not an error.
            let _ = self.expirations.send(key.to_string());
        }
    }

    /// Runs `f` on the live entry for `key`, dropping it first if it lapsed.
    fn with_live<T>(&self, key: &str, f: impl FnOnce(Option<&mut Entry>) -> T) -> T {
        let now = Instant::now();
        let (result, lapsed) = {
            let mut entries = self.entries.lock();
            let lapsed = entries.get(key).is_some_and(|e| e.is_expired(now));
            if lapsed {
                entries.remove(key);
            }
            (f(entries.get_mut(key)), lapsed)
        };

        if lapsed {
            self.publish_expired(key);
        }
        result
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.with_live(key, |entry| entry.map(|e| e.value.clone())))
    }

    async fn set_entries(&self, entries: &[(String, String)], ttl: Duration) -> CacheResult<()> {
        let expires_at = Some(Instant::now() + ttl);
        let mut map = self.entries.lock();
        for (key, value) in entries {
            map.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.with_live(key, |entry| entry.is_some()))
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        let now = Instant::now();
        let mut map = self.entries.lock();
        let removed = keys
            .iter()
            .filter_map(|key| map.remove(key))
            .filter(|entry| !entry.is_expired(now))
            .count();
        Ok(removed as u64)
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let now = Instant::now();
        Ok(self.with_live(key, |entry| match entry {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now)),
        }))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let expires_at = Instant::now() + ttl;
        Ok(self.with_live(key, |entry| match entry {
            Some(entry) => {
                entry.expires_at = Some(expires_at);
                true
            }
            None => false,
        }))
    }

    async fn enable_expiration_notifications(&self) -> CacheResult<()> {
        self.notifications.store(true, Ordering::Release);
        Ok(())
    }

    async fn subscribe_expirations(&self) -> CacheResult<ExpirationStream> {
        let rx = self.expirations.subscribe();
        let events = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(key) => return Some((key, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Expiration subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(events))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
