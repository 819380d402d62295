//! Redis-backed cache implementation.

use super::service::{CacheError, CacheResult, CacheService, ExpirationStream, KeyTtl};
use crate::config::mask_connection_string;
use async_trait::async_trait;
use futures::StreamExt;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Channel carrying key-expiration events of the client's logical database.
fn expired_events_channel(client: &Client) -> String {
    let db = client.get_connection_info().redis_settings().db();
    format!("__keyevent@{db}__:expired")
}

/// Redis implementation of [`CacheService`].
///
/// Commands go through a `ConnectionManager`, which reconnects transparently.
/// Expiration events use a dedicated pub/sub connection per subscription.
/// All keys live under a namespace prefix that is stripped again before keys
/// are handed to subscribers.
pub struct RedisCache {
    client: Client,
    manager: ConnectionManager,
    key_prefix: String,
    expired_channel: String,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ConnectionError`] if the URL is invalid, the connection cannot
    /// be established, or the PING health check fails.
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> CacheResult<Self> {
        info!("Connecting to Redis at {}", mask_connection_string(redis_url));

        let client = Client::open(redis_url).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis");

        Ok(Self {
            expired_channel: expired_events_channel(&client),
            client,
            manager,
            key_prefix: key_prefix.into(),
        })
    }

    /// Constructs the full Redis key with namespace prefix.
    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.build_key(key)).await?;

        match &value {
            Some(_) => debug!("Cache HIT: {}", key),
            None => debug!("Cache MISS: {}", key),
        }

        Ok(value)
    }

    async fn set_entries(&self, entries: &[(String, String)], ttl: Duration) -> CacheResult<()> {
        let seconds = ttl.as_secs().max(1);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.set_ex(self.build_key(key), value, seconds).ignore();
        }

        let mut conn = self.manager.clone();
        pipe.query_async::<()>(&mut conn).await.map_err(|e| {
            warn!(error = %e, "Redis pipelined SET failed");
            CacheError::from(e)
        })?;

        debug!("Cache SET: {} key(s) (TTL: {}s)", entries.len(), seconds);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        Ok(conn.exists(self.build_key(key)).await?)
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let full_keys: Vec<String> = keys.iter().map(|k| self.build_key(k)).collect();
        let mut pipe = redis::pipe();
        pipe.atomic().del(&full_keys);

        let mut conn = self.manager.clone();
        let (removed,): (u64,) = pipe.query_async(&mut conn).await.map_err(|e| {
            warn!(error = %e, "Redis DEL failed");
            CacheError::from(e)
        })?;

        debug!("Cache DEL: {} of {} key(s) removed", removed, keys.len());
        Ok(removed)
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let mut conn = self.manager.clone();
        let millis: i64 = conn.pttl(self.build_key(key)).await?;

        Ok(match millis {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            ms if ms >= 0 => KeyTtl::Expires(Duration::from_millis(ms as u64)),
            other => {
                return Err(CacheError::OperationError(format!(
                    "unexpected PTTL reply {other}"
                )));
            }
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Ok(conn.pexpire(self.build_key(key), millis).await?)
    }

    async fn enable_expiration_notifications(&self) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("Ex")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| {
                CacheError::NotificationError(format!(
                    "Failed to enable keyspace notifications: {}",
                    e
                ))
            })?;

        info!("Redis keyspace expiration notifications enabled");
        Ok(())
    }

    async fn subscribe_expirations(&self) -> CacheResult<ExpirationStream> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            CacheError::NotificationError(format!("Failed to open pub/sub connection: {}", e))
        })?;

        pubsub
            .subscribe(&self.expired_channel)
            .await
            .map_err(|e| {
                CacheError::NotificationError(format!("Failed to subscribe: {}", e))
            })?;

        info!("Subscribed to {}", self.expired_channel);

        let prefix = self.key_prefix.clone();
        let events = pubsub.into_on_message().filter_map(move |msg| {
            let key = match msg.get_payload::<String>() {
                Ok(payload) => payload.strip_prefix(prefix.as_str()).map(str::to_owned),
                Err(e) => {
                    warn!(error = %e, "Undecodable expiration event payload");
                    None
                }
            };
            futures::future::ready(key)
        });

        Ok(events.boxed())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.manager.clone();
        conn.ping::<()>().await.is_ok()
    }
}

// Integration tests requiring a running Redis instance live in
// tests/redis_cache.rs and are ignored by default.
