//! Cache key layout for URL records.
//!
//! Every record writes two keys when it is created:
//!
//! - the short key `<short_code>` holding the original URL (redirect lookups,
//!   expiration trigger);
//! - the origin key `origin:<original_url>` holding the short code.
//!
//! Short codes never contain `:`, so the two spaces cannot collide. Records
//! shortening the same URL share one origin key, which points at the most
//! recently created of them. See [`owned_lookup_keys`].

use super::service::{CacheResult, CacheService};
use crate::domain::entities::UrlRecord;

const ORIGIN_PREFIX: &str = "origin:";

/// Key used for redirect lookups.
pub fn short_key(short_code: &str) -> String {
    short_code.to_string()
}

/// Reverse lookup key for an original URL.
pub fn origin_key(original_url: &str) -> String {
    format!("{ORIGIN_PREFIX}{original_url}")
}

/// Lookup keys a record may extend or evict, short key first.
///
/// The origin key is only included while it still holds `short_code`;
/// otherwise it belongs to a newer record for the same URL.
pub async fn owned_lookup_keys(
    cache: &dyn CacheService,
    short_code: &str,
    original_url: &str,
) -> CacheResult<Vec<String>> {
    let origin = origin_key(original_url);
    let mut keys = vec![short_key(short_code)];
    if cache.get(&origin).await?.as_deref() == Some(short_code) {
        keys.push(origin);
    }
    Ok(keys)
}

/// Key/value pairs written when a record is created.
pub fn entries_for(record: &UrlRecord) -> Vec<(String, String)> {
    vec![
        (short_key(&record.short_code), record.original_url.clone()),
        (origin_key(&record.original_url), record.short_code.clone()),
    ]
}

/// Extracts the short code from an expired key, or `None` for origin keys.
pub fn short_code_from_key(key: &str) -> Option<&str> {
    if key.is_empty() || key.starts_with(ORIGIN_PREFIX) {
        None
    } else {
        Some(key)
    }
}
