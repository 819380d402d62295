//! Short link creation and listing service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use crate::domain::entities::{NewUrlRecord, PaginationMeta, UrlPage, UrlRecord};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::{CacheService, keys};
use crate::utils::code_generator::{generate_code, validate_custom_code};

/// Allowed lifetime of a new link, in hours.
pub const MIN_TTL_HOURS: i64 = 1;
pub const MAX_TTL_HOURS: i64 = 8760;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Service for creating short links across the durable store and the cache.
///
/// A create is a two-step saga: the durable insert comes first, then both
/// cache keys are written in one pipeline. If the cache write fails the
/// inserted row is deleted again, so a failed create never leaves a durable
/// record behind.
pub struct ShortenService<R: UrlRepository + ?Sized = dyn UrlRepository> {
    repository: Arc<R>,
    cache: Arc<dyn CacheService>,
    base_url: String,
}

impl<R: UrlRepository + ?Sized> ShortenService<R> {
    /// Creates a new shorten service.
    ///
    /// `base_url` is the public origin used to render short URLs, for example
    /// `https://s.example.com`.
    pub fn new(repository: Arc<R>, cache: Arc<dyn CacheService>, base_url: impl Into<String>) -> Self {
        Self {
            repository,
            cache,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a short link owned by `user_id` that lives for `ttl_hours`.
    ///
    /// An empty `custom_code` is treated as absent.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidExpiry`] if `ttl_hours` is outside 1..=8760
    /// - [`AppError::InvalidCustomCode`] if the custom code is malformed
    /// - [`AppError::DuplicateShortCode`] if the code is taken in either store
    /// - [`AppError::CacheWriteFailed`] if the cache write failed; the durable
    ///   row has been removed
    pub async fn create(
        &self,
        user_id: i64,
        original_url: String,
        custom_code: Option<String>,
        ttl_hours: i64,
    ) -> Result<UrlRecord, AppError> {
        if !(MIN_TTL_HOURS..=MAX_TTL_HOURS).contains(&ttl_hours) {
            return Err(AppError::invalid_expiry(
                "Expiration time must be between 1 and 8760 hours",
                json!({ "provided": ttl_hours, "min": MIN_TTL_HOURS, "max": MAX_TTL_HOURS }),
            ));
        }

        let short_code = match custom_code.filter(|c| !c.is_empty()) {
            Some(custom) => self.claim_custom_code(custom).await?,
            None => generate_code(&original_url),
        };

        let new_record = NewUrlRecord {
            user_id,
            original_url,
            short_code,
            expires_at: Utc::now() + TimeDelta::hours(ttl_hours),
            is_active: true,
        };

        let record = self.repository.insert(new_record).await?;

        let ttl = Duration::from_secs(ttl_hours.unsigned_abs() * 3600);
        if let Err(e) = self.cache.set_entries(&keys::entries_for(&record), ttl).await {
            warn!(
                record_id = record.id,
                short_code = %record.short_code,
                error = %e,
                "Cache write failed, rolling back durable insert"
            );
            metrics::counter!("shortkeep_compensations_total", "kind" => "create_rollback")
                .increment(1);

            if let Err(rollback_err) = self.repository.delete(user_id, record.id).await {
                error!(
                    anomaly = "orphaned_record",
                    record_id = record.id,
                    short_code = %record.short_code,
                    error = %rollback_err,
                    "Failed to delete record after cache write failure"
                );
                metrics::counter!(
                    "shortkeep_compensation_failures_total",
                    "kind" => "create_rollback"
                )
                .increment(1);
            }

            return Err(AppError::CacheWriteFailed { source: e });
        }

        info!(
            record_id = record.id,
            user_id,
            short_code = %record.short_code,
            "Short link created"
        );
        metrics::counter!("shortkeep_links_created_total").increment(1);

        Ok(record)
    }

    /// Returns one page of a user's links, newest first.
    ///
    /// `page` below 1 is read as 1; `limit` below 1 falls back to 10 and is
    /// capped at 100.
    pub async fn list_user_urls(
        &self,
        user_id: i64,
        page: i64,
        limit: i64,
        is_active: Option<bool>,
    ) -> Result<UrlPage, AppError> {
        let page = page.max(1);
        let limit = if limit <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            limit.min(MAX_PAGE_SIZE)
        };
        let offset = (page - 1).saturating_mul(limit);

        let urls = self
            .repository
            .list_by_owner(user_id, offset, limit, is_active)
            .await?;
        let total_count = self.repository.count_by_owner(user_id, is_active).await?;

        Ok(UrlPage {
            urls,
            meta: PaginationMeta::new(page, limit, total_count),
        })
    }

    /// Renders the public short URL for a code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }

    /// Validates a custom code and rejects it early when the cache already
    /// holds it. The occupancy check is best effort: a cache error lets the
    /// durable unique constraint decide.
    async fn claim_custom_code(&self, custom: String) -> Result<String, AppError> {
        validate_custom_code(&custom)?;

        match self.cache.exists(&keys::short_key(&custom)).await {
            Ok(true) => Err(AppError::DuplicateShortCode { code: custom }),
            Ok(false) => Ok(custom),
            Err(e) => {
                warn!(short_code = %custom, error = %e, "Cache occupancy check failed");
                Ok(custom)
            }
        }
    }
}
