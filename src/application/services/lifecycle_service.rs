//! Soft delete and expiry extension of existing links.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::entities::UrlRecord;
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::{CacheService, KeyTtl, keys};

pub const MIN_EXTEND_HOURS: i32 = 1;
pub const MAX_EXTEND_HOURS: i32 = 72;

/// Coordinates state changes of existing records across both stores.
///
/// Soft delete deactivates the durable record before evicting its cache
/// keys. When eviction fails the record is reactivated so that a link which
/// still redirects is never reported as deleted. The original `expires_at`
/// is not restored by that compensation.
pub struct LifecycleService<R: UrlRepository + ?Sized = dyn UrlRepository> {
    repository: Arc<R>,
    cache: Arc<dyn CacheService>,
}

impl<R: UrlRepository + ?Sized> LifecycleService<R> {
    pub fn new(repository: Arc<R>, cache: Arc<dyn CacheService>) -> Self {
        Self { repository, cache }
    }

    /// Deactivates a record owned by `user_id` and evicts its cache keys.
    ///
    /// The shared origin key is only evicted while it still points at this
    /// record. Deleting an already inactive record succeeds without touching either
    /// store again.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if no record has this id
    /// - [`AppError::Forbidden`] if the record belongs to another user
    /// - [`AppError::Cache`] if the cache could not be checked; nothing changed
    /// - [`AppError::CacheEvictFailed`] if eviction failed; the record was
    ///   reactivated
    pub async fn soft_delete(&self, user_id: i64, record_id: i64) -> Result<(), AppError> {
        let record = self.owned_record(user_id, record_id).await?;

        if !record.is_active {
            debug!(record_id, "Record already inactive, nothing to delete");
            return Ok(());
        }

        let short_key = keys::short_key(&record.short_code);
        let owned_keys = if self.cache.exists(&short_key).await? {
            self.owned_keys(&record).await?
        } else {
            Vec::new()
        };

        let affected = self
            .repository
            .update_active_state(Some(user_id), record_id, false, Some(Utc::now()))
            .await?;
        if affected == 0 {
            return Err(record_not_found(record_id));
        }

        if owned_keys.is_empty() {
            info!(record_id, short_code = %record.short_code, "Link deactivated");
            return Ok(());
        }

        if let Err(e) = self.cache.delete(&owned_keys).await {
            warn!(
                record_id,
                short_code = %record.short_code,
                error = %e,
                "Cache eviction failed, reactivating record"
            );
            metrics::counter!("shortkeep_compensations_total", "kind" => "delete_reactivate")
                .increment(1);

            let reactivated = self
                .repository
                .update_active_state(Some(user_id), record_id, true, None)
                .await;
            if !matches!(reactivated, Ok(n) if n > 0) {
                error!(
                    anomaly = "deactivated_but_cached",
                    record_id,
                    short_code = %record.short_code,
                    result = ?reactivated,
                    "Failed to reactivate record after cache eviction failure"
                );
                metrics::counter!(
                    "shortkeep_compensation_failures_total",
                    "kind" => "delete_reactivate"
                )
                .increment(1);
            }

            return Err(AppError::CacheEvictFailed { source: e });
        }

        info!(record_id, short_code = %record.short_code, "Link deleted");
        Ok(())
    }

    /// Pushes a record's expiry `hours` further out in both stores.
    ///
    /// The durable change is kept even when the record turns out to be
    /// inactive. A cache key without a TTL gets `hours` as its new TTL;
    /// missing keys are left alone. An origin key taken over by a newer
    /// record for the same URL is not touched.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidExpiry`] if `hours` is outside 1..=72
    /// - [`AppError::NotFound`] / [`AppError::Forbidden`] as for soft delete
    /// - [`AppError::RecordInactive`] if the record is deactivated
    /// - [`AppError::Cache`] if a cache call failed; not compensated
    pub async fn extend_expiry(
        &self,
        user_id: i64,
        record_id: i64,
        hours: i32,
    ) -> Result<(), AppError> {
        if !(MIN_EXTEND_HOURS..=MAX_EXTEND_HOURS).contains(&hours) {
            return Err(AppError::invalid_expiry(
                "Extension must be between 1 and 72 hours",
                json!({ "provided": hours, "min": MIN_EXTEND_HOURS, "max": MAX_EXTEND_HOURS }),
            ));
        }

        let affected = self
            .repository
            .extend_expiry(user_id, record_id, hours)
            .await?;
        if affected == 0 {
            return Err(self.missing_or_foreign(record_id).await);
        }

        let record = self
            .repository
            .get_by_owner_and_id(user_id, record_id)
            .await?
            .ok_or_else(|| record_not_found(record_id))?;
        if !record.is_active {
            return Err(AppError::RecordInactive { record_id });
        }

        let extension = Duration::from_secs(u64::from(hours.unsigned_abs()) * 3600);
        for key in self.owned_keys(&record).await? {
            let ttl = match self.cache.ttl(&key).await? {
                KeyTtl::Expires(remaining) => remaining + extension,
                KeyTtl::Missing | KeyTtl::Persistent => extension,
            };
            self.cache.expire(&key, ttl).await?;
        }

        info!(record_id, hours, short_code = %record.short_code, "Link expiry extended");
        Ok(())
    }

    async fn owned_record(&self, user_id: i64, record_id: i64) -> Result<UrlRecord, AppError> {
        if !self.repository.exists_by_id(record_id).await? {
            return Err(record_not_found(record_id));
        }

        self.repository
            .get_by_owner_and_id(user_id, record_id)
            .await?
            .ok_or_else(|| record_forbidden(record_id))
    }

    async fn owned_keys(&self, record: &UrlRecord) -> Result<Vec<String>, AppError> {
        Ok(keys::owned_lookup_keys(
            self.cache.as_ref(),
            &record.short_code,
            &record.original_url,
        )
        .await?)
    }

    async fn missing_or_foreign(&self, record_id: i64) -> AppError {
        match self.repository.exists_by_id(record_id).await {
            Ok(true) => record_forbidden(record_id),
            Ok(false) => record_not_found(record_id),
            Err(e) => e,
        }
    }
}

fn record_not_found(record_id: i64) -> AppError {
    AppError::not_found("URL record not found", json!({ "record_id": record_id }))
}

fn record_forbidden(record_id: i64) -> AppError {
    AppError::forbidden(
        "URL record belongs to another user",
        json!({ "record_id": record_id }),
    )
}
