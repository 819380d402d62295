//! Repository trait for URL record data access.

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable record store for shortened URLs.
///
/// Every mutation is scoped to a single row, so the store's own transactional
/// guarantees are the only concurrency control.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgUrlRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryUrlRepository`] - In-process implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Inserts a record and returns it with its generated `id` and `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::DuplicateShortCode`] if the short code is taken.
    /// Returns [`AppError::Internal`] on database errors.
    async fn insert(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError>;

    /// Sets `is_active` and, when given, `expires_at`. When `user_id` is
    /// `Some`, only a record with that owner is touched.
    ///
    /// Returns the number of rows affected.
    async fn update_active_state(
        &self,
        user_id: Option<i64>,
        record_id: i64,
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError>;

    /// Physically removes a record. Only used to roll back a failed create.
    async fn delete(&self, user_id: i64, record_id: i64) -> Result<(), AppError>;

    /// Finds a record by owner and id.
    ///
    /// Returns `Ok(None)` both when the record is missing and when it belongs
    /// to someone else; use [`UrlRepository::exists_by_id`] to tell them apart.
    async fn get_by_owner_and_id(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<Option<UrlRecord>, AppError>;

    /// Checks whether a record exists regardless of owner.
    async fn exists_by_id(&self, record_id: i64) -> Result<bool, AppError>;

    /// Atomically advances `expires_at` by `hours`, scoped to the owner.
    ///
    /// Returns the number of rows affected.
    async fn extend_expiry(&self, user_id: i64, record_id: i64, hours: i32)
    -> Result<u64, AppError>;

    /// Deactivates the active record with this short code, setting
    /// `expires_at` to now. Inactive or unknown codes affect zero rows.
    ///
    /// Returns the number of rows affected.
    async fn mark_expired_by_code(&self, short_code: &str) -> Result<u64, AppError>;

    /// Lists an owner's records, newest first, optionally filtered by activity.
    async fn list_by_owner(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
        is_active: Option<bool>,
    ) -> Result<Vec<UrlRecord>, AppError>;

    /// Counts an owner's records, optionally filtered by activity.
    async fn count_by_owner(&self, user_id: i64, is_active: Option<bool>)
    -> Result<i64, AppError>;

    /// Checks if the store is reachable.
    async fn health_check(&self) -> bool;
}
