//! PostgreSQL implementation of the URL repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{NewUrlRecord, UrlRecord};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

const RECORD_COLUMNS: &str =
    "id, user_id, original_url, short_code, expires_at, is_active, created_at";

#[derive(sqlx::FromRow)]
struct UrlRow {
    id: i64,
    user_id: i64,
    original_url: String,
    short_code: String,
    expires_at: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<UrlRow> for UrlRecord {
    fn from(r: UrlRow) -> Self {
        UrlRecord::new(
            r.id,
            r.user_id,
            r.original_url,
            r.short_code,
            r.expires_at,
            r.is_active,
            r.created_at,
        )
    }
}

/// PostgreSQL repository for the `shortened_urls` table.
///
/// Uses bound parameters for every value; each mutation is a single
/// row-scoped statement.
pub struct PgUrlRepository {
    pool: Arc<PgPool>,
}

impl PgUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UrlRepository for PgUrlRepository {
    async fn insert(&self, new_record: NewUrlRecord) -> Result<UrlRecord, AppError> {
        let query = format!(
            "INSERT INTO shortened_urls (user_id, original_url, short_code, expires_at, is_active)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {RECORD_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UrlRow>(&query)
            .bind(new_record.user_id)
            .bind(&new_record.original_url)
            .bind(&new_record.short_code)
            .bind(new_record.expires_at)
            .bind(new_record.is_active)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    AppError::DuplicateShortCode {
                        code: new_record.short_code.clone(),
                    }
                } else {
                    AppError::from(e)
                }
            })?;

        Ok(row.into())
    }

    async fn update_active_state(
        &self,
        user_id: Option<i64>,
        record_id: i64,
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE shortened_urls
            SET is_active = $1,
                expires_at = COALESCE($2, expires_at)
            WHERE id = $3 AND ($4::bigint IS NULL OR user_id = $4)
            "#,
        )
        .bind(is_active)
        .bind(expires_at)
        .bind(record_id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, user_id: i64, record_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM shortened_urls WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(record_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn get_by_owner_and_id(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<Option<UrlRecord>, AppError> {
        let query =
            format!("SELECT {RECORD_COLUMNS} FROM shortened_urls WHERE user_id = $1 AND id = $2");

        let row = sqlx::query_as::<_, UrlRow>(&query)
            .bind(user_id)
            .bind(record_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(row.map(UrlRecord::from))
    }

    async fn exists_by_id(&self, record_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM shortened_urls WHERE id = $1)",
        )
        .bind(record_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn extend_expiry(
        &self,
        user_id: i64,
        record_id: i64,
        hours: i32,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE shortened_urls
            SET expires_at = expires_at + make_interval(hours => $1)
            WHERE id = $2 AND user_id = $3
            "#,
        )
        .bind(hours)
        .bind(record_id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_expired_by_code(&self, short_code: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE shortened_urls
            SET is_active = false,
                expires_at = NOW()
            WHERE short_code = $1 AND is_active = true
            "#,
        )
        .bind(short_code)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_by_owner(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
        is_active: Option<bool>,
    ) -> Result<Vec<UrlRecord>, AppError> {
        let query = format!(
            "SELECT {RECORD_COLUMNS}
             FROM shortened_urls
             WHERE user_id = $1 AND ($2::boolean IS NULL OR is_active = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );

        let rows = sqlx::query_as::<_, UrlRow>(&query)
            .bind(user_id)
            .bind(is_active)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows.into_iter().map(UrlRecord::from).collect())
    }

    async fn count_by_owner(&self, user_id: i64, is_active: Option<bool>) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM shortened_urls
            WHERE user_id = $1 AND ($2::boolean IS NULL OR is_active = $2)
            "#,
        )
        .bind(user_id)
        .bind(is_active)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool.as_ref())
            .await
            .is_ok()
    }
}
