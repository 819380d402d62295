//! URL record entity: the durable, authoritative identity of a short link.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A shortened URL owned by a user.
///
/// `is_active` and the presence of a cache entry under `short_code` are
/// independent facts; a record is only reachable through redirects while both
/// hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub id: i64,
    pub user_id: i64,
    pub original_url: String,
    pub short_code: String,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UrlRecord {
    /// Creates a new UrlRecord instance.
    pub fn new(
        id: i64,
        user_id: i64,
        original_url: String,
        short_code: String,
        expires_at: DateTime<Utc>,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            original_url,
            short_code,
            expires_at,
            is_active,
            created_at,
        }
    }

    /// Returns true if `expires_at` has passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Input data for inserting a record.
#[derive(Debug, Clone)]
pub struct NewUrlRecord {
    pub user_id: i64,
    pub original_url: String,
    pub short_code: String,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Pagination metadata for owner listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationMeta {
    pub fn new(current_page: i64, page_size: i64, total_count: i64) -> Self {
        let total_pages = (total_count + page_size - 1) / page_size;
        Self {
            current_page,
            total_pages,
            page_size,
            total_count,
            has_next: current_page < total_pages,
            has_previous: current_page > 1,
        }
    }
}

/// One page of a user's records.
#[derive(Debug, Clone)]
pub struct UrlPage {
    pub urls: Vec<UrlRecord>,
    pub meta: PaginationMeta,
}
