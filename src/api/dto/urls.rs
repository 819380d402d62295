//! DTOs for the URL management endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use crate::domain::entities::{PaginationMeta, UrlRecord};

/// Request to shorten a URL.
///
/// Custom code rules are enforced by the service so that a bad code is
/// reported as `invalid_custom_code` rather than a generic validation error.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUrlRequest {
    /// The original URL to shorten (must be valid HTTP/HTTPS).
    #[validate(url(message = "Invalid URL format"))]
    pub original_url: String,

    /// Lifetime of the link in hours.
    #[validate(range(min = 1, max = 8760, message = "Must be between 1 and 8760 hours"))]
    pub expire_time: i64,

    /// Optional custom short code.
    #[serde(default)]
    pub custom_short_url: Option<String>,
}

/// Request to push a link's expiry further out.
#[derive(Debug, Deserialize, Validate)]
pub struct ExtendExpiryRequest {
    #[validate(range(min = 1, max = 72, message = "Must be between 1 and 72 hours"))]
    pub hours: i32,
}

/// Query parameters for listing a user's links.
///
/// Uses `serde_with` so that numbers and booleans parse from query strings.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct ListUrlsQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<i64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,

    /// Filter by activity; omitted means all links.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub active: Option<bool>,
}

/// JSON representation of a link.
#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub id: i64,
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UrlResponse {
    pub fn from_record(record: UrlRecord, short_url: String) -> Self {
        Self {
            id: record.id,
            original_url: record.original_url,
            short_code: record.short_code,
            short_url,
            expires_at: record.expires_at,
            is_active: record.is_active,
            created_at: record.created_at,
        }
    }
}

/// One page of links.
#[derive(Debug, Serialize)]
pub struct UrlListResponse {
    pub urls: Vec<UrlResponse>,
    pub pagination: PaginationMeta,
}

/// Plain acknowledgement message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let ok = CreateUrlRequest {
            original_url: "https://example.com/a".to_string(),
            expire_time: 1,
            custom_short_url: None,
        };
        assert!(ok.validate().is_ok());

        let bad_url = CreateUrlRequest {
            original_url: "not a url".to_string(),
            ..ok
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_zero_hours() {
        let req = CreateUrlRequest {
            original_url: "https://example.com".to_string(),
            expire_time: 0,
            custom_short_url: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_extend_request_range() {
        assert!(ExtendExpiryRequest { hours: 72 }.validate().is_ok());
        assert!(ExtendExpiryRequest { hours: 73 }.validate().is_err());
    }
}
