//! Application error type shared by services, repositories and HTTP handlers.
//!
//! Every failure a coordinator can report maps onto one [`AppError`] variant.
//! The HTTP layer renders them with a uniform JSON envelope:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "...", "details": {} } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use validator::ValidationErrors;

use crate::infrastructure::cache::CacheError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Serializable error payload, also used for per-item errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// The durable store rejected the short code (unique constraint) or the
    /// cache pre-check found it occupied.
    #[error("Short code '{code}' is already in use")]
    DuplicateShortCode { code: String },

    #[error("{message}")]
    InvalidCustomCode { message: String, details: Value },

    #[error("{message}")]
    InvalidExpiry { message: String, details: Value },

    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    /// The record exists but belongs to another owner.
    #[error("{message}")]
    Forbidden { message: String, details: Value },

    #[error("URL record {record_id} is inactive or deleted")]
    RecordInactive { record_id: i64 },

    /// Cache write failed after the durable insert; the insert was rolled back.
    #[error("Failed to save URL to cache, durable record rolled back: {source}")]
    CacheWriteFailed { source: CacheError },

    /// Cache eviction failed after deactivation; the record was reactivated.
    #[error("Failed to remove URL from cache: {source}")]
    CacheEvictFailed { source: CacheError },

    /// An expiration event matched no active record. Only the listener sees this.
    #[error("No active URL found for short code '{code}'")]
    ReconciliationSkipped { code: String },

    #[error("Cache unavailable: {0}")]
    Cache(#[from] CacheError),

    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn invalid_custom_code(message: impl Into<String>, details: Value) -> Self {
        Self::InvalidCustomCode {
            message: message.into(),
            details,
        }
    }

    pub fn invalid_expiry(message: impl Into<String>, details: Value) -> Self {
        Self::InvalidExpiry {
            message: message.into(),
            details,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn forbidden(message: impl Into<String>, details: Value) -> Self {
        Self::Forbidden {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateShortCode { .. } => "duplicate_short_code",
            Self::InvalidCustomCode { .. } => "invalid_custom_code",
            Self::InvalidExpiry { .. } => "invalid_expiry",
            Self::Validation { .. } => "validation_error",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::RecordInactive { .. } => "record_inactive",
            Self::CacheWriteFailed { .. } => "cache_write_failed",
            Self::CacheEvictFailed { .. } => "cache_evict_failed",
            Self::ReconciliationSkipped { .. } => "reconciliation_skipped",
            Self::Cache(_) => "cache_unavailable",
            Self::Internal { .. } => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DuplicateShortCode { .. } | Self::RecordInactive { .. } => StatusCode::CONFLICT,
            Self::InvalidCustomCode { .. }
            | Self::InvalidExpiry { .. }
            | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } | Self::ReconciliationSkipped { .. } => StatusCode::NOT_FOUND,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::CacheWriteFailed { .. } | Self::CacheEvictFailed { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Converts the error into its serializable payload.
    pub fn to_error_info(&self) -> ErrorInfo {
        let details = match self {
            Self::InvalidCustomCode { details, .. }
            | Self::InvalidExpiry { details, .. }
            | Self::Validation { details, .. }
            | Self::NotFound { details, .. }
            | Self::Forbidden { details, .. }
            | Self::Internal { details, .. } => details.clone(),
            Self::DuplicateShortCode { code } | Self::ReconciliationSkipped { code } => {
                json!({ "short_code": code })
            }
            Self::RecordInactive { record_id } => json!({ "record_id": record_id }),
            Self::Unauthorized { .. }
            | Self::CacheWriteFailed { .. }
            | Self::CacheEvictFailed { .. }
            | Self::Cache(_) => json!({}),
        };

        ErrorInfo {
            code: self.code(),
            message: self.to_string(),
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        }

        let body = ErrorBody {
            error: self.to_error_info(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "Database error");
        AppError::internal("Database error", json!({}))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self {
        let details = serde_json::to_value(e.field_errors()).unwrap_or_else(|_| json!({}));
        AppError::bad_request("Invalid request payload", details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::DuplicateShortCode {
                code: "abcde".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::forbidden("nope", json!({})).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Cache(CacheError::OperationError("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::CacheWriteFailed {
                source: CacheError::OperationError("down".into())
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_info_carries_short_code() {
        let info = AppError::DuplicateShortCode {
            code: "taken".into(),
        }
        .to_error_info();

        assert_eq!(info.code, "duplicate_short_code");
        assert_eq!(info.details["short_code"], "taken");
        assert!(info.message.contains("taken"));
    }

    #[test]
    fn test_cache_write_failed_wraps_cause() {
        let err = AppError::CacheWriteFailed {
            source: CacheError::OperationError("pipeline aborted".into()),
        };
        assert!(err.to_string().contains("pipeline aborted"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
