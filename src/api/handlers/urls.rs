//! Handlers for link management endpoints (create, list, delete, extend).

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::api::dto::urls::{
    CreateUrlRequest, ExtendExpiryRequest, ListUrlsQuery, MessageResponse, UrlListResponse,
    UrlResponse,
};
use crate::api::middleware::identity::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link for the caller.
///
/// # Endpoint
///
/// `POST /api/urls`
///
/// # Request Body
///
/// ```json
/// {
///   "original_url": "https://example.com/a",
///   "expire_time": 24,
///   "custom_short_url": "my-link"
/// }
/// ```
///
/// # Errors
///
/// - 400 if validation fails or the custom code is malformed
/// - 409 if the short code is taken
/// - 500 if the cache write failed (nothing was stored)
pub async fn create_url_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(payload): Json<CreateUrlRequest>,
) -> Result<(StatusCode, Json<UrlResponse>), AppError> {
    payload.validate()?;

    let record = state
        .shorten_service
        .create(
            user_id,
            payload.original_url,
            payload.custom_short_url,
            payload.expire_time,
        )
        .await?;

    let short_url = state.shorten_service.short_url(&record.short_code);
    Ok((
        StatusCode::CREATED,
        Json(UrlResponse::from_record(record, short_url)),
    ))
}

/// Lists the caller's links, newest first.
///
/// # Endpoint
///
/// `GET /api/urls?page=1&limit=10&active=true`
pub async fn list_urls_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<ListUrlsQuery>,
) -> Result<Json<UrlListResponse>, AppError> {
    let page = state
        .shorten_service
        .list_user_urls(
            user_id,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(0),
            query.active,
        )
        .await?;

    let urls = page
        .urls
        .into_iter()
        .map(|record| {
            let short_url = state.shorten_service.short_url(&record.short_code);
            UrlResponse::from_record(record, short_url)
        })
        .collect();

    Ok(Json(UrlListResponse {
        urls,
        pagination: page.meta,
    }))
}

/// Soft-deletes one of the caller's links.
///
/// # Endpoint
///
/// `DELETE /api/urls/{id}`
///
/// # Errors
///
/// - 403 if the link belongs to someone else
/// - 404 if it does not exist
/// - 500 if the cache could not be cleared (the link stays active)
pub async fn delete_url_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.lifecycle_service.soft_delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Extends the lifetime of one of the caller's links.
///
/// # Endpoint
///
/// `POST /api/urls/{id}/expiry`
///
/// ```json
/// { "hours": 12 }
/// ```
pub async fn extend_expiry_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<ExtendExpiryRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;

    state
        .lifecycle_service
        .extend_expiry(user_id, id, payload.hours)
        .await?;

    Ok(Json(MessageResponse {
        message: format!("Expiry extended by {} hours", payload.hours),
    }))
}
