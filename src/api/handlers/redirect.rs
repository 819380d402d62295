//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// The lookup goes to the cache only. An expired or deleted link has no
/// cache entry and yields 404; an unreachable cache yields 503.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let original_url = state.redirect_service.resolve(&code).await?;
    debug!(short_code = %code, "Redirecting");

    Ok(Redirect::temporary(&original_url))
}
