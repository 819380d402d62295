//! Caller identity middleware.
//!
//! Authentication happens upstream: the gateway in front of this service
//! verifies the caller and forwards their numeric id in `X-User-Id`. This
//! layer only parses that header.

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, available to handlers as
/// `Extension<CurrentUser>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

/// Rejects requests without a valid `X-User-Id` header and stores the
/// caller as a request extension.
///
/// # Errors
///
/// Returns `401 Unauthorized` if the header is missing, not a positive
/// integer, or not valid UTF-8.
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, routing::get, middleware};
/// use crate::api::middleware::identity;
///
/// let protected = Router::new()
///     .route("/api/urls", get(list_urls_handler))
///     .route_layer(middleware::from_fn(identity::layer));
/// ```
pub async fn layer(mut req: Request, next: Next) -> Result<Response, AppError> {
    let user = current_user(req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn current_user(headers: &HeaderMap) -> Result<CurrentUser, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::unauthorized("Missing X-User-Id header"))?;

    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .map(CurrentUser)
        .ok_or_else(|| AppError::unauthorized("Invalid X-User-Id header"))
}
