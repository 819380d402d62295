//! API route configuration.
//!
//! All API endpoints require a caller identity via
//! [`crate::api::middleware::identity`].

use crate::api::handlers::{
    create_url_handler, delete_url_handler, extend_expiry_handler, list_urls_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};

/// All API routes, scoped to the calling user.
///
/// # Endpoints
///
/// - `POST   /urls`             - Create a short link
/// - `GET    /urls`             - List the caller's links (paginated)
/// - `DELETE /urls/{id}`        - Soft-delete a link
/// - `POST   /urls/{id}/expiry` - Extend a link's lifetime
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/urls", get(list_urls_handler).post(create_url_handler))
        .route("/urls/{id}", delete(delete_url_handler))
        .route("/urls/{id}/expiry", post(extend_expiry_handler))
}
