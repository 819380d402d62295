//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::domain::expiration_listener::ListenerState;
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: Database and cache reachable
/// - **503 Service Unavailable**: One of them is down
///
/// A stopped expiration listener is reported but does not degrade the
/// status: redirects keep working, only reconciliation lags.
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Connected" },
///     "cache": { "status": "ok", "message": "Connected" },
///     "expiration_listener": { "status": "ok", "message": "listening" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let database = if state.repository.health_check().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Database connection failed")
    };

    let cache = if state.cache.health_check().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Cache connection failed")
    };

    let expiration_listener = match *state.listener_state.borrow() {
        ListenerState::Listening => CheckStatus::ok("listening"),
        ListenerState::Initializing => CheckStatus::ok("initializing"),
        ListenerState::Stopped => CheckStatus::error("stopped"),
    };

    let all_healthy = database.is_ok() && cache.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            cache,
            expiration_listener,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
