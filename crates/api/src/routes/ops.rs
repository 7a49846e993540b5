//! Operations routes
//!
//! Health check for monitoring. Does not touch the registry.

use axum::http::StatusCode;
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: &'static str,
    /// Query backend name
    pub backend: &'static str,
    /// Whether the backend answered
    pub backend_reachable: bool,
}

/// Operations routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// Health check endpoint
///
/// GET /health
///
/// Returns 503 when the query backend cannot be reached.
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let reachable = match state.engine.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "backend health check failed");
            false
        }
    };

    let status = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if reachable { "ok" } else { "degraded" },
            backend: state.engine.backend_name(),
            backend_reachable: reachable,
        }),
    )
}
