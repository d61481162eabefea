//! Liveness route.

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests.
    pub status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Returns the router for the health check.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
