//! Health Check Endpoints
//!
//! - /health/live - Process alive check
//! - /health - Liveness plus uptime and background work counters
//!
//! No actor headers required.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::jobs::ThreadLinkRegistry;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    ShuttingDown,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub pending_link_watches: usize,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/live - Process liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = String),
    ),
)]
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /health - Uptime and background work
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is serving", body = HealthResponse),
        (status = 503, description = "Service is shutting down", body = HealthResponse),
    ),
)]
pub async fn health(
    State(state): State<AppState>,
    State(links): State<Arc<ThreadLinkRegistry>>,
    State(start_time): State<std::time::Instant>,
) -> impl IntoResponse {
    let (code, status) = if state.shutdown.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::ShuttingDown)
    } else {
        (StatusCode::OK, HealthStatus::Healthy)
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        pending_link_watches: links.pending_count(),
    };
    (code, Json(response))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(liveness))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(
            serde_json::to_value(HealthStatus::ShuttingDown).unwrap(),
            serde_json::json!("shutting_down")
        );
        assert_eq!(
            serde_json::to_value(HealthStatus::Healthy).unwrap(),
            serde_json::json!("healthy")
        );
    }
}
