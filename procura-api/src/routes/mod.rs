//! REST API Routes Module
//!
//! Route handlers organized by resource:
//! - Quote requests: intake, sending, conversion, follow-ups, chat, activity
//! - Threads: message ledger, follow-up sending, link watch
//! - Orders: tracking and sync
//! - Webhooks: mail integration and late assistant replies
//! - Health checks
//!
//! Every `/api/v1` route reads the actor from gateway headers. Health and
//! the OpenAPI document are public.

pub mod health;
pub mod orders;
pub mod quote_requests;
pub mod threads;
pub mod webhooks;

use axum::{response::IntoResponse, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

// Re-export route creation functions for convenience
pub use health::create_router as health_router;
pub use orders::create_router as orders_router;
pub use quote_requests::create_router as quote_requests_router;
pub use threads::create_router as threads_router;
pub use webhooks::create_router as webhooks_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl IntoResponse {
    use utoipa::OpenApi;
    Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// ROUTER
// ============================================================================

/// The versioned resource routes, without state.
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/quote-requests", quote_requests_router())
        .nest("/threads", threads_router())
        .nest("/orders", orders_router())
        .nest("/webhooks", webhooks_router())
}

/// Build the complete application router.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .nest("/api/v1", api_routes())
        .merge(health_router());

    #[cfg(feature = "openapi")]
    let router = router.route("/openapi.json", get(openapi_json));

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
