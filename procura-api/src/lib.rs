//! PROCURA API - REST layer for the procurement lifecycle
//!
//! Exposes quote requests, supplier threads, orders and chat over Axum.
//! Handlers delegate to the [`services`] layer, which reads fresh state
//! from a [`procura_storage::ProcurementStore`], applies the rules in
//! `procura-lifecycle` and persists the result with compare-and-set
//! writes. Background work (order enrichment, thread-link watches, the
//! no-response sweep) lives in [`jobs`].

#[macro_use]
pub mod macros;

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use auth::{Actor, Role};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
pub use types::*;
