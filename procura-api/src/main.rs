//! PROCURA API Server Entry Point
//!
//! Reads configuration from the environment, wires the store and parsing
//! service into the application state, starts the response sweep and
//! serves the Axum router until ctrl-c.

use std::sync::Arc;

use procura_api::jobs::{response_sweep_task, ResponseSweepConfig, ThreadLinkConfig};
use procura_api::telemetry::{init_tracer, TelemetryConfig};
use procura_api::{create_router, ApiConfig, ApiError, ApiResult, AppState};
use procura_core::LifecycleConfig;
use procura_parser::{DisabledParsingService, HttpParsingService, ParserConfig, ParsingService};
use procura_storage::{MockStorage, ProcurementStore};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracer(&TelemetryConfig::default())?;

    let api_config = ApiConfig::from_env();
    api_config.validate()?;
    let lifecycle = LifecycleConfig::from_env();
    lifecycle.validate()?;
    let parser_config = ParserConfig::from_env();
    parser_config.validate()?;

    let parser: Arc<dyn ParsingService> = if parser_config.is_configured() {
        Arc::new(HttpParsingService::new(&parser_config)?)
    } else {
        tracing::warn!("PROCURA_PARSER_URL not set; parsing, chat and follow-ups are disabled");
        Arc::new(DisabledParsingService)
    };

    // In-memory store; a database-backed ProcurementStore plugs in here.
    let store: Arc<dyn ProcurementStore> = Arc::new(MockStorage::new());

    let addr = api_config.bind_addr()?;
    let state = AppState::new(
        store.clone(),
        parser,
        lifecycle.clone(),
        api_config,
        ThreadLinkConfig::from_env(),
    );
    let shutdown = state.shutdown.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = tokio::spawn(response_sweep_task(
        store,
        lifecycle,
        ResponseSweepConfig::from_env(),
        shutdown_rx,
    ));

    let app = create_router(state);

    tracing::info!(%addr, "Starting PROCURA API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let graceful = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            graceful.cancel();
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    shutdown.cancel();
    let _ = shutdown_tx.send(true);
    match sweep.await {
        Ok(metrics) => {
            let snapshot = metrics.snapshot();
            tracing::info!(
                threads_marked = snapshot.threads_marked,
                sweep_cycles = snapshot.sweep_cycles,
                "Response sweep stopped"
            );
        }
        Err(e) => tracing::error!(error = %e, "Response sweep task panicked"),
    }

    Ok(())
}
