//! Background Jobs for PROCURA API
//!
//! This module contains the work that runs outside of request handling:
//!
//! - `response_sweep`: Periodically marks silent supplier threads NO_RESPONSE
//! - `thread_link`: Per-thread lookups that store the mail backend's thread id
//! - `enrichment`: Best-effort order syncs triggered by inbound supplier mail
//!
//! # Usage
//!
//! The sweep is spawned during server startup and stopped through a watch
//! channel; link watches hang off a cancellation token:
//!
//! ```ignore
//! use procura_api::jobs::{response_sweep_task, ResponseSweepConfig, ThreadLinkRegistry};
//! use tokio::sync::watch;
//! use tokio_util::sync::CancellationToken;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(response_sweep_task(
//!     store.clone(),
//!     lifecycle.clone(),
//!     ResponseSweepConfig::default(),
//!     shutdown_rx,
//! ));
//!
//! let shutdown = CancellationToken::new();
//! let links = Arc::new(
//!     ThreadLinkRegistry::new(store, parser, ThreadLinkConfig::default()).with_parent(&shutdown),
//! );
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! shutdown.cancel();
//! ```

pub mod enrichment;
pub mod response_sweep;
pub mod thread_link;

// Re-export commonly used types
pub use enrichment::{EnrichmentOutcome, EnrichmentRecord, OrderEnrichment};
pub use response_sweep::{
    response_sweep_task, sweep_once, ResponseSweepConfig, ResponseSweepMetrics,
};
pub use thread_link::{LinkOutcome, ThreadLinkConfig, ThreadLinkRegistry};
