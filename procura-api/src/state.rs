//! Shared application state for Axum routers.

use std::sync::Arc;

use procura_core::LifecycleConfig;
use procura_parser::ParsingService;
use procura_storage::ProcurementStore;
use tokio_util::sync::CancellationToken;

use crate::config::ApiConfig;
use crate::jobs::{OrderEnrichment, ThreadLinkConfig, ThreadLinkRegistry};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProcurementStore>,
    pub parser: Arc<dyn ParsingService>,
    pub lifecycle: Arc<LifecycleConfig>,
    pub api_config: Arc<ApiConfig>,
    /// Pending thread-link watches.
    pub links: Arc<ThreadLinkRegistry>,
    pub enrichment: Arc<OrderEnrichment>,
    /// Cancelled on shutdown. Link watches and chat polls hang off it.
    pub shutdown: CancellationToken,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ProcurementStore>,
        parser: Arc<dyn ParsingService>,
        lifecycle: LifecycleConfig,
        api_config: ApiConfig,
        link_config: ThreadLinkConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let links = Arc::new(
            ThreadLinkRegistry::new(store.clone(), parser.clone(), link_config)
                .with_parent(&shutdown),
        );
        let enrichment = Arc::new(OrderEnrichment::new(store.clone(), parser.clone()));

        Self {
            store,
            parser,
            lifecycle: Arc::new(lifecycle),
            api_config: Arc::new(api_config),
            links,
            enrichment,
            shutdown,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn ProcurementStore>, store);
crate::impl_from_ref!(Arc<dyn ParsingService>, parser);
crate::impl_from_ref!(Arc<LifecycleConfig>, lifecycle);
crate::impl_from_ref!(Arc<ThreadLinkRegistry>, links);
crate::impl_from_ref!(Arc<OrderEnrichment>, enrichment);
crate::impl_from_ref!(std::time::Instant, start_time);
