//! Background Order Enrichment
//!
//! An inbound supplier email on a thread that already has an order triggers
//! an order sync. The sync is best-effort: it runs on its own task, never
//! fails the request that received the email, and records how it ended.
//!
//! Outcomes:
//!
//! - `Success`: the sync ran; `applied` fields changed
//! - `Swallowed`: the parsing service failed or timed out
//! - `Failed`: anything else, typically the store

use chrono::Utc;
use dashmap::DashMap;
use procura_core::{OrderId, TenantId, Timestamp};
use procura_parser::ParsingService;
use procura_storage::ProcurementStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::services::sync_order_updates;

/// How a background sync ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentOutcome {
    Success { applied: usize },
    Swallowed { reason: String },
    Failed { reason: String },
}

/// Last recorded outcome for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EnrichmentRecord {
    pub outcome: EnrichmentOutcome,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub finished_at: Timestamp,
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct EnrichmentMetrics {
    pub launched: AtomicU64,
    pub succeeded: AtomicU64,
    pub swallowed: AtomicU64,
    pub failed: AtomicU64,
}

impl EnrichmentMetrics {
    pub fn snapshot(&self) -> EnrichmentSnapshot {
        EnrichmentSnapshot {
            launched: self.launched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            swallowed: self.swallowed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSnapshot {
    pub launched: u64,
    pub succeeded: u64,
    pub swallowed: u64,
    pub failed: u64,
}

// ============================================================================
// LAUNCHER
// ============================================================================

/// Launches background order syncs and keeps their outcomes.
pub struct OrderEnrichment {
    store: Arc<dyn ProcurementStore>,
    parser: Arc<dyn ParsingService>,
    outcomes: DashMap<OrderId, EnrichmentRecord>,
    metrics: EnrichmentMetrics,
}

impl OrderEnrichment {
    pub fn new(store: Arc<dyn ProcurementStore>, parser: Arc<dyn ParsingService>) -> Self {
        Self {
            store,
            parser,
            outcomes: DashMap::new(),
            metrics: EnrichmentMetrics::default(),
        }
    }

    /// Spawn a sync for `order_id`. The handle is only for callers that
    /// want to wait; dropping it leaves the task running.
    pub fn launch(self: &Arc<Self>, tenant_id: TenantId, order_id: OrderId) -> JoinHandle<EnrichmentOutcome> {
        self.metrics.launched.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let outcome = match sync_order_updates(
                this.store.as_ref(),
                this.parser.as_ref(),
                None,
                tenant_id,
                order_id,
            )
            .await
            {
                Ok(sync) => {
                    this.metrics.succeeded.fetch_add(1, Ordering::Relaxed);
                    EnrichmentOutcome::Success {
                        applied: sync.applied,
                    }
                }
                Err(e) if e.is_external() => {
                    this.metrics.swallowed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        order_id = %order_id,
                        error = %e,
                        "Background order sync skipped, parsing service unavailable"
                    );
                    EnrichmentOutcome::Swallowed { reason: e.message }
                }
                Err(e) => {
                    this.metrics.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(order_id = %order_id, error = %e, "Background order sync failed");
                    EnrichmentOutcome::Failed { reason: e.message }
                }
            };

            this.outcomes.insert(
                order_id,
                EnrichmentRecord {
                    outcome: outcome.clone(),
                    finished_at: Utc::now(),
                },
            );
            outcome
        })
    }

    pub fn last_outcome(&self, order_id: OrderId) -> Option<EnrichmentRecord> {
        self.outcomes.get(&order_id).map(|r| r.value().clone())
    }

    pub fn metrics(&self) -> EnrichmentSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for OrderEnrichment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderEnrichment")
            .field("parser", &self.parser.provider_name())
            .field("recorded", &self.outcomes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use procura_core::{EntityIdType, ParserError, ProcuraError};
    use procura_parser::{ParseResponse, ParsedOrderUpdates};
    use procura_test_utils::fixtures::{pending_order, seed_negotiation, supplier_reply};
    use procura_test_utils::{MockParsingService, MockStorage};

    async fn order_with_reply(store: &MockStorage) -> procura_core::Order {
        let n = seed_negotiation(store, TenantId::now_v7(), 1).await.unwrap();
        let order = pending_order(&n.threads[0], Utc::now() - Duration::minutes(30));
        store.order_insert(&order, &[]).await.unwrap();
        store
            .message_append(&supplier_reply(&n.threads[0], "Shipped today", Utc::now()))
            .await
            .unwrap();
        order
    }

    #[tokio::test]
    async fn test_success_is_recorded() {
        let store = Arc::new(MockStorage::new());
        let order = order_with_reply(&store).await;
        let parser = MockParsingService::new().with_parse_result(Ok(ParseResponse {
            success: true,
            order_updates: Some(ParsedOrderUpdates {
                tracking_number: Some("1Z999".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }));
        let enrichment = Arc::new(OrderEnrichment::new(store.clone(), Arc::new(parser)));

        let outcome = enrichment
            .launch(order.tenant_id, order.order_id)
            .await
            .unwrap();
        assert_eq!(outcome, EnrichmentOutcome::Success { applied: 1 });
        assert_eq!(
            enrichment.last_outcome(order.order_id).map(|r| r.outcome),
            Some(outcome)
        );
    }

    #[tokio::test]
    async fn test_parser_timeout_is_swallowed() {
        let store = Arc::new(MockStorage::new());
        let order = order_with_reply(&store).await;
        let parser = MockParsingService::new().with_parse_result(Err(ProcuraError::Parser(
            ParserError::Timeout {
                provider: "mock".to_string(),
                after_ms: 30_000,
            },
        )));
        let enrichment = Arc::new(OrderEnrichment::new(store.clone(), Arc::new(parser)));

        let outcome = enrichment
            .launch(order.tenant_id, order.order_id)
            .await
            .unwrap();
        assert!(matches!(outcome, EnrichmentOutcome::Swallowed { .. }));
        // The reason is the generic category, not the provider's detail.
        if let EnrichmentOutcome::Swallowed { reason } = outcome {
            assert!(!reason.contains("30000"));
        }
        assert_eq!(enrichment.metrics().swallowed, 1);
    }

    #[tokio::test]
    async fn test_missing_order_is_failed() {
        let store = Arc::new(MockStorage::new());
        let enrichment = Arc::new(OrderEnrichment::new(
            store,
            Arc::new(MockParsingService::new()),
        ));

        let outcome = enrichment
            .launch(TenantId::now_v7(), OrderId::now_v7())
            .await
            .unwrap();
        assert!(matches!(outcome, EnrichmentOutcome::Failed { .. }));
        assert_eq!(enrichment.metrics().failed, 1);
    }
}
