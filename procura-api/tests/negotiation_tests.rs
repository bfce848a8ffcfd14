//! Service-level scenarios spanning several lifecycle steps.

use std::sync::Arc;

use chrono::{Duration, Utc};
use procura_api::error::ErrorCode;
use procura_api::jobs::{sweep_once, OrderEnrichment, ResponseSweepConfig, ResponseSweepMetrics};
use procura_api::services;
use procura_api::{Actor, InboundMessageRequest, Role, ThreadSelection};
use procura_core::{
    ActorId, EntityIdType, LifecycleConfig, OrderStatus, QuoteRequestStatus, SupplierId,
    SupplierThreadStatus,
};
use procura_parser::{ParseResponse, ParsedOrderUpdates};
use procura_storage::ProcurementStore;
use procura_test_utils::fixtures::*;
use procura_test_utils::{MockParsingService, MockStorage};

fn buyer(tenant_id: procura_core::TenantId) -> Actor {
    Actor::new(ActorId::now_v7(), tenant_id, Role::Buyer)
}

fn status_update(status: &str) -> ParseResponse {
    ParseResponse {
        success: true,
        order_updates: Some(ParsedOrderUpdates {
            status: Some(status.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_concurrent_accepts_create_one_order() {
    let store = MockStorage::new();
    let tenant_id = tenant();
    let negotiation = seed_priced_negotiation(&store, tenant_id, 2).await.unwrap();
    let actor = buyer(tenant_id);
    let id = negotiation.quote_request.quote_request_id;
    let first = negotiation.threads[0].thread_id;
    let second = negotiation.threads[1].thread_id;

    let (a, b) = tokio::join!(
        services::accept_quote(
            &store,
            &actor,
            id,
            ThreadSelection {
                thread_id: Some(first),
                supplier_id: None
            }
        ),
        services::accept_quote(
            &store,
            &actor,
            id,
            ThreadSelection {
                thread_id: Some(second),
                supplier_id: None
            }
        ),
    );

    let (winner, loser) = match (a, b) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        other => panic!("expected exactly one accept to win, got {:?}", other),
    };
    assert!(matches!(
        loser.code,
        ErrorCode::ConcurrentModification | ErrorCode::StateConflict
    ));
    assert_eq!(
        winner.quote_request.status,
        QuoteRequestStatus::ConvertedToOrder
    );

    let mut orders = 0;
    for thread_id in [first, second] {
        if store
            .order_get_by_thread(thread_id, tenant_id)
            .await
            .unwrap()
            .is_some()
        {
            orders += 1;
        }
    }
    assert_eq!(orders, 1);
}

#[tokio::test]
async fn test_order_status_never_moves_backwards_until_cancelled() {
    let store = MockStorage::new();
    let tenant_id = tenant();
    let negotiation = seed_negotiation(&store, tenant_id, 1).await.unwrap();
    let thread = &negotiation.threads[0];
    let order = pending_order(thread, Utc::now() - Duration::minutes(30));
    store
        .order_insert(&order, &[order_item(&order, "BRK-100")])
        .await
        .unwrap();
    store
        .message_append(&supplier_reply(thread, "Shipped today", Utc::now()))
        .await
        .unwrap();

    let parser = MockParsingService::new()
        .with_parse_result(Ok(status_update("IN_TRANSIT")))
        .with_parse_result(Ok(status_update("PROCESSING")))
        .with_parse_result(Ok(status_update("CANCELED")))
        .with_parse_result(Ok(status_update("DELIVERED")));

    let expected = [
        (1, OrderStatus::InTransit),
        (0, OrderStatus::InTransit),
        (1, OrderStatus::Cancelled),
        (0, OrderStatus::Cancelled),
    ];
    for (applied, status) in expected {
        let outcome =
            services::sync_order_updates(&store, &parser, None, tenant_id, order.order_id)
                .await
                .unwrap();
        assert_eq!(outcome.applied, applied);
        let stored = store
            .order_get(order.order_id, tenant_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, status);
    }
    assert_eq!(parser.parse_calls(), 4);
}

#[tokio::test]
async fn test_silent_supplier_marked_then_revived_by_late_reply() {
    let store: Arc<dyn ProcurementStore> = Arc::new(MockStorage::new());
    let tenant_id = tenant();
    let supplier = SupplierId::now_v7();
    let qr = quote_request(tenant_id, QuoteRequestStatus::Sent, &[supplier]);
    store.quote_request_insert(&qr).await.unwrap();
    let t = thread(&qr, supplier, SupplierThreadStatus::Sent);
    store.thread_insert(&t).await.unwrap();
    // Due five days ago; the no-response grace period is four days.
    store
        .message_append(&rfq(&t, Duration::days(8), Duration::days(3)))
        .await
        .unwrap();

    let lifecycle = LifecycleConfig::default();
    let metrics = ResponseSweepMetrics::new();
    let marked = sweep_once(
        store.as_ref(),
        &lifecycle,
        &ResponseSweepConfig::default(),
        &metrics,
    )
    .await;
    assert_eq!(marked, 1);
    let swept = store.thread_get(t.thread_id, tenant_id).await.unwrap().unwrap();
    assert_eq!(swept.status, SupplierThreadStatus::NoResponse);

    let enrichment = Arc::new(OrderEnrichment::new(
        store.clone(),
        Arc::new(MockParsingService::new()),
    ));
    let (outcome, sync) = services::record_inbound(
        store.as_ref(),
        &enrichment,
        tenant_id,
        InboundMessageRequest {
            thread_id: t.thread_id,
            subject: Some("Re: Request for quote".to_string()),
            body: "Sorry for the delay, quote attached".to_string(),
            body_html: None,
            received_at: None,
            in_reply_to: None,
            attachments: Vec::new(),
            context: None,
        },
    )
    .await
    .unwrap();
    assert!(sync.is_none());
    assert_eq!(outcome.thread.status, SupplierThreadStatus::Responded);
    assert_eq!(outcome.quote_request_status, QuoteRequestStatus::UnderReview);

    // A replied thread is never swept again.
    let marked = sweep_once(
        store.as_ref(),
        &lifecycle,
        &ResponseSweepConfig::default(),
        &metrics,
    )
    .await;
    assert_eq!(marked, 0);
}

#[tokio::test]
async fn test_reject_everyone_then_reopen_starts_next_round() {
    let store = MockStorage::new();
    let tenant_id = tenant();
    let negotiation = seed_priced_negotiation(&store, tenant_id, 2).await.unwrap();
    let actor = buyer(tenant_id);
    let id = negotiation.quote_request.quote_request_id;

    let mut last = None;
    for t in &negotiation.threads {
        let outcome = services::reject_quote(
            &store,
            &actor,
            id,
            ThreadSelection {
                thread_id: Some(t.thread_id),
                supplier_id: None,
            },
        )
        .await
        .unwrap();
        last = Some(outcome.quote_request.status);
    }
    assert_eq!(last, Some(QuoteRequestStatus::Rejected));

    let reopened = services::reopen_quote_request(&store, &actor, id).await.unwrap();
    assert_eq!(reopened.status, QuoteRequestStatus::Sent);
    assert_eq!(reopened.round, negotiation.quote_request.round + 1);
}
