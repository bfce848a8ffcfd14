//! Message Ledger Service
//!
//! Appends supplier email to thread ledgers. Inbound mail arrives from the
//! mail integration's webhook; outbound mail is recorded by buyers who sent
//! it from their own client.

use std::sync::Arc;

use chrono::Utc;
use procura_core::{
    LifecycleConfig, Message, MessageId, SupplierThread, SupplierThreadStatus, TenantId, ThreadId,
};
use procura_storage::{ProcurementStore, ThreadUpdate};
use tokio::task::JoinHandle;

use super::lookup::{load_message, load_quote_request, load_thread};
use super::quote_service::refresh_quote_request_status;
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::jobs::{EnrichmentOutcome, OrderEnrichment};
use crate::types::{InboundMessageRequest, InboundOutcome, OutboundMessageRequest};

/// Thread statuses a supplier reply moves to RESPONDED.
const AWAITING_REPLY: [SupplierThreadStatus; 2] =
    [SupplierThreadStatus::Sent, SupplierThreadStatus::NoResponse];

async fn check_reply_target(
    store: &dyn ProcurementStore,
    thread: &SupplierThread,
    in_reply_to: Option<MessageId>,
) -> ApiResult<()> {
    let Some(id) = in_reply_to else {
        return Ok(());
    };
    let original = load_message(store, thread.tenant_id, id).await?;
    if original.thread_id != thread.thread_id {
        return Err(ApiError::validation_failed(format!(
            "Message {} belongs to another thread",
            id
        )));
    }
    Ok(())
}

/// Record a supplier email.
///
/// The message is appended first. Once it is stored the call succeeds:
/// the follow-on steps (thread to RESPONDED, quote request re-derivation,
/// background sync of an existing order) are best effort, and a failure in
/// one of them is logged and leaves the outcome at what was already
/// recorded. The returned handle belongs to the background sync.
///
/// # Errors
/// Returns error if the thread or its quote request is unknown, the body is
/// empty, `in_reply_to` names a message of another thread, or the message
/// cannot be appended.
pub async fn record_inbound(
    store: &dyn ProcurementStore,
    enrichment: &Arc<OrderEnrichment>,
    tenant_id: TenantId,
    req: InboundMessageRequest,
) -> ApiResult<(InboundOutcome, Option<JoinHandle<EnrichmentOutcome>>)> {
    if req.body.trim().is_empty() && req.attachments.is_empty() {
        return Err(ApiError::missing_field("body"));
    }
    let thread = load_thread(store, tenant_id, req.thread_id).await?;
    check_reply_target(store, &thread, req.in_reply_to).await?;
    let qr = load_quote_request(store, tenant_id, thread.quote_request_id).await?;

    let mut message = Message::inbound(
        thread.thread_id,
        tenant_id,
        req.body,
        req.received_at.unwrap_or_else(Utc::now),
    );
    message.subject = req.subject;
    message.body_html = req.body_html;
    message.in_reply_to = req.in_reply_to;
    message.attachments = req.attachments;
    message.context = req.context;
    store.message_append(&message).await?;

    tracing::info!(
        thread_id = %thread.thread_id,
        message_id = %message.message_id,
        attachments = message.attachments.len(),
        "Inbound supplier message recorded"
    );

    let thread = mark_responded(store, thread).await;

    let quote_request_status = match refresh_quote_request_status(store, qr.clone()).await {
        Ok(refreshed) => refreshed.status,
        Err(e) => {
            tracing::error!(
                quote_request_id = %qr.quote_request_id,
                message_id = %message.message_id,
                error = %e,
                "Failed to re-derive quote request status after inbound message"
            );
            qr.status
        }
    };

    let (order_sync, handle) = match store.order_get_by_thread(thread.thread_id, tenant_id).await {
        Ok(Some(order)) => (
            Some(order.order_id),
            Some(enrichment.launch(tenant_id, order.order_id)),
        ),
        Ok(None) => (None, None),
        Err(e) => {
            tracing::error!(
                thread_id = %thread.thread_id,
                message_id = %message.message_id,
                error = %e,
                "Failed to look up order for inbound message, skipping sync"
            );
            (None, None)
        }
    };

    Ok((
        InboundOutcome {
            message,
            thread,
            quote_request_status,
            order_sync,
        },
        handle,
    ))
}

/// Move a thread awaiting a reply to RESPONDED. On any failure the thread
/// is returned as last read.
async fn mark_responded(store: &dyn ProcurementStore, thread: SupplierThread) -> SupplierThread {
    if !AWAITING_REPLY.contains(&thread.status) {
        return thread;
    }
    let result = store
        .thread_compare_and_set(
            thread.thread_id,
            thread.tenant_id,
            &AWAITING_REPLY,
            ThreadUpdate::status(SupplierThreadStatus::Responded),
        )
        .await;
    match result {
        Ok(updated) => updated,
        // Someone else moved the thread; their status stands.
        Err(e) if e.is_conflict() => {
            match store.thread_get(thread.thread_id, thread.tenant_id).await {
                Ok(Some(current)) => current,
                _ => thread,
            }
        }
        Err(e) => {
            tracing::error!(
                thread_id = %thread.thread_id,
                error = %e,
                "Failed to mark thread responded after inbound message"
            );
            thread
        }
    }
}

/// Record an email a buyer sent to a supplier outside the RFQ flow.
///
/// Without an explicit deadline the message expects an answer within the
/// configured response window.
///
/// # Errors
/// Returns error if the actor may not mutate, the thread is closed, or the
/// body is empty.
pub async fn record_outbound(
    store: &dyn ProcurementStore,
    lifecycle: &LifecycleConfig,
    actor: &Actor,
    thread_id: ThreadId,
    req: OutboundMessageRequest,
) -> ApiResult<Message> {
    actor.require_mutation()?;
    if req.body.trim().is_empty() {
        return Err(ApiError::missing_field("body"));
    }

    let thread = load_thread(store, actor.tenant_id, thread_id).await?;
    if !thread.status.is_open() {
        return Err(ApiError::state_conflict(format!(
            "Thread is in '{}' state, cannot send messages",
            thread.status
        )));
    }
    check_reply_target(store, &thread, req.in_reply_to).await?;

    let sent_at = req.sent_at.unwrap_or_else(Utc::now);
    let expected = req
        .expected_response_by
        .unwrap_or(sent_at + lifecycle.response_window());
    if expected <= sent_at {
        return Err(ApiError::validation_failed(
            "expected_response_by must be after sent_at",
        ));
    }

    let mut message = Message::outbound(thread_id, actor.tenant_id, req.body, sent_at, Some(expected));
    message.subject = req.subject;
    message.body_html = req.body_html;
    message.in_reply_to = req.in_reply_to;
    store.message_append(&message).await?;

    tracing::info!(
        thread_id = %thread_id,
        message_id = %message.message_id,
        expected_response_by = %expected,
        "Outbound message recorded"
    );
    Ok(message)
}

/// A thread's ledger in effective-time order.
pub async fn list_thread_messages(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    thread_id: ThreadId,
) -> ApiResult<Vec<Message>> {
    load_thread(store, tenant_id, thread_id).await?;
    Ok(store.message_list_by_thread(thread_id, tenant_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::error::ErrorCode;
    use chrono::Duration;
    use procura_core::{ActorId, EntityIdType, QuoteRequestStatus};
    use procura_test_utils::fixtures::{pending_order, seed_negotiation};
    use procura_test_utils::{FailingStore, MockParsingService, MockStorage};

    fn enrichment(store: Arc<MockStorage>) -> Arc<OrderEnrichment> {
        Arc::new(OrderEnrichment::new(store, Arc::new(MockParsingService::new())))
    }

    fn inbound(thread_id: ThreadId, body: &str) -> InboundMessageRequest {
        InboundMessageRequest {
            thread_id,
            subject: Some("Re: Request for quote".to_string()),
            body: body.to_string(),
            body_html: None,
            received_at: None,
            in_reply_to: None,
            attachments: Vec::new(),
            context: None,
        }
    }

    fn outbound(body: &str) -> OutboundMessageRequest {
        OutboundMessageRequest {
            subject: None,
            body: body.to_string(),
            body_html: None,
            sent_at: None,
            expected_response_by: None,
            in_reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_inbound_marks_thread_responded_and_reviews_request() {
        let store = Arc::new(MockStorage::new());
        let n = seed_negotiation(store.as_ref(), TenantId::now_v7(), 2).await.unwrap();
        let thread = &n.threads[0];

        let (outcome, handle) = record_inbound(
            store.as_ref(),
            &enrichment(store.clone()),
            thread.tenant_id,
            inbound(thread.thread_id, "BRK-100 at $25 each, in stock"),
        )
        .await
        .unwrap();

        assert!(handle.is_none());
        assert_eq!(outcome.order_sync, None);
        assert_eq!(outcome.thread.status, SupplierThreadStatus::Responded);
        assert_eq!(outcome.quote_request_status, QuoteRequestStatus::UnderReview);
        assert!(outcome.message.is_inbound());

        let ledger = store
            .message_list_by_thread(thread.thread_id, thread.tenant_id)
            .await
            .unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_inbound_survives_follow_on_storage_failures() {
        let inner = Arc::new(MockStorage::new());
        let store = FailingStore::new(inner.clone())
            .fail_thread_transition_to(SupplierThreadStatus::Responded)
            .fail_quote_request_transition_to(QuoteRequestStatus::UnderReview);
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let thread = &n.threads[0];

        let (outcome, handle) = record_inbound(
            &store,
            &enrichment(inner.clone()),
            thread.tenant_id,
            inbound(thread.thread_id, "Quote attached"),
        )
        .await
        .unwrap();

        assert!(handle.is_none());
        assert_eq!(outcome.thread.status, SupplierThreadStatus::Sent);
        assert_eq!(outcome.quote_request_status, QuoteRequestStatus::Sent);
        let ledger = inner
            .message_list_by_thread(thread.thread_id, thread.tenant_id)
            .await
            .unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[1].message_id, outcome.message.message_id);
    }

    #[tokio::test]
    async fn test_inbound_on_ordered_thread_launches_sync() {
        let store = Arc::new(MockStorage::new());
        let n = seed_negotiation(store.as_ref(), TenantId::now_v7(), 1).await.unwrap();
        let thread = &n.threads[0];
        let order = pending_order(thread, Utc::now() - Duration::minutes(30));
        store.order_insert(&order, &[]).await.unwrap();

        let (outcome, handle) = record_inbound(
            store.as_ref(),
            &enrichment(store.clone()),
            thread.tenant_id,
            inbound(thread.thread_id, "Shipped via UPS"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.order_sync, Some(order.order_id));
        let sync = handle.unwrap().await.unwrap();
        assert_eq!(sync, EnrichmentOutcome::Success { applied: 0 });
    }

    #[tokio::test]
    async fn test_inbound_for_foreign_tenant_is_not_found() {
        let store = Arc::new(MockStorage::new());
        let n = seed_negotiation(store.as_ref(), TenantId::now_v7(), 1).await.unwrap();

        let err = record_inbound(
            store.as_ref(),
            &enrichment(store.clone()),
            TenantId::now_v7(),
            inbound(n.threads[0].thread_id, "hello"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert_eq!(store.message_count().await, 1);
    }

    #[tokio::test]
    async fn test_inbound_reply_to_other_thread_is_rejected() {
        let store = Arc::new(MockStorage::new());
        let n = seed_negotiation(store.as_ref(), TenantId::now_v7(), 2).await.unwrap();
        let other_ledger = store
            .message_list_by_thread(n.threads[1].thread_id, n.quote_request.tenant_id)
            .await
            .unwrap();

        let mut req = inbound(n.threads[0].thread_id, "Quote attached");
        req.in_reply_to = Some(other_ledger[0].message_id);
        let err = record_inbound(
            store.as_ref(),
            &enrichment(store.clone()),
            n.quote_request.tenant_id,
            req,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_outbound_gets_default_deadline() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let actor = Actor::new(ActorId::now_v7(), n.quote_request.tenant_id, Role::Buyer);
        let lifecycle = LifecycleConfig::default();

        let message = record_outbound(
            &store,
            &lifecycle,
            &actor,
            n.threads[0].thread_id,
            outbound("Could you confirm lead time?"),
        )
        .await
        .unwrap();

        let sent_at = message.sent_at.unwrap();
        assert_eq!(
            message.expected_response_by,
            Some(sent_at + lifecycle.response_window())
        );
        let ledger = list_thread_messages(&store, actor.tenant_id, n.threads[0].thread_id)
            .await
            .unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_outbound_on_closed_thread_conflicts() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let thread = &n.threads[0];
        store
            .thread_update(
                thread.thread_id,
                thread.tenant_id,
                ThreadUpdate::status(SupplierThreadStatus::Rejected),
            )
            .await
            .unwrap();
        let actor = Actor::new(ActorId::now_v7(), thread.tenant_id, Role::Admin);

        let err = record_outbound(
            &store,
            &LifecycleConfig::default(),
            &actor,
            thread.thread_id,
            outbound("Any update?"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::StateConflict);
    }

    #[tokio::test]
    async fn test_viewer_cannot_record_outbound() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let viewer = Actor::new(ActorId::now_v7(), n.quote_request.tenant_id, Role::Viewer);

        let err = record_outbound(
            &store,
            &LifecycleConfig::default(),
            &viewer,
            n.threads[0].thread_id,
            outbound("Any update?"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }
}
