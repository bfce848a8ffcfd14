//! Follow-up Service
//!
//! Lists unanswered outbound messages and sends generated reminders for
//! them.

use chrono::Utc;
use futures_util::future::try_join_all;
use procura_core::{
    ActivityKind, ActivityLogEntry, EntityIdType, EntityType, LifecycleConfig, Message, MessageId,
    QuoteRequestId, SupplierThread, TenantId, ThreadId,
};
use procura_lifecycle::{detect_overdue, overdue_in_thread, OverdueMessage};
use procura_parser::{FollowUpRequest, LedgerMessage, ParsingService};
use procura_storage::ProcurementStore;
use serde_json::json;

use super::lookup::{append_activity, load_message, load_quote_request, load_thread};
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};

/// Overdue outbound messages across the open threads of a quote request,
/// most overdue first.
pub async fn list_overdue(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: QuoteRequestId,
) -> ApiResult<Vec<OverdueMessage>> {
    load_quote_request(store, tenant_id, id).await?;
    let threads = store.thread_list_by_quote_request(id, tenant_id).await?;
    let open: Vec<&SupplierThread> = threads.iter().filter(|t| t.status.is_open()).collect();

    let ledgers = try_join_all(
        open.iter()
            .map(|t| store.message_list_by_thread(t.thread_id, tenant_id)),
    )
    .await?;

    Ok(detect_overdue(
        ledgers.iter().map(Vec::as_slice),
        Utc::now(),
    ))
}

/// Generate and record a follow-up for an overdue message.
///
/// The reminder is appended as a new outbound message replying to the
/// original, with a fresh response deadline, and the original is stamped
/// so it stops being overdue.
///
/// # Errors
/// Returns `StateConflict` if the message is not currently overdue. Any
/// failure while generating or recording the reminder is reported as
/// "Failed to send follow-up"; the cause is logged.
pub async fn send_follow_up(
    store: &dyn ProcurementStore,
    parser: &dyn ParsingService,
    lifecycle: &LifecycleConfig,
    actor: &Actor,
    thread_id: ThreadId,
    message_id: MessageId,
) -> ApiResult<Message> {
    actor.require_mutation()?;
    let thread = load_thread(store, actor.tenant_id, thread_id).await?;
    let original = load_message(store, actor.tenant_id, message_id).await?;
    if original.thread_id != thread_id {
        return Err(ApiError::validation_failed(format!(
            "Message {} belongs to another thread",
            message_id
        )));
    }

    let ledger = store.message_list_by_thread(thread_id, actor.tenant_id).await?;
    let overdue = overdue_in_thread(&ledger, Utc::now())
        .into_iter()
        .find(|o| o.message_id == message_id)
        .ok_or_else(|| {
            ApiError::state_conflict(format!("Message {} is not awaiting a follow-up", message_id))
        })?;

    match deliver(store, parser, lifecycle, &thread, &original, &overdue).await {
        Ok(follow_up) => {
            append_activity(
                store,
                ActivityLogEntry::new(
                    actor.tenant_id,
                    EntityType::QuoteRequest,
                    thread.quote_request_id.as_uuid(),
                    ActivityKind::FollowUpSent,
                    format!(
                        "Follow-up sent to supplier {} after {} day(s)",
                        thread.supplier_id, overdue.days_overdue
                    ),
                )
                .with_actor(Some(actor.actor_id))
                .with_details(json!({
                    "thread_id": thread_id,
                    "original_message_id": message_id,
                    "follow_up_message_id": follow_up.message_id,
                })),
            )
            .await;
            tracing::info!(
                thread_id = %thread_id,
                original_message_id = %message_id,
                days_overdue = overdue.days_overdue,
                "Follow-up sent"
            );
            Ok(follow_up)
        }
        Err(e) => {
            tracing::error!(
                thread_id = %thread_id,
                original_message_id = %message_id,
                error = %e,
                "Failed to send follow-up"
            );
            Err(ApiError::service_unavailable("Failed to send follow-up"))
        }
    }
}

async fn deliver(
    store: &dyn ProcurementStore,
    parser: &dyn ParsingService,
    lifecycle: &LifecycleConfig,
    thread: &SupplierThread,
    original: &Message,
    overdue: &OverdueMessage,
) -> procura_core::ProcuraResult<Message> {
    let draft = parser
        .generate_follow_up(&FollowUpRequest {
            thread_id: thread.thread_id,
            supplier_id: thread.supplier_id,
            original: LedgerMessage::from(original),
            days_overdue: overdue.days_overdue,
        })
        .await?;

    let now = Utc::now();
    let mut follow_up = Message::outbound(
        thread.thread_id,
        thread.tenant_id,
        draft.body,
        now,
        Some(now + lifecycle.response_window()),
    );
    follow_up.subject = draft
        .subject
        .or_else(|| original.subject.as_ref().map(|s| format!("Re: {}", s)));
    follow_up.in_reply_to = Some(original.message_id);

    store.message_append(&follow_up).await?;
    store
        .message_mark_follow_up_sent(original.message_id, thread.tenant_id, now)
        .await?;
    Ok(follow_up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::error::ErrorCode;
    use chrono::Duration;
    use procura_core::{ActorId, ParserError, ProcuraError};
    use procura_test_utils::fixtures::{rfq, seed_negotiation, supplier_reply};
    use procura_test_utils::{MockParsingService, MockStorage};

    async fn seed_overdue(store: &MockStorage) -> (SupplierThread, Message) {
        let n = seed_negotiation(store, TenantId::now_v7(), 2).await.unwrap();
        let thread = n.threads[0].clone();
        let overdue = rfq(&thread, Duration::days(5), Duration::days(3));
        store.message_append(&overdue).await.unwrap();
        (thread, overdue)
    }

    fn buyer(tenant_id: TenantId) -> Actor {
        Actor::new(ActorId::now_v7(), tenant_id, Role::Buyer)
    }

    #[tokio::test]
    async fn test_list_overdue_finds_only_past_deadlines() {
        let store = MockStorage::new();
        let (thread, overdue) = seed_overdue(&store).await;

        let listed = list_overdue(&store, thread.tenant_id, thread.quote_request_id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message_id, overdue.message_id);
        assert_eq!(listed[0].days_overdue, 2);
    }

    #[tokio::test]
    async fn test_reply_clears_overdue() {
        let store = MockStorage::new();
        let (thread, _) = seed_overdue(&store).await;
        store
            .message_append(&supplier_reply(&thread, "Sorry for the delay", Utc::now()))
            .await
            .unwrap();

        let listed = list_overdue(&store, thread.tenant_id, thread.quote_request_id)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_send_follow_up_replies_and_stamps_original() {
        let store = MockStorage::new();
        let parser = MockParsingService::new();
        let lifecycle = LifecycleConfig::default();
        let (thread, overdue) = seed_overdue(&store).await;

        let follow_up = send_follow_up(
            &store,
            &parser,
            &lifecycle,
            &buyer(thread.tenant_id),
            thread.thread_id,
            overdue.message_id,
        )
        .await
        .unwrap();

        assert_eq!(follow_up.in_reply_to, Some(overdue.message_id));
        assert_eq!(follow_up.subject.as_deref(), Some("Re: Request for quote"));
        assert!(follow_up.expected_response_by.unwrap() > Utc::now());
        assert_eq!(parser.follow_up_calls(), 1);

        let original = store
            .message_get(overdue.message_id, thread.tenant_id)
            .await
            .unwrap()
            .unwrap();
        assert!(original.follow_up_sent_at.is_some());

        let listed = list_overdue(&store, thread.tenant_id, thread.quote_request_id)
            .await
            .unwrap();
        assert!(listed.is_empty());

        let activity = store
            .activity_list(thread.quote_request_id.as_uuid(), thread.tenant_id)
            .await
            .unwrap();
        assert_eq!(activity.last().map(|a| a.kind), Some(ActivityKind::FollowUpSent));
    }

    #[tokio::test]
    async fn test_message_not_overdue_conflicts() {
        let store = MockStorage::new();
        let parser = MockParsingService::new();
        let (thread, _) = seed_overdue(&store).await;
        let ledger = store
            .message_list_by_thread(thread.thread_id, thread.tenant_id)
            .await
            .unwrap();
        let fresh = ledger
            .iter()
            .find(|m| m.expected_response_by.map_or(false, |d| d > Utc::now()))
            .unwrap();

        let err = send_follow_up(
            &store,
            &parser,
            &LifecycleConfig::default(),
            &buyer(thread.tenant_id),
            thread.thread_id,
            fresh.message_id,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::StateConflict);
        assert_eq!(parser.follow_up_calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_generic_and_leaves_original() {
        let store = MockStorage::new();
        let parser = MockParsingService::new().with_follow_up_result(Err(ProcuraError::Parser(
            ParserError::RequestFailed {
                provider: "mock".to_string(),
                status: 502,
                message: "upstream exploded: token=abc".to_string(),
            },
        )));
        let (thread, overdue) = seed_overdue(&store).await;

        let err = send_follow_up(
            &store,
            &parser,
            &LifecycleConfig::default(),
            &buyer(thread.tenant_id),
            thread.thread_id,
            overdue.message_id,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
        assert_eq!(err.message, "Failed to send follow-up");

        let original = store
            .message_get(overdue.message_id, thread.tenant_id)
            .await
            .unwrap()
            .unwrap();
        assert!(original.follow_up_sent_at.is_none());
    }
}
