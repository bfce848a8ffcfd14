//! Assistant Chat Service
//!
//! Each quote request has a chat with the procurement assistant. Posting a
//! message asks the generation service for a reply under its long
//! interactive timeout. When that times out, the reply may still be written
//! to the chat ledger later through the assistant webhook, so the service
//! polls the ledger for a bounded time before reporting the reply as
//! pending.

use chrono::Utc;
use procura_core::{
    ChatMessage, LifecycleConfig, MessageRole, ProcuraError, QuoteRequestId, TenantId, Timestamp,
};
use procura_lifecycle::{consolidate, ConsolidatedMessage};
use procura_parser::{ChatRequest, ChatTurn, ParsingService};
use procura_storage::ProcurementStore;
use tokio_util::sync::CancellationToken;

use super::lookup::load_quote_request;
use crate::auth::Actor;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::types::{AssistantReplyRequest, ChatPostOutcome, ChatReplyState, PostChatRequest};

/// Post a user message and obtain the assistant's reply.
///
/// # Arguments
/// - `store`: Procurement store
/// - `parser`: Generation service
/// - `config`: Poll interval and budget used after a timeout
/// - `cancel`: Stops polling early; the reply is then reported as pending
/// - `actor`: Caller
/// - `id`: Quote request whose chat receives the message
///
/// # Errors
/// Returns error if the body is empty, the quote request is unknown, or the
/// generation service fails for a reason other than a timeout.
pub async fn post_chat_message(
    store: &dyn ProcurementStore,
    parser: &dyn ParsingService,
    config: &ApiConfig,
    cancel: &CancellationToken,
    actor: &Actor,
    id: QuoteRequestId,
    req: PostChatRequest,
) -> ApiResult<ChatPostOutcome> {
    actor.require_mutation()?;
    let prompt = req.body.trim();
    if prompt.is_empty() {
        return Err(ApiError::missing_field("body"));
    }
    load_quote_request(store, actor.tenant_id, id).await?;

    let history: Vec<ChatTurn> = store
        .chat_list(id, actor.tenant_id)
        .await?
        .into_iter()
        .map(|m| ChatTurn {
            role: m.role,
            body: m.body,
        })
        .collect();

    let user_message = ChatMessage::new(id, actor.tenant_id, MessageRole::User, prompt, Utc::now());
    store.chat_append(&user_message).await?;

    let request = ChatRequest {
        quote_request_id: id,
        history,
        prompt: prompt.to_string(),
    };

    let reply = match parser.generate_reply(&request).await {
        Ok(reply) => {
            let mut message = ChatMessage::new(
                id,
                actor.tenant_id,
                MessageRole::Assistant,
                reply.body,
                Utc::now(),
            );
            message.context = reply.context;
            store.chat_append(&message).await?;
            ChatReplyState::Ready { message }
        }
        Err(ProcuraError::Parser(e)) if e.is_timeout() => {
            tracing::warn!(
                quote_request_id = %id,
                error = %e,
                "Assistant reply timed out, polling chat ledger"
            );
            poll_for_reply(store, config, cancel, actor.tenant_id, id, user_message.created_at)
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ChatPostOutcome {
        user_message,
        reply,
    })
}

/// Poll the chat ledger for an assistant message written at or after
/// `since`, every `chat_poll_interval`, for at most `chat_poll_budget`.
async fn poll_for_reply(
    store: &dyn ProcurementStore,
    config: &ApiConfig,
    cancel: &CancellationToken,
    tenant_id: TenantId,
    id: QuoteRequestId,
    since: Timestamp,
) -> ApiResult<ChatReplyState> {
    let deadline = tokio::time::Instant::now() + config.chat_poll_budget;
    let mut interval = tokio::time::interval(config.chat_poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(quote_request_id = %id, "Chat poll cancelled");
                return Ok(ChatReplyState::Pending);
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::info!(quote_request_id = %id, "Assistant reply still pending");
                return Ok(ChatReplyState::Pending);
            }
            _ = interval.tick() => {}
        }

        let chat = store.chat_list(id, tenant_id).await?;
        if let Some(message) = chat
            .into_iter()
            .find(|m| m.role == MessageRole::Assistant && m.created_at >= since)
        {
            return Ok(ChatReplyState::Ready { message });
        }
    }
}

/// Store an assistant reply delivered after the interactive call gave up.
pub async fn append_assistant_reply(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    req: AssistantReplyRequest,
) -> ApiResult<ChatMessage> {
    if req.body.trim().is_empty() {
        return Err(ApiError::missing_field("body"));
    }
    load_quote_request(store, tenant_id, req.quote_request_id).await?;

    let mut message = ChatMessage::new(
        req.quote_request_id,
        tenant_id,
        MessageRole::Assistant,
        req.body,
        Utc::now(),
    );
    message.context = req.context;
    store.chat_append(&message).await?;

    tracing::info!(
        quote_request_id = %req.quote_request_id,
        chat_message_id = %message.chat_message_id,
        "Assistant reply delivered"
    );
    Ok(message)
}

/// The chat of a quote request with near-duplicate assistant replies folded.
pub async fn get_chat(
    store: &dyn ProcurementStore,
    lifecycle: &LifecycleConfig,
    tenant_id: TenantId,
    id: QuoteRequestId,
) -> ApiResult<Vec<ConsolidatedMessage>> {
    load_quote_request(store, tenant_id, id).await?;
    let chat = store.chat_list(id, tenant_id).await?;
    Ok(consolidate(&chat, lifecycle.consolidation_window()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::error::ErrorCode;
    use procura_core::{ActorId, EntityIdType, ParserError};
    use procura_test_utils::fixtures::seed_negotiation;
    use procura_test_utils::{MockParsingService, MockStorage};
    use std::sync::Arc;
    use std::time::Duration;

    fn poll_config() -> ApiConfig {
        ApiConfig {
            chat_poll_interval: Duration::from_secs(1),
            chat_poll_budget: Duration::from_secs(10),
            ..ApiConfig::default()
        }
    }

    fn timing_out() -> MockParsingService {
        MockParsingService::new().with_chat_result(Err(ProcuraError::Parser(
            ParserError::Timeout {
                provider: "mock".to_string(),
                after_ms: 180_000,
            },
        )))
    }

    fn ask(body: &str) -> PostChatRequest {
        PostChatRequest {
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reply_is_stored_when_ready() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let actor = Actor::new(ActorId::now_v7(), n.quote_request.tenant_id, Role::Buyer);
        let id = n.quote_request.quote_request_id;

        let outcome = post_chat_message(
            &store,
            &MockParsingService::new(),
            &poll_config(),
            &CancellationToken::new(),
            &actor,
            id,
            ask("cheapest brake pads?"),
        )
        .await
        .unwrap();

        match outcome.reply {
            ChatReplyState::Ready { message } => {
                assert_eq!(message.role, MessageRole::Assistant);
                assert_eq!(message.body, "Looking into \"cheapest brake pads?\" now.");
            }
            ChatReplyState::Pending => panic!("expected a ready reply"),
        }
        assert_eq!(store.chat_list(id, actor.tenant_id).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_picks_up_late_reply() {
        let store = Arc::new(MockStorage::new());
        let n = seed_negotiation(store.as_ref(), TenantId::now_v7(), 1).await.unwrap();
        let tenant_id = n.quote_request.tenant_id;
        let actor = Actor::new(ActorId::now_v7(), tenant_id, Role::Buyer);
        let id = n.quote_request.quote_request_id;

        let webhook_store = store.clone();
        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            append_assistant_reply(
                webhook_store.as_ref(),
                tenant_id,
                AssistantReplyRequest {
                    quote_request_id: id,
                    body: "Three suppliers stock BRK-100.".to_string(),
                    context: None,
                },
            )
            .await
            .unwrap()
        });

        let outcome = post_chat_message(
            store.as_ref(),
            &timing_out(),
            &poll_config(),
            &CancellationToken::new(),
            &actor,
            id,
            ask("who stocks BRK-100?"),
        )
        .await
        .unwrap();
        let delivered = late.await.unwrap();

        assert_eq!(outcome.reply, ChatReplyState::Ready { message: delivered });
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_reply_is_pending() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let actor = Actor::new(ActorId::now_v7(), n.quote_request.tenant_id, Role::Buyer);

        let outcome = post_chat_message(
            &store,
            &timing_out(),
            &poll_config(),
            &CancellationToken::new(),
            &actor,
            n.quote_request.quote_request_id,
            ask("status?"),
        )
        .await
        .unwrap();
        assert_eq!(outcome.reply, ChatReplyState::Pending);
        assert_eq!(outcome.user_message.role, MessageRole::User);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_poll_is_pending() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let actor = Actor::new(ActorId::now_v7(), n.quote_request.tenant_id, Role::Buyer);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = post_chat_message(
            &store,
            &timing_out(),
            &poll_config(),
            &cancel,
            &actor,
            n.quote_request.quote_request_id,
            ask("status?"),
        )
        .await
        .unwrap();
        assert_eq!(outcome.reply, ChatReplyState::Pending);
    }

    #[tokio::test]
    async fn test_other_generation_failure_surfaces() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let actor = Actor::new(ActorId::now_v7(), n.quote_request.tenant_id, Role::Buyer);
        let parser = MockParsingService::new()
            .with_chat_result(Err(ProcuraError::Parser(ParserError::NotConfigured)));

        let err = post_chat_message(
            &store,
            &parser,
            &poll_config(),
            &CancellationToken::new(),
            &actor,
            n.quote_request.quote_request_id,
            ask("status?"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_get_chat_folds_duplicate_replies() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let tenant_id = n.quote_request.tenant_id;
        let id = n.quote_request.quote_request_id;

        let now = Utc::now();
        for (role, body, offset) in [
            (MessageRole::User, "find pads", 0),
            (MessageRole::Assistant, "Found 12 parts matching", 1),
            (MessageRole::Assistant, "Found 9 parts matching", 5),
        ] {
            store
                .chat_append(&ChatMessage::new(
                    id,
                    tenant_id,
                    role,
                    body,
                    now + chrono::Duration::seconds(offset),
                ))
                .await
                .unwrap();
        }

        let chat = get_chat(&store, &LifecycleConfig::default(), tenant_id, id)
            .await
            .unwrap();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[1].alternates.len(), 1);
        assert_eq!(chat[1].primary.body, "Found 12 parts matching");
    }

    #[tokio::test]
    async fn test_viewer_cannot_post() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let viewer = Actor::new(ActorId::now_v7(), n.quote_request.tenant_id, Role::Viewer);

        let err = post_chat_message(
            &store,
            &MockParsingService::new(),
            &poll_config(),
            &CancellationToken::new(),
            &viewer,
            n.quote_request.quote_request_id,
            ask("hello"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
        let chat = store
            .chat_list(n.quote_request.quote_request_id, n.quote_request.tenant_id)
            .await
            .unwrap();
        assert!(chat.is_empty());
    }
}
