//! Integration Webhooks
//!
//! Called by the mail integration and the generation service, not by
//! users. Both still present actor headers; the gateway issues the
//! integrations a service identity with a mutating role.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::{
    auth::Actor,
    error::{ApiError, ApiResult},
    services,
    state::AppState,
    types::{AssistantReplyRequest, InboundMessageRequest, InboundOutcome},
};

/// POST /api/v1/webhooks/inbound-email - A supplier email arrived
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/inbound-email",
    tag = "Webhooks",
    request_body = InboundMessageRequest,
    responses(
        (status = 202, description = "Message recorded; any order sync runs in the background", body = InboundOutcome),
        (status = 404, description = "Thread not found", body = ApiError),
    ),
)]
pub async fn inbound_email(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<InboundMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    actor.require_mutation()?;
    // The sync handle is dropped; the task keeps running and records its
    // own outcome.
    let (outcome, _sync) = services::record_inbound(
        state.store.as_ref(),
        &state.enrichment,
        actor.tenant_id,
        req,
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// POST /api/v1/webhooks/assistant-reply - A late assistant reply
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/assistant-reply",
    tag = "Webhooks",
    request_body = AssistantReplyRequest,
    responses(
        (status = 201, description = "Reply appended to the chat", body = procura_core::ChatMessage),
        (status = 404, description = "Quote request not found", body = ApiError),
    ),
)]
pub async fn assistant_reply(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<AssistantReplyRequest>,
) -> ApiResult<impl IntoResponse> {
    actor.require_mutation()?;
    let message =
        services::append_assistant_reply(state.store.as_ref(), actor.tenant_id, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/inbound-email", post(inbound_email))
        .route("/assistant-reply", post(assistant_reply))
}
