//! Supplier Thread REST API Routes
//!
//! Message ledger reads and writes, follow-ups, and the thread-link watch.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use procura_core::{MessageId, ThreadId};

use crate::{
    auth::Actor,
    error::{ApiError, ApiResult},
    services,
    state::AppState,
    types::{LinkWatchCancelled, OutboundMessageRequest},
};

/// GET /api/v1/threads/{id}/messages - A thread's ledger
#[utoipa::path(
    get,
    path = "/api/v1/threads/{id}/messages",
    tag = "Threads",
    params(("id" = uuid::Uuid, Path, description = "Thread ID")),
    responses(
        (status = 200, description = "Messages in effective-time order", body = Vec<procura_core::Message>),
        (status = 404, description = "Thread not found", body = ApiError),
    ),
)]
pub async fn list_messages(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<ThreadId>,
) -> ApiResult<impl IntoResponse> {
    let messages =
        services::list_thread_messages(state.store.as_ref(), actor.tenant_id, id).await?;
    Ok(Json(messages))
}

/// POST /api/v1/threads/{id}/messages - Record an outbound message
#[utoipa::path(
    post,
    path = "/api/v1/threads/{id}/messages",
    tag = "Threads",
    params(("id" = uuid::Uuid, Path, description = "Thread ID")),
    request_body = OutboundMessageRequest,
    responses(
        (status = 201, description = "Message recorded", body = procura_core::Message),
        (status = 409, description = "Thread is closed", body = ApiError),
    ),
)]
pub async fn record_outbound(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<ThreadId>,
    Json(req): Json<OutboundMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message =
        services::record_outbound(state.store.as_ref(), &state.lifecycle, &actor, id, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/v1/threads/{id}/messages/{message_id}/follow-up - Send a reminder
#[utoipa::path(
    post,
    path = "/api/v1/threads/{id}/messages/{message_id}/follow-up",
    tag = "Follow-ups",
    params(
        ("id" = uuid::Uuid, Path, description = "Thread ID"),
        ("message_id" = uuid::Uuid, Path, description = "Overdue outbound message ID"),
    ),
    responses(
        (status = 201, description = "Follow-up sent", body = procura_core::Message),
        (status = 409, description = "Message is not overdue", body = ApiError),
        (status = 503, description = "Failed to send follow-up", body = ApiError),
    ),
)]
pub async fn send_follow_up(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, message_id)): Path<(ThreadId, MessageId)>,
) -> ApiResult<impl IntoResponse> {
    let follow_up = services::send_follow_up(
        state.store.as_ref(),
        state.parser.as_ref(),
        &state.lifecycle,
        &actor,
        id,
        message_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(follow_up)))
}

/// DELETE /api/v1/threads/{id}/link-watch - Stop waiting for the mail backend
#[utoipa::path(
    delete,
    path = "/api/v1/threads/{id}/link-watch",
    tag = "Threads",
    params(("id" = uuid::Uuid, Path, description = "Thread ID")),
    responses(
        (status = 200, description = "Watch state after cancelling", body = LinkWatchCancelled),
        (status = 404, description = "Thread not found", body = ApiError),
    ),
)]
pub async fn cancel_link_watch(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<ThreadId>,
) -> ApiResult<Json<LinkWatchCancelled>> {
    actor.require_mutation()?;
    services::load_thread(state.store.as_ref(), actor.tenant_id, id).await?;
    let cancelled = state.links.cancel(id);
    tracing::info!(thread_id = %id, cancelled, "Thread link watch cancel requested");
    Ok(Json(LinkWatchCancelled {
        thread_id: id,
        cancelled,
    }))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:id/messages", get(list_messages).post(record_outbound))
        .route("/:id/messages/:message_id/follow-up", post(send_follow_up))
        .route("/:id/link-watch", delete(cancel_link_watch))
}
