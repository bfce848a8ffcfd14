//! Quote Request REST API Routes
//!
//! Intake, sending, supplier management, conversion, follow-ups, the
//! assistant chat and the activity log of quote requests.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use procura_core::QuoteRequestId;

use crate::{
    auth::Actor,
    error::{ApiError, ApiResult},
    services,
    state::AppState,
    types::{
        AcceptOutcome, AcceptPreview, AcceptPreviewQuery, AddSupplierRequest, ChatPostOutcome,
        CreateQuoteRequest, PostChatRequest, QuoteRequestDetail, RecordPricingRequest,
        RejectOutcome, ThreadSelection,
    },
};

// ============================================================================
// INTAKE
// ============================================================================

/// POST /api/v1/quote-requests - Create a DRAFT quote request
#[utoipa::path(
    post,
    path = "/api/v1/quote-requests",
    tag = "Quote Requests",
    request_body = CreateQuoteRequest,
    responses(
        (status = 201, description = "Quote request created", body = procura_core::QuoteRequest),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Missing actor headers", body = ApiError),
        (status = 403, description = "Role may not mutate", body = ApiError),
    ),
)]
pub async fn create_quote_request(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateQuoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let qr = services::create_quote_request(state.store.as_ref(), &actor, req).await?;
    Ok((StatusCode::CREATED, Json(qr)))
}

/// GET /api/v1/quote-requests/{id} - Quote request with threads
#[utoipa::path(
    get,
    path = "/api/v1/quote-requests/{id}",
    tag = "Quote Requests",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    responses(
        (status = 200, description = "Quote request with a freshly derived status", body = QuoteRequestDetail),
        (status = 404, description = "Quote request not found", body = ApiError),
    ),
)]
pub async fn get_quote_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
) -> ApiResult<Json<QuoteRequestDetail>> {
    let detail = services::get_quote_request(state.store.as_ref(), actor.tenant_id, id).await?;
    Ok(Json(detail))
}

/// POST /api/v1/quote-requests/{id}/send - Send the RFQ to every invited supplier
#[utoipa::path(
    post,
    path = "/api/v1/quote-requests/{id}/send",
    tag = "Quote Requests",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    responses(
        (status = 200, description = "Quote request sent", body = QuoteRequestDetail),
        (status = 409, description = "Not in DRAFT state", body = ApiError),
    ),
)]
pub async fn send_quote_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
) -> ApiResult<Json<QuoteRequestDetail>> {
    let detail = services::send_quote_request(
        state.store.as_ref(),
        &state.links,
        &state.lifecycle,
        &actor,
        id,
    )
    .await?;
    Ok(Json(detail))
}

/// POST /api/v1/quote-requests/{id}/suppliers - Invite another supplier
#[utoipa::path(
    post,
    path = "/api/v1/quote-requests/{id}/suppliers",
    tag = "Quote Requests",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    request_body = AddSupplierRequest,
    responses(
        (status = 201, description = "Supplier thread started", body = procura_core::SupplierThread),
        (status = 409, description = "Not negotiating, or supplier already invited", body = ApiError),
    ),
)]
pub async fn add_supplier(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
    Json(req): Json<AddSupplierRequest>,
) -> ApiResult<impl IntoResponse> {
    let thread = services::add_supplier(
        state.store.as_ref(),
        &state.links,
        &state.lifecycle,
        &actor,
        id,
        req,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

/// PUT /api/v1/quote-requests/{id}/pricing - Replace a supplier's priced lines
#[utoipa::path(
    put,
    path = "/api/v1/quote-requests/{id}/pricing",
    tag = "Quote Requests",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    request_body = RecordPricingRequest,
    responses(
        (status = 200, description = "Pricing recorded", body = procura_core::QuoteRequest),
        (status = 400, description = "Invalid pricing", body = ApiError),
    ),
)]
pub async fn record_pricing(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
    Json(req): Json<RecordPricingRequest>,
) -> ApiResult<impl IntoResponse> {
    let qr = services::record_pricing(state.store.as_ref(), &actor, id, req).await?;
    Ok(Json(qr))
}

// ============================================================================
// CONVERSION
// ============================================================================

/// GET /api/v1/quote-requests/{id}/accept-preview - What accepting a thread would do
#[utoipa::path(
    get,
    path = "/api/v1/quote-requests/{id}/accept-preview",
    tag = "Conversion",
    params(
        ("id" = uuid::Uuid, Path, description = "Quote request ID"),
        AcceptPreviewQuery,
    ),
    responses(
        (status = 200, description = "Accept preview", body = AcceptPreview),
        (status = 409, description = "Quote request cannot be accepted", body = ApiError),
    ),
)]
pub async fn preview_accept(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
    Query(query): Query<AcceptPreviewQuery>,
) -> ApiResult<Json<AcceptPreview>> {
    let preview =
        services::preview_accept(state.store.as_ref(), actor.tenant_id, id, query.thread_id)
            .await?;
    Ok(Json(preview))
}

/// POST /api/v1/quote-requests/{id}/accept - Accept a supplier and create the order
#[utoipa::path(
    post,
    path = "/api/v1/quote-requests/{id}/accept",
    tag = "Conversion",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    request_body = ThreadSelection,
    responses(
        (status = 201, description = "Order created", body = AcceptOutcome),
        (status = 400, description = "Thread does not match the request", body = ApiError),
        (status = 409, description = "Wrong state or concurrent accept", body = ApiError),
    ),
)]
pub async fn accept_quote(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
    Json(selection): Json<ThreadSelection>,
) -> ApiResult<impl IntoResponse> {
    let outcome = services::accept_quote(state.store.as_ref(), &actor, id, selection).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/v1/quote-requests/{id}/reject - Reject one supplier's quote
#[utoipa::path(
    post,
    path = "/api/v1/quote-requests/{id}/reject",
    tag = "Conversion",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    request_body = ThreadSelection,
    responses(
        (status = 200, description = "Thread rejected", body = RejectOutcome),
        (status = 409, description = "Not negotiating", body = ApiError),
    ),
)]
pub async fn reject_quote(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
    Json(selection): Json<ThreadSelection>,
) -> ApiResult<Json<RejectOutcome>> {
    let outcome = services::reject_quote(state.store.as_ref(), &actor, id, selection).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/quote-requests/{id}/reopen - Start a new negotiation round
#[utoipa::path(
    post,
    path = "/api/v1/quote-requests/{id}/reopen",
    tag = "Conversion",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    responses(
        (status = 200, description = "Quote request reopened", body = procura_core::QuoteRequest),
        (status = 409, description = "Not REJECTED or EXPIRED", body = ApiError),
    ),
)]
pub async fn reopen_quote_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
) -> ApiResult<impl IntoResponse> {
    let qr = services::reopen_quote_request(state.store.as_ref(), &actor, id).await?;
    Ok(Json(qr))
}

// ============================================================================
// FOLLOW-UPS, CHAT, ACTIVITY
// ============================================================================

/// GET /api/v1/quote-requests/{id}/overdue - Unanswered outbound messages
#[utoipa::path(
    get,
    path = "/api/v1/quote-requests/{id}/overdue",
    tag = "Follow-ups",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    responses(
        (status = 200, description = "Overdue messages, most overdue first", body = Vec<procura_lifecycle::OverdueMessage>),
    ),
)]
pub async fn list_overdue(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
) -> ApiResult<impl IntoResponse> {
    let overdue = services::list_overdue(state.store.as_ref(), actor.tenant_id, id).await?;
    Ok(Json(overdue))
}

/// GET /api/v1/quote-requests/{id}/chat - Consolidated assistant chat
#[utoipa::path(
    get,
    path = "/api/v1/quote-requests/{id}/chat",
    tag = "Assistant",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    responses(
        (status = 200, description = "Chat with duplicate replies folded", body = Vec<procura_lifecycle::ConsolidatedMessage>),
    ),
)]
pub async fn get_chat(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
) -> ApiResult<impl IntoResponse> {
    let chat =
        services::get_chat(state.store.as_ref(), &state.lifecycle, actor.tenant_id, id).await?;
    Ok(Json(chat))
}

/// POST /api/v1/quote-requests/{id}/chat - Ask the assistant
#[utoipa::path(
    post,
    path = "/api/v1/quote-requests/{id}/chat",
    tag = "Assistant",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    request_body = PostChatRequest,
    responses(
        (status = 200, description = "Reply, or PENDING if it is still being generated", body = ChatPostOutcome),
        (status = 503, description = "Assistant unavailable", body = ApiError),
    ),
)]
pub async fn post_chat_message(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
    Json(req): Json<PostChatRequest>,
) -> ApiResult<Json<ChatPostOutcome>> {
    let outcome = services::post_chat_message(
        state.store.as_ref(),
        state.parser.as_ref(),
        &state.api_config,
        &state.shutdown,
        &actor,
        id,
        req,
    )
    .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/quote-requests/{id}/activity - Audit trail
#[utoipa::path(
    get,
    path = "/api/v1/quote-requests/{id}/activity",
    tag = "Activity",
    params(("id" = uuid::Uuid, Path, description = "Quote request ID")),
    responses(
        (status = 200, description = "Activity entries, oldest first", body = Vec<procura_core::ActivityLogEntry>),
    ),
)]
pub async fn list_activity(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<QuoteRequestId>,
) -> ApiResult<impl IntoResponse> {
    let entries =
        services::list_quote_request_activity(state.store.as_ref(), actor.tenant_id, id).await?;
    Ok(Json(entries))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_quote_request))
        .route("/:id", get(get_quote_request))
        .route("/:id/send", post(send_quote_request))
        .route("/:id/suppliers", post(add_supplier))
        .route("/:id/pricing", put(record_pricing))
        .route("/:id/accept-preview", get(preview_accept))
        .route("/:id/accept", post(accept_quote))
        .route("/:id/reject", post(reject_quote))
        .route("/:id/reopen", post(reopen_quote_request))
        .route("/:id/overdue", get(list_overdue))
        .route("/:id/chat", get(get_chat).post(post_chat_message))
        .route("/:id/activity", get(list_activity))
}
