//! Order REST API Routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use procura_core::OrderId;
use procura_storage::ProcurementStore;

use crate::{
    auth::Actor,
    error::{ApiError, ApiResult},
    jobs::OrderEnrichment,
    services,
    state::AppState,
    types::{OrderResponse, SyncOutcome},
};

/// GET /api/v1/orders/{id} - Order with items and background sync state
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "Orders",
    params(("id" = uuid::Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order details", body = OrderResponse),
        (status = 404, description = "Order not found", body = ApiError),
    ),
)]
pub async fn get_order(
    State(store): State<Arc<dyn ProcurementStore>>,
    State(enrichment): State<Arc<OrderEnrichment>>,
    actor: Actor,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<OrderResponse>> {
    let detail = services::get_order(store.as_ref(), actor.tenant_id, id).await?;
    Ok(Json(OrderResponse {
        detail,
        last_background_sync: enrichment.last_outcome(id),
    }))
}

/// POST /api/v1/orders/{id}/sync - Reconcile the order against later supplier mail
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/sync",
    tag = "Orders",
    params(("id" = uuid::Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Fields updated by the sync", body = SyncOutcome),
        (status = 503, description = "Parsing service unavailable", body = ApiError),
        (status = 504, description = "Parsing service timed out", body = ApiError),
    ),
)]
pub async fn sync_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<SyncOutcome>> {
    actor.require_mutation()?;
    let outcome = services::sync_order_updates(
        state.store.as_ref(),
        state.parser.as_ref(),
        Some(actor.actor_id),
        actor.tenant_id,
        id,
    )
    .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/orders/{id}/activity - Audit trail of an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/activity",
    tag = "Activity",
    params(("id" = uuid::Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Activity entries, oldest first", body = Vec<procura_core::ActivityLogEntry>),
    ),
)]
pub async fn list_activity(
    State(store): State<Arc<dyn ProcurementStore>>,
    actor: Actor,
    Path(id): Path<OrderId>,
) -> ApiResult<impl IntoResponse> {
    let entries = services::list_order_activity(store.as_ref(), actor.tenant_id, id).await?;
    Ok(Json(entries))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_order))
        .route("/:id/sync", post(sync_order))
        .route("/:id/activity", get(list_activity))
}
