//! Tenant-scoped loaders and audit helpers shared by the services

use procura_core::{
    ActivityLogEntry, Message, MessageId, Order, OrderId, QuoteRequest, QuoteRequestId,
    SupplierThread, TenantId, ThreadId,
};
use procura_storage::ProcurementStore;

use crate::error::{ApiError, ApiResult};

/// Load a quote request owned by `tenant_id`.
///
/// Another tenant's record reads as not found.
pub async fn load_quote_request(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: QuoteRequestId,
) -> ApiResult<QuoteRequest> {
    store
        .quote_request_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("QuoteRequest", id))
}

pub async fn load_thread(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: ThreadId,
) -> ApiResult<SupplierThread> {
    store
        .thread_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("SupplierThread", id))
}

pub async fn load_message(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: MessageId,
) -> ApiResult<Message> {
    store
        .message_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Message", id))
}

pub async fn load_order(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: OrderId,
) -> ApiResult<Order> {
    store
        .order_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Order", id))
}

/// Append an audit entry for an operation that has already committed.
///
/// A failed append is logged; the committed operation still succeeds.
pub async fn append_activity(store: &dyn ProcurementStore, entry: ActivityLogEntry) {
    if let Err(e) = store.activity_append(&entry).await {
        tracing::error!(
            kind = ?entry.kind,
            subject_id = %entry.subject_id,
            error = %e,
            "Failed to append activity log entry"
        );
    }
}
