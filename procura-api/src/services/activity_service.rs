//! Activity log reads

use procura_core::{ActivityLogEntry, EntityIdType, OrderId, QuoteRequestId, TenantId};
use procura_storage::ProcurementStore;

use super::lookup::{load_order, load_quote_request};
use crate::error::ApiResult;

pub async fn list_quote_request_activity(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: QuoteRequestId,
) -> ApiResult<Vec<ActivityLogEntry>> {
    load_quote_request(store, tenant_id, id).await?;
    Ok(store.activity_list(id.as_uuid(), tenant_id).await?)
}

pub async fn list_order_activity(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: OrderId,
) -> ApiResult<Vec<ActivityLogEntry>> {
    load_order(store, tenant_id, id).await?;
    Ok(store.activity_list(id.as_uuid(), tenant_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use procura_core::{ActivityKind, EntityType};
    use procura_test_utils::fixtures::seed_negotiation;
    use procura_test_utils::MockStorage;

    #[tokio::test]
    async fn test_lists_entries_of_owned_request_only() {
        let store = MockStorage::new();
        let n = seed_negotiation(&store, TenantId::now_v7(), 1).await.unwrap();
        let qr = &n.quote_request;
        store
            .activity_append(&ActivityLogEntry::new(
                qr.tenant_id,
                EntityType::QuoteRequest,
                qr.quote_request_id.as_uuid(),
                ActivityKind::QuoteSent,
                "Quote request sent to 1 suppliers",
            ))
            .await
            .unwrap();

        let entries = list_quote_request_activity(&store, qr.tenant_id, qr.quote_request_id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);

        let err = list_quote_request_activity(&store, TenantId::now_v7(), qr.quote_request_id)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let store = MockStorage::new();
        let err = list_order_activity(&store, TenantId::now_v7(), OrderId::now_v7())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }
}
