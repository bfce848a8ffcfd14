//! Tracking Service
//!
//! Reconciles an order against the supplier emails that arrived after it
//! was created. The parsing service reads the messages; the merge rules in
//! `procura-lifecycle` decide which of its candidate values are stored.

use futures_util::future::join_all;
use procura_core::{
    ActivityKind, ActivityLogEntry, ActorId, EntityIdType, EntityType, Order, OrderId,
    OrderItem, OrderStatus, ProcuraError, ProcuraResult, StorageError, TenantId,
};
use procura_lifecycle::{
    apply_item_update, apply_order_update, post_creation_messages, ItemUpdate, OrderUpdate,
};
use procura_parser::{
    LedgerMessage, OrderSnapshot, ParseRequest, ParsedItemUpdate, ParsedOrderUpdates,
    ParsingService,
};
use procura_storage::ProcurementStore;
use serde_json::json;
use uuid::Uuid;

use super::lookup::{append_activity, load_order};
use crate::error::ApiResult;
use crate::types::{OrderDetail, SyncOutcome};

/// Guarded writes attempted before a sync gives up on a contended record.
const MAX_MERGE_ATTEMPTS: usize = 3;

/// Fetch an order with its items.
pub async fn get_order(
    store: &dyn ProcurementStore,
    tenant_id: TenantId,
    id: OrderId,
) -> ApiResult<OrderDetail> {
    let order = load_order(store, tenant_id, id).await?;
    let items = store.order_item_list(id, tenant_id).await?;
    Ok(OrderDetail { order, items })
}

/// Turn the parser's order-level candidates into a typed update.
///
/// A status string outside the known set is dropped rather than failing the
/// whole sync.
pub fn order_update_from(parsed: ParsedOrderUpdates, order_id: OrderId) -> OrderUpdate {
    let status = parsed.status.as_deref().and_then(|raw| {
        match OrderStatus::from_db_str(raw) {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!(order_id = %order_id, error = %e, "Ignoring unknown order status from parser");
                None
            }
        }
    });

    OrderUpdate {
        tracking_number: parsed.tracking_number,
        shipping_carrier: parsed.shipping_carrier,
        expected_delivery: parsed.expected_delivery,
        status,
    }
}

pub fn item_update_from(parsed: ParsedItemUpdate) -> ItemUpdate {
    ItemUpdate {
        order_item_id: parsed.id,
        availability: parsed.availability,
        tracking_number: parsed.tracking_number,
        expected_delivery: parsed.expected_delivery,
        actual_delivery: parsed.actual_delivery,
    }
}

/// Merge one item update and store it if anything changed.
///
/// The write is guarded on the item's `updated_at`; if another sync got
/// there first the item is re-read and the same update merged again.
async fn merge_item(
    store: &dyn ProcurementStore,
    mut item: OrderItem,
    update: ItemUpdate,
) -> ProcuraResult<usize> {
    for _ in 0..MAX_MERGE_ATTEMPTS {
        let loaded_at = item.updated_at;
        let applied = apply_item_update(&mut item, &update);
        if applied == 0 {
            return Ok(0);
        }
        match store.order_item_compare_and_set(&item, loaded_at).await {
            Ok(()) => return Ok(applied),
            Err(e) if e.is_conflict() => {
                tracing::debug!(order_item_id = %item.order_item_id, "Item moved during sync, re-merging");
                item = store
                    .order_item_list(item.order_id, item.tenant_id)
                    .await?
                    .into_iter()
                    .find(|i| i.order_item_id == update.order_item_id)
                    .ok_or_else(|| {
                        ProcuraError::not_found(EntityType::OrderItem, update.order_item_id)
                    })?;
            }
            Err(e) => return Err(e),
        }
    }
    Err(contended(EntityType::OrderItem, update.order_item_id.as_uuid()))
}

/// Merge the order-level update and store it if anything changed.
///
/// Returns the number of fields applied and the order as stored.
async fn merge_order(
    store: &dyn ProcurementStore,
    mut order: Order,
    update: &OrderUpdate,
) -> ApiResult<(usize, Order)> {
    for _ in 0..MAX_MERGE_ATTEMPTS {
        let loaded_at = order.updated_at;
        let applied = apply_order_update(&mut order, update);
        if applied == 0 {
            return Ok((0, order));
        }
        match store.order_compare_and_set(&order, loaded_at).await {
            Ok(()) => return Ok((applied, order)),
            Err(e) if e.is_conflict() => {
                tracing::debug!(order_id = %order.order_id, "Order moved during sync, re-merging");
                order = load_order(store, order.tenant_id, order.order_id).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(contended(EntityType::Order, order.order_id.as_uuid()).into())
}

fn contended(entity_type: EntityType, id: Uuid) -> ProcuraError {
    ProcuraError::Storage(StorageError::Conflict {
        entity_type,
        id,
        expected: "unchanged record".to_string(),
        actual: "concurrently updated".to_string(),
    })
}

/// Sync an order from its post-creation messages.
///
/// Sends only the messages whose effective time is after the order's
/// creation to the parsing service and merges the candidates it returns.
/// Item merges run concurrently and fail independently; the order itself
/// is written only if one of its fields changed, and an audit entry is
/// added only if anything changed at all. Running it again on the same
/// ledger applies nothing. Writes are guarded, so concurrent syncs of the
/// same order re-merge against each other's results instead of
/// overwriting them.
///
/// # Arguments
/// - `store`: Procurement store
/// - `parser`: Parsing service
/// - `actor_id`: Caller, or `None` for background syncs
/// - `tenant_id`: Owning tenant
/// - `order_id`: Order to sync
///
/// # Errors
/// Returns error if the order is missing, the parsing service fails, or
/// the order record cannot be written.
pub async fn sync_order_updates(
    store: &dyn ProcurementStore,
    parser: &dyn ParsingService,
    actor_id: Option<ActorId>,
    tenant_id: TenantId,
    order_id: OrderId,
) -> ApiResult<SyncOutcome> {
    let order = load_order(store, tenant_id, order_id).await?;
    let items = store.order_item_list(order_id, tenant_id).await?;
    let ledger = store.message_list_by_thread(order.thread_id, tenant_id).await?;

    let subset = post_creation_messages(&order, &ledger);
    if subset.is_empty() {
        tracing::debug!(order_id = %order_id, "No post-creation messages to sync");
        return Ok(SyncOutcome {
            order_id,
            messages_considered: 0,
            applied: 0,
            failed_items: 0,
        });
    }

    let request = ParseRequest {
        thread_id: order.thread_id,
        supplier_id: order.supplier_id,
        order: Some(OrderSnapshot::new(&order, &items)),
        messages: subset.iter().map(|m| LedgerMessage::from(*m)).collect(),
    };
    let response = parser.parse_updates(&request).await?;

    let (mut applied, order) = match response.order_updates {
        Some(parsed) => {
            let update = order_update_from(parsed, order_id);
            merge_order(store, order, &update).await?
        }
        None => (0, order),
    };

    let mut merges = Vec::with_capacity(response.item_updates.len());
    for parsed in response.item_updates {
        let update = item_update_from(parsed);
        match items.iter().find(|i| i.order_item_id == update.order_item_id) {
            Some(item) => merges.push(merge_item(store, item.clone(), update)),
            None => tracing::warn!(
                order_id = %order_id,
                order_item_id = %update.order_item_id,
                "Parser referenced an item outside this order"
            ),
        }
    }

    let mut failed_items = 0;
    for result in join_all(merges).await {
        match result {
            Ok(n) => applied += n,
            Err(e) => {
                failed_items += 1;
                tracing::error!(order_id = %order_id, error = %e, "Failed to store order item update");
            }
        }
    }

    let outcome = SyncOutcome {
        order_id,
        messages_considered: subset.len(),
        applied,
        failed_items,
    };

    if applied > 0 {
        append_activity(
            store,
            ActivityLogEntry::new(
                tenant_id,
                EntityType::Order,
                order_id.as_uuid(),
                ActivityKind::OrderUpdatesApplied,
                format!("Applied {} order updates from supplier messages", applied),
            )
            .with_actor(actor_id)
            .with_details(json!({
                "applied": applied,
                "failed_items": failed_items,
                "messages_considered": outcome.messages_considered,
                "status": order.status,
                "confidence": response.confidence,
            })),
        )
        .await;
    }

    tracing::info!(
        order_id = %order_id,
        messages = outcome.messages_considered,
        applied,
        failed_items,
        "Order sync completed"
    );
    Ok(outcome)
}
