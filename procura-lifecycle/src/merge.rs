//! Monotonic merge of supplier-reported order updates
//!
//! Updates parsed out of supplier emails arrive late, out of order and
//! repeated. The merge rules make applying them safe: status never moves
//! backwards, and re-applying a value that is already stored counts as no
//! change.

use chrono::{NaiveDate, Utc};
use procura_core::{Order, OrderItem, OrderItemId, OrderStatus};
use serde::{Deserialize, Serialize};

/// Candidate order-level changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderUpdate {
    pub tracking_number: Option<String>,
    pub shipping_carrier: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
    pub status: Option<OrderStatus>,
}

impl OrderUpdate {
    pub fn is_empty(&self) -> bool {
        self == &OrderUpdate::default()
    }
}

/// Candidate changes for one order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ItemUpdate {
    pub order_item_id: OrderItemId,
    pub availability: Option<String>,
    pub tracking_number: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
    pub actual_delivery: Option<NaiveDate>,
}

/// Resolve the status an order should hold after seeing `candidate`.
///
/// Ranked statuses only move forward. `Cancelled` overrides anything and,
/// once set, absorbs every later candidate.
pub fn merge_status(current: OrderStatus, candidate: OrderStatus) -> OrderStatus {
    match (current.hierarchy_index(), candidate.hierarchy_index()) {
        (None, _) => current,
        (Some(_), None) => candidate,
        (Some(cur), Some(next)) if next > cur => candidate,
        _ => current,
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Overwrite `slot` with a present, non-empty value. Returns 1 when the
/// stored value actually changed.
fn overwrite_text(slot: &mut Option<String>, value: &Option<String>) -> usize {
    match present(value) {
        Some(v) if slot.as_deref() != Some(v) => {
            *slot = Some(v.to_string());
            1
        }
        _ => 0,
    }
}

fn overwrite_date(slot: &mut Option<NaiveDate>, value: Option<NaiveDate>) -> usize {
    match value {
        Some(v) if *slot != Some(v) => {
            *slot = Some(v);
            1
        }
        _ => 0,
    }
}

/// Apply an order-level update in place and return the number of fields
/// that changed.
pub fn apply_order_update(order: &mut Order, update: &OrderUpdate) -> usize {
    let mut applied = 0;
    applied += overwrite_text(&mut order.tracking_number, &update.tracking_number);
    applied += overwrite_text(&mut order.shipping_carrier, &update.shipping_carrier);
    applied += overwrite_date(&mut order.expected_delivery, update.expected_delivery);

    if let Some(candidate) = update.status {
        let merged = merge_status(order.status, candidate);
        if merged != order.status {
            order.status = merged;
            applied += 1;
        }
    }

    if applied > 0 {
        order.updated_at = Utc::now();
    }
    applied
}

/// Apply an item-level update in place and return the number of fields
/// that changed.
pub fn apply_item_update(item: &mut OrderItem, update: &ItemUpdate) -> usize {
    let mut applied = 0;
    applied += overwrite_text(&mut item.availability, &update.availability);
    applied += overwrite_text(&mut item.tracking_number, &update.tracking_number);
    applied += overwrite_date(&mut item.expected_delivery, update.expected_delivery);
    applied += overwrite_date(&mut item.actual_delivery, update.actual_delivery);

    if applied > 0 {
        item.updated_at = Utc::now();
    }
    applied
}
