//! Order tracking message selection

use procura_core::{Message, Order};

/// Messages of the order's ledger that arrived after the order was created,
/// in effective-time order.
pub fn post_creation_messages<'a>(order: &Order, ledger: &'a [Message]) -> Vec<&'a Message> {
    let mut subset: Vec<&Message> = ledger
        .iter()
        .filter(|m| m.effective_time() > order.created_at)
        .collect();
    subset.sort_by_key(|m| m.effective_time());
    subset
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use procura_core::{
        EntityIdType, OrderId, OrderStatus, QuoteRequestId, SupplierId, TenantId, ThreadId,
    };

    #[test]
    fn test_only_strictly_later_messages_are_selected() {
        let created = Utc::now();
        let thread_id = ThreadId::now_v7();
        let tenant_id = TenantId::now_v7();
        let order = Order {
            order_id: OrderId::now_v7(),
            tenant_id,
            quote_request_id: QuoteRequestId::now_v7(),
            supplier_id: SupplierId::now_v7(),
            thread_id,
            status: OrderStatus::Pending,
            tracking_number: None,
            shipping_carrier: None,
            expected_delivery: None,
            actual_delivery: None,
            subtotal_cents: 0,
            total_cents: 0,
            created_at: created,
            updated_at: created,
        };

        let before = Message::inbound(thread_id, tenant_id, "quote", created - Duration::hours(3));
        let at = Message::inbound(thread_id, tenant_id, "same instant", created);
        let after_late = Message::inbound(thread_id, tenant_id, "delivered", created + Duration::days(4));
        let after = Message::inbound(thread_id, tenant_id, "shipped", created + Duration::days(1));
        // sent_at takes precedence over a later received_at
        let mut outbound = Message::outbound(thread_id, tenant_id, "po", created - Duration::minutes(1), None);
        outbound.received_at = Some(created + Duration::hours(1));

        let ledger = vec![before, at, after_late, after, outbound];
        let subset = post_creation_messages(&order, &ledger);
        let bodies: Vec<&str> = subset.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["shipped", "delivered"]);
    }
}
