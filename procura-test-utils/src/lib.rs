//! PROCURA Test Utilities
//!
//! Centralized test infrastructure for the PROCURA workspace:
//! - A failure-injecting store wrapper for compensation tests
//! - Proptest generators for the status enumerations
//! - Test fixtures for common negotiation scenarios
//! - Custom assertions for PROCURA-specific errors

// Re-export mocks from their source crates
pub use procura_parser::MockParsingService;
pub use procura_storage::MockStorage;

pub use procura_core::{
    ActivityLogEntry, ChatMessage, EntityIdType, EntityType, Message, Order, OrderItem,
    OrderStatus, ProcuraError, ProcuraResult, QuoteLineItem, QuoteRequest, QuoteRequestStatus,
    StorageError, SupplierThread, SupplierThreadStatus, Timestamp,
};

use ::async_trait::async_trait;
use procura_core::{
    MessageId, OrderId, OrderItemId, QuoteRequestId, TenantId, ThreadId,
};
use procura_storage::{ProcurementStore, QuoteRequestUpdate, ThreadUpdate};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

// ============================================================================
// FAILING STORE
// ============================================================================

/// Store wrapper that fails selected writes on demand.
///
/// Everything else is delegated to the wrapped [`MockStorage`], so state
/// written before an injected failure stays visible through `inner()`.
#[derive(Debug)]
pub struct FailingStore {
    inner: Arc<MockStorage>,
    fail_order_insert: AtomicBool,
    fail_order_update: AtomicBool,
    /// Quote request writes that would set one of these statuses fail.
    fail_quote_request_to: Mutex<HashSet<QuoteRequestStatus>>,
    /// Thread writes that would set one of these statuses fail.
    fail_thread_to: Mutex<HashSet<SupplierThreadStatus>>,
    fail_order_items: Mutex<HashSet<OrderItemId>>,
}

fn injected(operation: &str) -> ProcuraError {
    ProcuraError::Storage(StorageError::Unavailable {
        reason: format!("injected failure in {}", operation),
    })
}

impl FailingStore {
    pub fn new(inner: Arc<MockStorage>) -> Self {
        Self {
            inner,
            fail_order_insert: AtomicBool::new(false),
            fail_order_update: AtomicBool::new(false),
            fail_quote_request_to: Mutex::new(HashSet::new()),
            fail_thread_to: Mutex::new(HashSet::new()),
            fail_order_items: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &Arc<MockStorage> {
        &self.inner
    }

    pub fn fail_order_insert(self) -> Self {
        self.fail_order_insert.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_order_update(self) -> Self {
        self.fail_order_update.store(true, Ordering::SeqCst);
        self
    }

    /// Fail any quote request write that sets `status`.
    pub fn fail_quote_request_transition_to(mut self, status: QuoteRequestStatus) -> Self {
        self.fail_quote_request_to.get_mut().insert(status);
        self
    }

    /// Fail any thread write that sets `status`.
    pub fn fail_thread_transition_to(mut self, status: SupplierThreadStatus) -> Self {
        self.fail_thread_to.get_mut().insert(status);
        self
    }

    pub fn fail_order_item_update(mut self, id: OrderItemId) -> Self {
        self.fail_order_items.get_mut().insert(id);
        self
    }

    /// Stop injecting failures.
    pub async fn heal(&self) {
        self.fail_order_insert.store(false, Ordering::SeqCst);
        self.fail_order_update.store(false, Ordering::SeqCst);
        self.fail_quote_request_to.lock().await.clear();
        self.fail_thread_to.lock().await.clear();
        self.fail_order_items.lock().await.clear();
    }

    async fn check_quote_request(&self, update: &QuoteRequestUpdate) -> ProcuraResult<()> {
        match update.status {
            Some(status) if self.fail_quote_request_to.lock().await.contains(&status) => {
                Err(injected("quote_request write"))
            }
            _ => Ok(()),
        }
    }

    async fn check_thread(&self, update: &ThreadUpdate) -> ProcuraResult<()> {
        match update.status {
            Some(status) if self.fail_thread_to.lock().await.contains(&status) => {
                Err(injected("thread write"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ProcurementStore for FailingStore {
    async fn quote_request_insert(&self, qr: &QuoteRequest) -> ProcuraResult<()> {
        self.inner.quote_request_insert(qr).await
    }

    async fn quote_request_get(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<QuoteRequest>> {
        self.inner.quote_request_get(id, tenant_id).await
    }

    async fn quote_request_update(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
        update: QuoteRequestUpdate,
    ) -> ProcuraResult<QuoteRequest> {
        self.check_quote_request(&update).await?;
        self.inner.quote_request_update(id, tenant_id, update).await
    }

    async fn quote_request_compare_and_set(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
        expected: &[QuoteRequestStatus],
        update: QuoteRequestUpdate,
    ) -> ProcuraResult<QuoteRequest> {
        self.check_quote_request(&update).await?;
        self.inner
            .quote_request_compare_and_set(id, tenant_id, expected, update)
            .await
    }

    async fn thread_insert(&self, thread: &SupplierThread) -> ProcuraResult<()> {
        self.inner.thread_insert(thread).await
    }

    async fn thread_get(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<SupplierThread>> {
        self.inner.thread_get(id, tenant_id).await
    }

    async fn thread_list_by_quote_request(
        &self,
        quote_request_id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<SupplierThread>> {
        self.inner
            .thread_list_by_quote_request(quote_request_id, tenant_id)
            .await
    }

    async fn thread_list_by_status(
        &self,
        status: SupplierThreadStatus,
    ) -> ProcuraResult<Vec<SupplierThread>> {
        self.inner.thread_list_by_status(status).await
    }

    async fn thread_update(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
        update: ThreadUpdate,
    ) -> ProcuraResult<SupplierThread> {
        self.check_thread(&update).await?;
        self.inner.thread_update(id, tenant_id, update).await
    }

    async fn thread_compare_and_set(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
        expected: &[SupplierThreadStatus],
        update: ThreadUpdate,
    ) -> ProcuraResult<SupplierThread> {
        self.check_thread(&update).await?;
        self.inner
            .thread_compare_and_set(id, tenant_id, expected, update)
            .await
    }

    async fn message_append(&self, message: &Message) -> ProcuraResult<()> {
        self.inner.message_append(message).await
    }

    async fn message_get(
        &self,
        id: MessageId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<Message>> {
        self.inner.message_get(id, tenant_id).await
    }

    async fn message_list_by_thread(
        &self,
        thread_id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<Message>> {
        self.inner.message_list_by_thread(thread_id, tenant_id).await
    }

    async fn message_mark_follow_up_sent(
        &self,
        id: MessageId,
        tenant_id: TenantId,
        at: Timestamp,
    ) -> ProcuraResult<()> {
        self.inner.message_mark_follow_up_sent(id, tenant_id, at).await
    }

    async fn chat_append(&self, message: &ChatMessage) -> ProcuraResult<()> {
        self.inner.chat_append(message).await
    }

    async fn chat_list(
        &self,
        quote_request_id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<ChatMessage>> {
        self.inner.chat_list(quote_request_id, tenant_id).await
    }

    async fn order_insert(&self, order: &Order, items: &[OrderItem]) -> ProcuraResult<()> {
        if self.fail_order_insert.load(Ordering::SeqCst) {
            return Err(injected("order_insert"));
        }
        self.inner.order_insert(order, items).await
    }

    async fn order_get(&self, id: OrderId, tenant_id: TenantId) -> ProcuraResult<Option<Order>> {
        self.inner.order_get(id, tenant_id).await
    }

    async fn order_get_by_thread(
        &self,
        thread_id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<Order>> {
        self.inner.order_get_by_thread(thread_id, tenant_id).await
    }

    async fn order_compare_and_set(
        &self,
        order: &Order,
        expected_updated_at: Timestamp,
    ) -> ProcuraResult<()> {
        if self.fail_order_update.load(Ordering::SeqCst) {
            return Err(injected("order_compare_and_set"));
        }
        self.inner.order_compare_and_set(order, expected_updated_at).await
    }

    async fn order_discard(&self, id: OrderId, tenant_id: TenantId) -> ProcuraResult<()> {
        self.inner.order_discard(id, tenant_id).await
    }

    async fn order_item_list(
        &self,
        order_id: OrderId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<OrderItem>> {
        self.inner.order_item_list(order_id, tenant_id).await
    }

    async fn order_item_compare_and_set(
        &self,
        item: &OrderItem,
        expected_updated_at: Timestamp,
    ) -> ProcuraResult<()> {
        if self.fail_order_items.lock().await.contains(&item.order_item_id) {
            return Err(injected("order_item_compare_and_set"));
        }
        self.inner
            .order_item_compare_and_set(item, expected_updated_at)
            .await
    }

    async fn activity_append(&self, entry: &ActivityLogEntry) -> ProcuraResult<()> {
        self.inner.activity_append(entry).await
    }

    async fn activity_list(
        &self,
        subject_id: Uuid,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<ActivityLogEntry>> {
        self.inner.activity_list(subject_id, tenant_id).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use chrono::{TimeZone, Utc};
    use procura_core::MessageRole;
    use proptest::prelude::*;

    pub fn arb_quote_request_status() -> impl Strategy<Value = QuoteRequestStatus> {
        prop_oneof![
            Just(QuoteRequestStatus::Draft),
            Just(QuoteRequestStatus::Sent),
            Just(QuoteRequestStatus::Received),
            Just(QuoteRequestStatus::UnderReview),
            Just(QuoteRequestStatus::Approved),
            Just(QuoteRequestStatus::Rejected),
            Just(QuoteRequestStatus::Expired),
            Just(QuoteRequestStatus::ConvertedToOrder),
        ]
    }

    pub fn arb_thread_status() -> impl Strategy<Value = SupplierThreadStatus> {
        prop_oneof![
            Just(SupplierThreadStatus::Sent),
            Just(SupplierThreadStatus::Responded),
            Just(SupplierThreadStatus::NoResponse),
            Just(SupplierThreadStatus::Accepted),
            Just(SupplierThreadStatus::Rejected),
            Just(SupplierThreadStatus::NotSelected),
        ]
    }

    /// Statuses a thread can hold while its quote request is still open.
    pub fn arb_open_thread_status() -> impl Strategy<Value = SupplierThreadStatus> {
        prop_oneof![
            Just(SupplierThreadStatus::Sent),
            Just(SupplierThreadStatus::Responded),
            Just(SupplierThreadStatus::NoResponse),
            Just(SupplierThreadStatus::Rejected),
        ]
    }

    pub fn arb_order_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    pub fn arb_message_role() -> impl Strategy<Value = MessageRole> {
        prop_oneof![
            Just(MessageRole::User),
            Just(MessageRole::Assistant),
            Just(MessageRole::System),
        ]
    }

    /// Timestamps within 2024.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (0i64..366 * 24 * 3600).prop_map(|offset| {
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset)
        })
    }

    /// Unit prices between one cent and ten thousand units.
    pub fn arb_unit_price_cents() -> impl Strategy<Value = i64> {
        1i64..1_000_000
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use chrono::{Duration, Utc};
    use procura_core::{Cents, LineItemId, SupplierId};

    pub fn tenant() -> TenantId {
        TenantId::now_v7()
    }

    /// A requested part nobody has priced yet.
    pub fn requested_item(part_number: &str, quantity: u32) -> QuoteLineItem {
        QuoteLineItem {
            line_item_id: LineItemId::now_v7(),
            part_number: part_number.to_string(),
            description: format!("{} (requested)", part_number),
            quantity,
            supplier_id: None,
            unit_price_cents: None,
            availability: None,
        }
    }

    pub fn priced_item(
        supplier_id: SupplierId,
        part_number: &str,
        quantity: u32,
        unit_price_cents: Cents,
    ) -> QuoteLineItem {
        QuoteLineItem {
            line_item_id: LineItemId::now_v7(),
            part_number: part_number.to_string(),
            description: format!("{} quoted", part_number),
            quantity,
            supplier_id: Some(supplier_id),
            unit_price_cents: Some(unit_price_cents),
            availability: Some("in stock".to_string()),
        }
    }

    pub fn quote_request(
        tenant_id: TenantId,
        status: QuoteRequestStatus,
        suppliers: &[SupplierId],
    ) -> QuoteRequest {
        let now = Utc::now();
        QuoteRequest {
            quote_request_id: QuoteRequestId::now_v7(),
            tenant_id,
            title: "Brake service parts".to_string(),
            status,
            selected_supplier_id: None,
            round: 1,
            invited_supplier_ids: suppliers.to_vec(),
            line_items: vec![requested_item("BRK-100", 4), requested_item("FLT-22", 2)],
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn thread(
        qr: &QuoteRequest,
        supplier_id: SupplierId,
        status: SupplierThreadStatus,
    ) -> SupplierThread {
        let now = Utc::now();
        SupplierThread {
            thread_id: ThreadId::now_v7(),
            quote_request_id: qr.quote_request_id,
            tenant_id: qr.tenant_id,
            supplier_id,
            status,
            round: qr.round,
            external_thread_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The RFQ that opens a thread, sent `sent_ago` before now with a
    /// deadline `due_in` after sending.
    pub fn rfq(thread: &SupplierThread, sent_ago: Duration, due_in: Duration) -> Message {
        let sent_at = Utc::now() - sent_ago;
        let mut m = Message::outbound(
            thread.thread_id,
            thread.tenant_id,
            "Please quote the attached parts list",
            sent_at,
            Some(sent_at + due_in),
        );
        m.subject = Some("Request for quote".to_string());
        m
    }

    pub fn supplier_reply(thread: &SupplierThread, body: &str, received_at: Timestamp) -> Message {
        Message::inbound(thread.thread_id, thread.tenant_id, body, received_at)
    }

    pub fn pending_order(thread: &SupplierThread, created_at: Timestamp) -> Order {
        Order {
            order_id: OrderId::now_v7(),
            tenant_id: thread.tenant_id,
            quote_request_id: thread.quote_request_id,
            supplier_id: thread.supplier_id,
            thread_id: thread.thread_id,
            status: OrderStatus::Pending,
            tracking_number: None,
            shipping_carrier: None,
            expected_delivery: None,
            actual_delivery: None,
            subtotal_cents: 10_000,
            total_cents: 10_000,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn order_item(order: &Order, part_number: &str) -> OrderItem {
        OrderItem {
            order_item_id: OrderItemId::now_v7(),
            order_id: order.order_id,
            tenant_id: order.tenant_id,
            source_line_item_id: LineItemId::now_v7(),
            part_number: part_number.to_string(),
            description: format!("{} ordered", part_number),
            quantity: 2,
            unit_price_cents: 2_500,
            line_total_cents: 5_000,
            availability: None,
            tracking_number: None,
            expected_delivery: None,
            actual_delivery: None,
            updated_at: order.created_at,
        }
    }

    /// A stored negotiation: one quote request and its threads.
    #[derive(Debug, Clone)]
    pub struct Negotiation {
        pub quote_request: QuoteRequest,
        pub threads: Vec<SupplierThread>,
    }

    impl Negotiation {
        pub fn supplier(&self, index: usize) -> SupplierId {
            self.threads[index].supplier_id
        }
    }

    /// Seed a SENT quote request with one SENT thread per supplier, each
    /// holding its RFQ sent an hour ago and due in three days.
    pub async fn seed_negotiation(
        store: &dyn ProcurementStore,
        tenant_id: TenantId,
        supplier_count: usize,
    ) -> ProcuraResult<Negotiation> {
        let suppliers: Vec<SupplierId> =
            (0..supplier_count).map(|_| SupplierId::now_v7()).collect();
        let qr = quote_request(tenant_id, QuoteRequestStatus::Sent, &suppliers);
        store.quote_request_insert(&qr).await?;

        let mut threads = Vec::with_capacity(supplier_count);
        for supplier_id in suppliers {
            let t = thread(&qr, supplier_id, SupplierThreadStatus::Sent);
            store.thread_insert(&t).await?;
            store
                .message_append(&rfq(&t, Duration::hours(1), Duration::days(3)))
                .await?;
            threads.push(t);
        }

        Ok(Negotiation {
            quote_request: qr,
            threads,
        })
    }

    /// Seed a negotiation where every supplier has replied and priced
    /// two lines, leaving the quote request UNDER_REVIEW.
    pub async fn seed_priced_negotiation(
        store: &dyn ProcurementStore,
        tenant_id: TenantId,
        supplier_count: usize,
    ) -> ProcuraResult<Negotiation> {
        let mut negotiation = seed_negotiation(store, tenant_id, supplier_count).await?;
        let mut line_items = negotiation.quote_request.line_items.clone();

        for (i, t) in negotiation.threads.iter_mut().enumerate() {
            store
                .message_append(&supplier_reply(t, "Quote attached", Utc::now()))
                .await?;
            *t = store
                .thread_update(
                    t.thread_id,
                    tenant_id,
                    ThreadUpdate::status(SupplierThreadStatus::Responded),
                )
                .await?;
            let offset = i64::try_from(i).unwrap_or(0) * 100;
            line_items.push(priced_item(t.supplier_id, "BRK-100", 4, 2_500 + offset));
            line_items.push(priced_item(t.supplier_id, "FLT-22", 2, 1_200 + offset));
        }

        negotiation.quote_request = store
            .quote_request_update(
                negotiation.quote_request.quote_request_id,
                tenant_id,
                QuoteRequestUpdate {
                    status: Some(QuoteRequestStatus::UnderReview),
                    line_items: Some(line_items),
                    ..Default::default()
                },
            )
            .await?;
        Ok(negotiation)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    use super::*;

    pub fn assert_conflict<T: std::fmt::Debug>(result: &ProcuraResult<T>) {
        match result {
            Err(e) if e.is_conflict() => {}
            other => panic!("Expected conflict, got {:?}", other),
        }
    }

    pub fn assert_not_found<T: std::fmt::Debug>(result: &ProcuraResult<T>, entity_type: EntityType) {
        match result {
            Err(ProcuraError::Storage(StorageError::NotFound {
                entity_type: actual,
                ..
            })) => assert_eq!(*actual, entity_type),
            other => panic!("Expected NotFound({:?}), got {:?}", entity_type, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn test_failing_store_blocks_order_insert_only() {
        let inner = Arc::new(MockStorage::new());
        let store = FailingStore::new(inner.clone()).fail_order_insert();
        let negotiation = seed_negotiation(&store, tenant(), 1).await.unwrap();

        let order = pending_order(&negotiation.threads[0], chrono::Utc::now());
        assert!(store.order_insert(&order, &[]).await.is_err());
        assert_eq!(inner.order_count().await, 0);
        assert_eq!(inner.message_count().await, 1);

        store.heal().await;
        assert!(store.order_insert(&order, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_store_blocks_selected_transition() {
        let store = FailingStore::new(Arc::new(MockStorage::new()))
            .fail_quote_request_transition_to(QuoteRequestStatus::ConvertedToOrder);
        let negotiation = seed_negotiation(&store, tenant(), 2).await.unwrap();
        let qr = &negotiation.quote_request;

        let blocked = store
            .quote_request_update(
                qr.quote_request_id,
                qr.tenant_id,
                QuoteRequestUpdate::status(QuoteRequestStatus::ConvertedToOrder),
            )
            .await;
        assert!(blocked.is_err());

        let allowed = store
            .quote_request_update(
                qr.quote_request_id,
                qr.tenant_id,
                QuoteRequestUpdate::status(QuoteRequestStatus::UnderReview),
            )
            .await;
        assert!(allowed.is_ok());
    }

    #[tokio::test]
    async fn test_seed_priced_negotiation() {
        let store = MockStorage::new();
        let negotiation = seed_priced_negotiation(&store, tenant(), 2).await.unwrap();
        let qr = &negotiation.quote_request;
        assert_eq!(qr.status, QuoteRequestStatus::UnderReview);
        assert_eq!(qr.priced_items_for(negotiation.supplier(0)).len(), 2);
        assert_eq!(qr.supplier_total_cents(negotiation.supplier(0)), 12_400);
        assert!(negotiation
            .threads
            .iter()
            .all(|t| t.status == SupplierThreadStatus::Responded));
    }
}
