//! PROCURA Storage - Storage Trait and Mock Implementation
//!
//! Defines the storage abstraction for procurement entities and an
//! in-memory implementation used by tests and local development.

mod store;

pub use store::{ProcurementStore, QuoteRequestUpdate, ThreadUpdate};

use ::async_trait::async_trait;
use chrono::Utc;
use procura_core::{
    ActivityId, ActivityLogEntry, ChatMessage, ChatMessageId, EntityIdType, EntityType, Message,
    MessageId, Order, OrderId, OrderItem, OrderItemId, ProcuraError, ProcuraResult, QuoteRequest,
    QuoteRequestId, QuoteRequestStatus, StorageError, SupplierThread, SupplierThreadStatus,
    TenantId, ThreadId, Timestamp,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

fn already_exists(entity_type: EntityType) -> ProcuraError {
    ProcuraError::Storage(StorageError::InsertFailed {
        entity_type,
        reason: "already exists".to_string(),
    })
}

fn conflict<S: Copy + std::fmt::Display>(
    entity_type: EntityType,
    id: Uuid,
    expected: &[S],
    actual: S,
) -> ProcuraError {
    let expected = expected
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    ProcuraError::Storage(StorageError::Conflict {
        entity_type,
        id,
        expected,
        actual: actual.to_string(),
    })
}

fn apply_quote_request_update(qr: &mut QuoteRequest, update: QuoteRequestUpdate) {
    if let Some(status) = update.status {
        qr.status = status;
    }
    if let Some(selected) = update.selected_supplier_id {
        qr.selected_supplier_id = selected;
    }
    if let Some(round) = update.round {
        qr.round = round;
    }
    if let Some(line_items) = update.line_items {
        qr.line_items = line_items;
    }
    if let Some(invited) = update.invited_supplier_ids {
        qr.invited_supplier_ids = invited;
    }
    qr.updated_at = Utc::now();
}

fn apply_thread_update(thread: &mut SupplierThread, update: ThreadUpdate) {
    if let Some(status) = update.status {
        thread.status = status;
    }
    if let Some(external) = update.external_thread_id {
        thread.external_thread_id = Some(external);
    }
    thread.updated_at = Utc::now();
}

// ============================================================================
// MOCK STORAGE
// ============================================================================

/// In-memory storage for tests and local runs.
///
/// Each table sits behind its own lock; a compare-and-set holds the write
/// lock of its table for the whole check-then-write.
#[derive(Debug, Default)]
pub struct MockStorage {
    quote_requests: RwLock<HashMap<QuoteRequestId, QuoteRequest>>,
    threads: RwLock<HashMap<ThreadId, SupplierThread>>,
    messages: RwLock<HashMap<MessageId, Message>>,
    chat: RwLock<HashMap<ChatMessageId, ChatMessage>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    order_items: RwLock<HashMap<OrderItemId, OrderItem>>,
    activity: RwLock<HashMap<ActivityId, ActivityLogEntry>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders across all tenants.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Number of stored order items across all tenants.
    pub async fn order_item_count(&self) -> usize {
        self.order_items.read().await.len()
    }

    /// Number of stored ledger messages across all tenants.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl ProcurementStore for MockStorage {
    // === Quote Request Operations ===

    async fn quote_request_insert(&self, qr: &QuoteRequest) -> ProcuraResult<()> {
        let mut table = self.quote_requests.write().await;
        if table.contains_key(&qr.quote_request_id) {
            return Err(already_exists(EntityType::QuoteRequest));
        }
        table.insert(qr.quote_request_id, qr.clone());
        Ok(())
    }

    async fn quote_request_get(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<QuoteRequest>> {
        let table = self.quote_requests.read().await;
        Ok(table.get(&id).filter(|qr| qr.tenant_id == tenant_id).cloned())
    }

    async fn quote_request_update(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
        update: QuoteRequestUpdate,
    ) -> ProcuraResult<QuoteRequest> {
        let mut table = self.quote_requests.write().await;
        let qr = table
            .get_mut(&id)
            .filter(|qr| qr.tenant_id == tenant_id)
            .ok_or_else(|| ProcuraError::not_found(EntityType::QuoteRequest, id))?;
        apply_quote_request_update(qr, update);
        Ok(qr.clone())
    }

    async fn quote_request_compare_and_set(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
        expected: &[QuoteRequestStatus],
        update: QuoteRequestUpdate,
    ) -> ProcuraResult<QuoteRequest> {
        let mut table = self.quote_requests.write().await;
        let qr = table
            .get_mut(&id)
            .filter(|qr| qr.tenant_id == tenant_id)
            .ok_or_else(|| ProcuraError::not_found(EntityType::QuoteRequest, id))?;
        if !expected.contains(&qr.status) {
            return Err(conflict(EntityType::QuoteRequest, id.as_uuid(), expected, qr.status));
        }
        apply_quote_request_update(qr, update);
        Ok(qr.clone())
    }

    // === Supplier Thread Operations ===

    async fn thread_insert(&self, thread: &SupplierThread) -> ProcuraResult<()> {
        let mut table = self.threads.write().await;
        if table.contains_key(&thread.thread_id) {
            return Err(already_exists(EntityType::SupplierThread));
        }
        table.insert(thread.thread_id, thread.clone());
        Ok(())
    }

    async fn thread_get(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<SupplierThread>> {
        let table = self.threads.read().await;
        Ok(table.get(&id).filter(|t| t.tenant_id == tenant_id).cloned())
    }

    async fn thread_list_by_quote_request(
        &self,
        quote_request_id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<SupplierThread>> {
        let table = self.threads.read().await;
        let mut threads: Vec<SupplierThread> = table
            .values()
            .filter(|t| t.quote_request_id == quote_request_id && t.tenant_id == tenant_id)
            .cloned()
            .collect();
        threads.sort_by_key(|t| (t.created_at, t.thread_id));
        Ok(threads)
    }

    async fn thread_list_by_status(
        &self,
        status: SupplierThreadStatus,
    ) -> ProcuraResult<Vec<SupplierThread>> {
        let table = self.threads.read().await;
        let mut threads: Vec<SupplierThread> =
            table.values().filter(|t| t.status == status).cloned().collect();
        threads.sort_by_key(|t| (t.created_at, t.thread_id));
        Ok(threads)
    }

    async fn thread_update(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
        update: ThreadUpdate,
    ) -> ProcuraResult<SupplierThread> {
        let mut table = self.threads.write().await;
        let thread = table
            .get_mut(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or_else(|| ProcuraError::not_found(EntityType::SupplierThread, id))?;
        apply_thread_update(thread, update);
        Ok(thread.clone())
    }

    async fn thread_compare_and_set(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
        expected: &[SupplierThreadStatus],
        update: ThreadUpdate,
    ) -> ProcuraResult<SupplierThread> {
        let mut table = self.threads.write().await;
        let thread = table
            .get_mut(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or_else(|| ProcuraError::not_found(EntityType::SupplierThread, id))?;
        if !expected.contains(&thread.status) {
            return Err(conflict(
                EntityType::SupplierThread,
                id.as_uuid(),
                expected,
                thread.status,
            ));
        }
        apply_thread_update(thread, update);
        Ok(thread.clone())
    }

    // === Message Ledger Operations ===

    async fn message_append(&self, message: &Message) -> ProcuraResult<()> {
        let mut table = self.messages.write().await;
        if table.contains_key(&message.message_id) {
            return Err(already_exists(EntityType::Message));
        }
        table.insert(message.message_id, message.clone());
        Ok(())
    }

    async fn message_get(
        &self,
        id: MessageId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<Message>> {
        let table = self.messages.read().await;
        Ok(table.get(&id).filter(|m| m.tenant_id == tenant_id).cloned())
    }

    async fn message_list_by_thread(
        &self,
        thread_id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<Message>> {
        let table = self.messages.read().await;
        let mut ledger: Vec<Message> = table
            .values()
            .filter(|m| m.thread_id == thread_id && m.tenant_id == tenant_id)
            .cloned()
            .collect();
        ledger.sort_by_key(|m| (m.effective_time(), m.message_id));
        Ok(ledger)
    }

    async fn message_mark_follow_up_sent(
        &self,
        id: MessageId,
        tenant_id: TenantId,
        at: Timestamp,
    ) -> ProcuraResult<()> {
        let mut table = self.messages.write().await;
        let message = table
            .get_mut(&id)
            .filter(|m| m.tenant_id == tenant_id)
            .ok_or_else(|| ProcuraError::not_found(EntityType::Message, id))?;
        message.follow_up_sent_at = Some(at);
        Ok(())
    }

    // === Chat Operations ===

    async fn chat_append(&self, message: &ChatMessage) -> ProcuraResult<()> {
        let mut table = self.chat.write().await;
        if table.contains_key(&message.chat_message_id) {
            return Err(already_exists(EntityType::ChatMessage));
        }
        table.insert(message.chat_message_id, message.clone());
        Ok(())
    }

    async fn chat_list(
        &self,
        quote_request_id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<ChatMessage>> {
        let table = self.chat.read().await;
        let mut chat: Vec<ChatMessage> = table
            .values()
            .filter(|m| m.quote_request_id == quote_request_id && m.tenant_id == tenant_id)
            .cloned()
            .collect();
        chat.sort_by_key(|m| (m.created_at, m.chat_message_id));
        Ok(chat)
    }

    // === Order Operations ===

    async fn order_insert(&self, order: &Order, items: &[OrderItem]) -> ProcuraResult<()> {
        let mut orders = self.orders.write().await;
        let mut order_items = self.order_items.write().await;
        if orders.contains_key(&order.order_id) {
            return Err(already_exists(EntityType::Order));
        }
        if items.iter().any(|item| order_items.contains_key(&item.order_item_id)) {
            return Err(already_exists(EntityType::OrderItem));
        }
        orders.insert(order.order_id, order.clone());
        for item in items {
            order_items.insert(item.order_item_id, item.clone());
        }
        Ok(())
    }

    async fn order_get(&self, id: OrderId, tenant_id: TenantId) -> ProcuraResult<Option<Order>> {
        let table = self.orders.read().await;
        Ok(table.get(&id).filter(|o| o.tenant_id == tenant_id).cloned())
    }

    async fn order_get_by_thread(
        &self,
        thread_id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<Order>> {
        let table = self.orders.read().await;
        Ok(table
            .values()
            .find(|o| o.thread_id == thread_id && o.tenant_id == tenant_id)
            .cloned())
    }

    async fn order_compare_and_set(
        &self,
        order: &Order,
        expected_updated_at: Timestamp,
    ) -> ProcuraResult<()> {
        let mut table = self.orders.write().await;
        let stored = table
            .get_mut(&order.order_id)
            .filter(|o| o.tenant_id == order.tenant_id)
            .ok_or_else(|| ProcuraError::not_found(EntityType::Order, order.order_id))?;
        if stored.updated_at != expected_updated_at {
            return Err(conflict(
                EntityType::Order,
                order.order_id.as_uuid(),
                &[expected_updated_at],
                stored.updated_at,
            ));
        }
        *stored = order.clone();
        Ok(())
    }

    async fn order_discard(&self, id: OrderId, tenant_id: TenantId) -> ProcuraResult<()> {
        let mut orders = self.orders.write().await;
        let mut order_items = self.order_items.write().await;
        let owned = orders.get(&id).is_some_and(|o| o.tenant_id == tenant_id);
        if !owned {
            return Err(ProcuraError::not_found(EntityType::Order, id));
        }
        orders.remove(&id);
        order_items.retain(|_, item| item.order_id != id);
        Ok(())
    }

    async fn order_item_list(
        &self,
        order_id: OrderId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<OrderItem>> {
        let table = self.order_items.read().await;
        let mut items: Vec<OrderItem> = table
            .values()
            .filter(|i| i.order_id == order_id && i.tenant_id == tenant_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.order_item_id);
        Ok(items)
    }

    async fn order_item_compare_and_set(
        &self,
        item: &OrderItem,
        expected_updated_at: Timestamp,
    ) -> ProcuraResult<()> {
        let mut table = self.order_items.write().await;
        let stored = table
            .get_mut(&item.order_item_id)
            .filter(|i| i.tenant_id == item.tenant_id)
            .ok_or_else(|| ProcuraError::not_found(EntityType::OrderItem, item.order_item_id))?;
        if stored.updated_at != expected_updated_at {
            return Err(conflict(
                EntityType::OrderItem,
                item.order_item_id.as_uuid(),
                &[expected_updated_at],
                stored.updated_at,
            ));
        }
        *stored = item.clone();
        Ok(())
    }

    // === Activity Log Operations ===

    async fn activity_append(&self, entry: &ActivityLogEntry) -> ProcuraResult<()> {
        let mut table = self.activity.write().await;
        if table.contains_key(&entry.activity_id) {
            return Err(already_exists(EntityType::ActivityLog));
        }
        table.insert(entry.activity_id, entry.clone());
        Ok(())
    }

    async fn activity_list(
        &self,
        subject_id: Uuid,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<ActivityLogEntry>> {
        let table = self.activity.read().await;
        let mut entries: Vec<ActivityLogEntry> = table
            .values()
            .filter(|e| e.subject_id == subject_id && e.tenant_id == tenant_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.activity_id));
        Ok(entries)
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn arb_qr_status() -> impl Strategy<Value = QuoteRequestStatus> {
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

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A guarded write succeeds exactly when the stored status is expected,
        /// and a failed guard leaves the record untouched.
        #[test]
        fn prop_compare_and_set_honors_guard(
            stored in arb_qr_status(),
            expected in prop::collection::vec(arb_qr_status(), 0..4),
            target in arb_qr_status(),
        ) {
            let storage = MockStorage::new();
            let tenant = TenantId::now_v7();
            let now = Utc::now();
            let qr = QuoteRequest {
                quote_request_id: QuoteRequestId::now_v7(),
                tenant_id: tenant,
                title: "t".to_string(),
                status: stored,
                selected_supplier_id: None,
                round: 1,
                invited_supplier_ids: Vec::new(),
                line_items: Vec::new(),
                created_by: None,
                created_at: now,
                updated_at: now,
            };
            let id = qr.quote_request_id;

            let (result, after) = block_on(async {
                storage.quote_request_insert(&qr).await.unwrap();
                let result = storage
                    .quote_request_compare_and_set(id, tenant, &expected, QuoteRequestUpdate::status(target))
                    .await;
                let after = storage.quote_request_get(id, tenant).await.unwrap().unwrap();
                (result, after)
            });

            if expected.contains(&stored) {
                prop_assert!(result.is_ok());
                prop_assert_eq!(after.status, target);
            } else {
                prop_assert!(matches!(result, Err(ref e) if e.is_conflict()));
                prop_assert_eq!(after.status, stored);
            }
        }

        /// Getting a nonexistent id returns Ok(None), never an error.
        #[test]
        fn prop_missing_entities_return_none(_dummy in any::<u8>()) {
            let storage = MockStorage::new();
            let tenant = TenantId::now_v7();
            let (qr, thread, order) = block_on(async {
                (
                    storage.quote_request_get(QuoteRequestId::now_v7(), tenant).await.unwrap(),
                    storage.thread_get(ThreadId::now_v7(), tenant).await.unwrap(),
                    storage.order_get(OrderId::now_v7(), tenant).await.unwrap(),
                )
            });
            prop_assert!(qr.is_none());
            prop_assert!(thread.is_none());
            prop_assert!(order.is_none());
        }
    }
}
