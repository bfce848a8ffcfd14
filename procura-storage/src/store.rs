//! Async storage trait for the procurement entities.
//!
//! Every read and write is tenant-scoped except `thread_list_by_status`,
//! which background jobs use to sweep across tenants. Guarded writes
//! (`*_compare_and_set`, on status for quote requests and threads, on
//! `updated_at` for orders and items) are the only way concurrent workflows
//! serialize; a guard mismatch surfaces as `StorageError::Conflict`.

use ::async_trait::async_trait;
use procura_core::{
    ActivityLogEntry, ChatMessage, Message, MessageId, Order, OrderId, OrderItem,
    ProcuraResult, QuoteLineItem, QuoteRequest, QuoteRequestId, QuoteRequestStatus, SupplierId,
    SupplierThread, SupplierThreadStatus, TenantId, ThreadId, Timestamp,
};
use uuid::Uuid;

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for quote requests.
#[derive(Debug, Clone, Default)]
pub struct QuoteRequestUpdate {
    /// New status
    pub status: Option<QuoteRequestStatus>,
    /// `Some(None)` clears the selection
    pub selected_supplier_id: Option<Option<SupplierId>>,
    /// New negotiation round
    pub round: Option<u32>,
    /// Replacement line items
    pub line_items: Option<Vec<QuoteLineItem>>,
    /// Replacement invite list
    pub invited_supplier_ids: Option<Vec<SupplierId>>,
}

impl QuoteRequestUpdate {
    pub fn status(status: QuoteRequestStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Update payload for supplier threads.
#[derive(Debug, Clone, Default)]
pub struct ThreadUpdate {
    pub status: Option<SupplierThreadStatus>,
    pub external_thread_id: Option<String>,
}

impl ThreadUpdate {
    pub fn status(status: SupplierThreadStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Persistence for quote requests, threads, ledgers, orders and the audit log.
#[async_trait]
pub trait ProcurementStore: Send + Sync {
    // ========================================================================
    // QUOTE REQUEST OPERATIONS
    // ========================================================================

    async fn quote_request_insert(&self, qr: &QuoteRequest) -> ProcuraResult<()>;

    async fn quote_request_get(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<QuoteRequest>>;

    /// Unconditional update. Returns the stored record after the write.
    async fn quote_request_update(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
        update: QuoteRequestUpdate,
    ) -> ProcuraResult<QuoteRequest>;

    /// Apply `update` only if the stored status is one of `expected`.
    async fn quote_request_compare_and_set(
        &self,
        id: QuoteRequestId,
        tenant_id: TenantId,
        expected: &[QuoteRequestStatus],
        update: QuoteRequestUpdate,
    ) -> ProcuraResult<QuoteRequest>;

    // ========================================================================
    // SUPPLIER THREAD OPERATIONS
    // ========================================================================

    async fn thread_insert(&self, thread: &SupplierThread) -> ProcuraResult<()>;

    async fn thread_get(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<SupplierThread>>;

    /// Every thread of a quote request, all rounds, oldest first.
    async fn thread_list_by_quote_request(
        &self,
        quote_request_id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<SupplierThread>>;

    /// Cross-tenant listing for background jobs.
    async fn thread_list_by_status(
        &self,
        status: SupplierThreadStatus,
    ) -> ProcuraResult<Vec<SupplierThread>>;

    async fn thread_update(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
        update: ThreadUpdate,
    ) -> ProcuraResult<SupplierThread>;

    /// Apply `update` only if the stored status is one of `expected`.
    async fn thread_compare_and_set(
        &self,
        id: ThreadId,
        tenant_id: TenantId,
        expected: &[SupplierThreadStatus],
        update: ThreadUpdate,
    ) -> ProcuraResult<SupplierThread>;

    // ========================================================================
    // MESSAGE LEDGER OPERATIONS
    // ========================================================================

    async fn message_append(&self, message: &Message) -> ProcuraResult<()>;

    async fn message_get(
        &self,
        id: MessageId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<Message>>;

    /// A thread's ledger ordered by effective time.
    async fn message_list_by_thread(
        &self,
        thread_id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<Message>>;

    async fn message_mark_follow_up_sent(
        &self,
        id: MessageId,
        tenant_id: TenantId,
        at: Timestamp,
    ) -> ProcuraResult<()>;

    // ========================================================================
    // CHAT OPERATIONS
    // ========================================================================

    async fn chat_append(&self, message: &ChatMessage) -> ProcuraResult<()>;

    /// Chat of a quote request ordered by creation time.
    async fn chat_list(
        &self,
        quote_request_id: QuoteRequestId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<ChatMessage>>;

    // ========================================================================
    // ORDER OPERATIONS
    // ========================================================================

    /// Insert an order together with its items.
    async fn order_insert(&self, order: &Order, items: &[OrderItem]) -> ProcuraResult<()>;

    async fn order_get(&self, id: OrderId, tenant_id: TenantId) -> ProcuraResult<Option<Order>>;

    async fn order_get_by_thread(
        &self,
        thread_id: ThreadId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Option<Order>>;

    /// Replace the stored order record only if its `updated_at` still equals
    /// `expected_updated_at`.
    async fn order_compare_and_set(
        &self,
        order: &Order,
        expected_updated_at: Timestamp,
    ) -> ProcuraResult<()>;

    /// Remove an order and its items. Only conversion compensation calls this.
    async fn order_discard(&self, id: OrderId, tenant_id: TenantId) -> ProcuraResult<()>;

    async fn order_item_list(
        &self,
        order_id: OrderId,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<OrderItem>>;

    /// Replace the stored order item record only if its `updated_at` still
    /// equals `expected_updated_at`.
    async fn order_item_compare_and_set(
        &self,
        item: &OrderItem,
        expected_updated_at: Timestamp,
    ) -> ProcuraResult<()>;

    // ========================================================================
    // ACTIVITY LOG OPERATIONS
    // ========================================================================

    async fn activity_append(&self, entry: &ActivityLogEntry) -> ProcuraResult<()>;

    /// Entries about one subject, oldest first.
    async fn activity_list(
        &self,
        subject_id: Uuid,
        tenant_id: TenantId,
    ) -> ProcuraResult<Vec<ActivityLogEntry>>;
}
