//! Entity types for PROCURA

use crate::{
    ActivityId, ActivityKind, ActorId, Cents, ChatMessageId, EntityIdType, EntityType, LineItemId,
    MessageDirection, MessageId, MessageRole, OrderId, OrderItemId, OrderStatus, QuoteRequestId,
    QuoteRequestStatus, SupplierId, SupplierThreadStatus, TenantId, ThreadId, Timestamp,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// QUOTE REQUEST
// ============================================================================

/// One RFQ, potentially sent to several suppliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuoteRequest {
    pub quote_request_id: QuoteRequestId,
    pub tenant_id: TenantId,
    pub title: String,
    pub status: QuoteRequestStatus,
    pub selected_supplier_id: Option<SupplierId>,
    /// Negotiation round. Bumped by reopen; only threads of the current
    /// round take part in status derivation.
    pub round: u32,
    /// Suppliers that receive the RFQ when the draft is sent.
    pub invited_supplier_ids: Vec<SupplierId>,
    pub line_items: Vec<QuoteLineItem>,
    pub created_by: Option<ActorId>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl QuoteRequest {
    /// Line items the given supplier attached a price to.
    pub fn priced_items_for(&self, supplier_id: SupplierId) -> Vec<&QuoteLineItem> {
        self.line_items
            .iter()
            .filter(|item| item.supplier_id == Some(supplier_id) && item.unit_price_cents.is_some())
            .collect()
    }

    /// Sum of the supplier's priced line totals.
    pub fn supplier_total_cents(&self, supplier_id: SupplierId) -> Cents {
        self.priced_items_for(supplier_id)
            .iter()
            .filter_map(|item| item.line_total_cents())
            .sum()
    }
}

/// A requested part, optionally tagged with the supplier that priced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuoteLineItem {
    pub line_item_id: LineItemId,
    pub part_number: String,
    pub description: String,
    pub quantity: u32,
    pub supplier_id: Option<SupplierId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<i64>))]
    pub unit_price_cents: Option<Cents>,
    pub availability: Option<String>,
}

impl QuoteLineItem {
    pub fn line_total_cents(&self) -> Option<Cents> {
        self.unit_price_cents
            .map(|price| price.saturating_mul(i64::from(self.quantity)))
    }
}

// ============================================================================
// SUPPLIER THREAD
// ============================================================================

/// Junction of QuoteRequest x Supplier x email thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SupplierThread {
    pub thread_id: ThreadId,
    pub quote_request_id: QuoteRequestId,
    pub tenant_id: TenantId,
    pub supplier_id: SupplierId,
    pub status: SupplierThreadStatus,
    pub round: u32,
    /// Thread id assigned by the external mail service once linked.
    pub external_thread_id: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

// ============================================================================
// MESSAGES
// ============================================================================

/// Attachment metadata. Binary content lives in file storage and never
/// travels with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AttachmentMeta {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Structured payload the AI service attaches to a message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub search_results: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub extracted: Option<serde_json::Value>,
}

/// One email in a SupplierThread's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Message {
    pub message_id: MessageId,
    pub thread_id: ThreadId,
    pub tenant_id: TenantId,
    pub direction: MessageDirection,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub sent_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub received_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    /// Outbound only.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub expected_response_by: Option<Timestamp>,
    /// Outbound only.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub follow_up_sent_at: Option<Timestamp>,
    pub in_reply_to: Option<MessageId>,
    pub subject: Option<String>,
    pub body: String,
    pub body_html: Option<String>,
    pub attachments: Vec<AttachmentMeta>,
    pub context: Option<MessageContext>,
}

impl Message {
    /// New outbound message sent at `sent_at`.
    pub fn outbound(
        thread_id: ThreadId,
        tenant_id: TenantId,
        body: impl Into<String>,
        sent_at: Timestamp,
        expected_response_by: Option<Timestamp>,
    ) -> Self {
        Self {
            message_id: MessageId::new(Uuid::now_v7()),
            thread_id,
            tenant_id,
            direction: MessageDirection::Outbound,
            sent_at: Some(sent_at),
            received_at: None,
            created_at: sent_at,
            expected_response_by,
            follow_up_sent_at: None,
            in_reply_to: None,
            subject: None,
            body: body.into(),
            body_html: None,
            attachments: Vec::new(),
            context: None,
        }
    }

    /// New inbound message received at `received_at`.
    pub fn inbound(
        thread_id: ThreadId,
        tenant_id: TenantId,
        body: impl Into<String>,
        received_at: Timestamp,
    ) -> Self {
        Self {
            message_id: MessageId::new(Uuid::now_v7()),
            thread_id,
            tenant_id,
            direction: MessageDirection::Inbound,
            sent_at: None,
            received_at: Some(received_at),
            created_at: received_at,
            expected_response_by: None,
            follow_up_sent_at: None,
            in_reply_to: None,
            subject: None,
            body: body.into(),
            body_html: None,
            attachments: Vec::new(),
            context: None,
        }
    }

    /// First non-null of sent, received, created.
    pub fn effective_time(&self) -> Timestamp {
        self.sent_at.or(self.received_at).unwrap_or(self.created_at)
    }

    pub fn is_inbound(&self) -> bool {
        self.direction == MessageDirection::Inbound
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == MessageDirection::Outbound
    }
}

/// One entry of the assistant chat attached to a QuoteRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatMessage {
    pub chat_message_id: ChatMessageId,
    pub quote_request_id: QuoteRequestId,
    pub tenant_id: TenantId,
    pub role: MessageRole,
    pub body: String,
    pub context: Option<MessageContext>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl ChatMessage {
    pub fn new(
        quote_request_id: QuoteRequestId,
        tenant_id: TenantId,
        role: MessageRole,
        body: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            chat_message_id: ChatMessageId::new(Uuid::now_v7()),
            quote_request_id,
            tenant_id,
            role,
            body: body.into(),
            context: None,
            created_at,
        }
    }

    pub fn has_search_results(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|ctx| ctx.search_results.is_some())
    }
}

// ============================================================================
// ORDERS
// ============================================================================

/// A firm order created from an accepted quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Order {
    pub order_id: OrderId,
    pub tenant_id: TenantId,
    pub quote_request_id: QuoteRequestId,
    pub supplier_id: SupplierId,
    /// Ledger the OrderTracker reads for later updates.
    pub thread_id: ThreadId,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub shipping_carrier: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
    pub actual_delivery: Option<NaiveDate>,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub subtotal_cents: Cents,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub total_cents: Cents,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderItem {
    pub order_item_id: OrderItemId,
    pub order_id: OrderId,
    pub tenant_id: TenantId,
    pub source_line_item_id: LineItemId,
    pub part_number: String,
    pub description: String,
    pub quantity: u32,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub unit_price_cents: Cents,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub line_total_cents: Cents,
    pub availability: Option<String>,
    pub tracking_number: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
    pub actual_delivery: Option<NaiveDate>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

// ============================================================================
// ACTIVITY LOG
// ============================================================================

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ActivityLogEntry {
    pub activity_id: ActivityId,
    pub tenant_id: TenantId,
    pub subject_type: EntityType,
    pub subject_id: Uuid,
    pub kind: ActivityKind,
    pub actor_id: Option<ActorId>,
    pub summary: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl ActivityLogEntry {
    pub fn new(
        tenant_id: TenantId,
        subject_type: EntityType,
        subject_id: Uuid,
        kind: ActivityKind,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            activity_id: ActivityId::new(Uuid::now_v7()),
            tenant_id,
            subject_type,
            subject_id,
            kind,
            actor_id: None,
            summary: summary.into(),
            details: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: Option<ActorId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn line_item(supplier: Option<SupplierId>, qty: u32, price: Option<Cents>) -> QuoteLineItem {
        QuoteLineItem {
            line_item_id: LineItemId::now_v7(),
            part_number: "BRK-100".to_string(),
            description: "Brake pad set".to_string(),
            quantity: qty,
            supplier_id: supplier,
            unit_price_cents: price,
            availability: None,
        }
    }

    #[test]
    fn test_effective_time_precedence() {
        let now = Utc::now();
        let mut msg = Message::inbound(ThreadId::now_v7(), TenantId::now_v7(), "hi", now);
        msg.created_at = now - Duration::hours(2);
        assert_eq!(msg.effective_time(), now);

        msg.sent_at = Some(now - Duration::hours(1));
        assert_eq!(msg.effective_time(), now - Duration::hours(1));

        msg.sent_at = None;
        msg.received_at = None;
        assert_eq!(msg.effective_time(), now - Duration::hours(2));
    }

    #[test]
    fn test_priced_items_and_total() {
        let supplier_a = SupplierId::now_v7();
        let supplier_b = SupplierId::now_v7();
        let now = Utc::now();
        let qr = QuoteRequest {
            quote_request_id: QuoteRequestId::now_v7(),
            tenant_id: TenantId::now_v7(),
            title: "Brakes".to_string(),
            status: QuoteRequestStatus::UnderReview,
            selected_supplier_id: None,
            round: 1,
            invited_supplier_ids: vec![supplier_a, supplier_b],
            line_items: vec![
                line_item(Some(supplier_a), 4, Some(2_500)),
                line_item(Some(supplier_a), 1, None),
                line_item(Some(supplier_b), 2, Some(9_900)),
                line_item(None, 3, None),
            ],
            created_by: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(qr.priced_items_for(supplier_a).len(), 1);
        assert_eq!(qr.supplier_total_cents(supplier_a), 10_000);
        assert_eq!(qr.supplier_total_cents(supplier_b), 19_800);
    }

    #[test]
    fn test_chat_message_search_results_flag() {
        let mut msg = ChatMessage::new(
            QuoteRequestId::now_v7(),
            TenantId::now_v7(),
            MessageRole::Assistant,
            "3 parts matching your search",
            Utc::now(),
        );
        assert!(!msg.has_search_results());
        msg.context = Some(MessageContext {
            search_results: Some(serde_json::json!([{"part": "BRK-100"}])),
            ..Default::default()
        });
        assert!(msg.has_search_results());
    }
}
