//! API request and response types
//!
//! Domain records from `procura-core` are returned as-is; this module only
//! adds the request bodies and the composite responses of multi-step
//! operations.

use procura_core::{
    AttachmentMeta, Cents, ChatMessage, Message, MessageContext, MessageId, Order, OrderId,
    OrderItem, QuoteLineItem, QuoteRequest, QuoteRequestId, QuoteRequestStatus, SupplierId,
    SupplierThread, ThreadId, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::jobs::EnrichmentRecord;

// ============================================================================
// QUOTE REQUESTS
// ============================================================================

/// A part requested on a new quote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewLineItem {
    pub part_number: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
}

/// Request to create a DRAFT quote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateQuoteRequest {
    pub title: String,
    pub line_items: Vec<NewLineItem>,
    /// Suppliers that receive the RFQ on send.
    #[serde(default)]
    pub supplier_ids: Vec<SupplierId>,
}

/// A quote request together with all of its supplier threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuoteRequestDetail {
    pub quote_request: QuoteRequest,
    /// Every round, oldest first.
    pub threads: Vec<SupplierThread>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AddSupplierRequest {
    pub supplier_id: Option<SupplierId>,
}

/// One line of a supplier's quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PricedItem {
    pub part_number: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub unit_price_cents: Cents,
    #[serde(default)]
    pub availability: Option<String>,
}

/// Replace the priced lines a supplier quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecordPricingRequest {
    pub supplier_id: Option<SupplierId>,
    pub items: Vec<PricedItem>,
}

// ============================================================================
// CONVERSION
// ============================================================================

/// Target of an accept or reject action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ThreadSelection {
    pub thread_id: Option<ThreadId>,
    pub supplier_id: Option<SupplierId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct AcceptPreviewQuery {
    pub thread_id: ThreadId,
}

/// What accepting a supplier's quote would do. Shown for confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AcceptPreview {
    pub quote_request_id: QuoteRequestId,
    pub thread_id: ThreadId,
    pub supplier_id: SupplierId,
    pub items: Vec<QuoteLineItem>,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub total_cents: Cents,
    /// Other suppliers of the current round that will be marked NOT_SELECTED.
    pub declined_count: usize,
    pub declined_thread_ids: Vec<ThreadId>,
}

/// Result of a completed accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AcceptOutcome {
    pub quote_request: QuoteRequest,
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub declined_thread_ids: Vec<ThreadId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RejectOutcome {
    pub thread: SupplierThread,
    pub quote_request: QuoteRequest,
}

// ============================================================================
// ORDERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// An order as served over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderResponse {
    #[serde(flatten)]
    pub detail: OrderDetail,
    /// How the most recent background sync of this order ended.
    pub last_background_sync: Option<EnrichmentRecord>,
}

/// Result of reconciling an order against its post-creation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SyncOutcome {
    pub order_id: OrderId,
    /// Ledger messages sent to the parsing service.
    pub messages_considered: usize,
    /// Fields that actually changed, order and items together.
    pub applied: usize,
    /// Item updates that could not be stored.
    pub failed_items: usize,
}

// ============================================================================
// MESSAGE LEDGER
// ============================================================================

/// An email received from a supplier, delivered by the mail integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InboundMessageRequest {
    pub thread_id: ThreadId,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub body_html: Option<String>,
    /// Defaults to the time the webhook is handled.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub received_at: Option<Timestamp>,
    #[serde(default)]
    pub in_reply_to: Option<MessageId>,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
    #[serde(default)]
    pub context: Option<MessageContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InboundOutcome {
    pub message: Message,
    pub thread: SupplierThread,
    pub quote_request_status: QuoteRequestStatus,
    /// Order whose background sync this message triggered.
    pub order_sync: Option<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OutboundMessageRequest {
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub body_html: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub sent_at: Option<Timestamp>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub expected_response_by: Option<Timestamp>,
    #[serde(default)]
    pub in_reply_to: Option<MessageId>,
}

// ============================================================================
// ASSISTANT CHAT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PostChatRequest {
    pub body: String,
}

/// A reply the generation service delivers after the interactive call gave up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AssistantReplyRequest {
    pub quote_request_id: QuoteRequestId,
    pub body: String,
    #[serde(default)]
    pub context: Option<MessageContext>,
}

/// Assistant reply state after posting a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatReplyState {
    Ready { message: ChatMessage },
    /// Still being generated; it will appear in the chat ledger.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatPostOutcome {
    pub user_message: ChatMessage,
    pub reply: ChatReplyState,
}

// ============================================================================
// THREAD LINKING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LinkWatchCancelled {
    pub thread_id: ThreadId,
    /// False when no watch was pending.
    pub cancelled: bool,
}
