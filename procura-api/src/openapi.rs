//! OpenAPI Specification for PROCURA API
//!
//! The document is generated by utoipa from the route annotations and the
//! schema derives on request, response and domain types.

use utoipa::OpenApi;

use crate::auth::Role;
use crate::error::{ApiError, ErrorCode};
use crate::jobs::{EnrichmentOutcome, EnrichmentRecord};
use crate::routes::health::{HealthResponse, HealthStatus};
use crate::types::*;

// Import route modules for path references
use crate::routes::{health, orders, quote_requests, threads, webhooks};

use procura_core::{
    ActivityKind, ActivityLogEntry, ActorId, AttachmentMeta, ChatMessage, ChatMessageId,
    EntityType, LineItemId, Message, MessageContext, MessageDirection, MessageId, MessageRole,
    Order, OrderId, OrderItem, OrderItemId, OrderStatus, QuoteLineItem, QuoteRequest,
    QuoteRequestId, QuoteRequestStatus, SupplierId, SupplierThread, SupplierThreadStatus,
    TenantId, ThreadId,
};
use procura_lifecycle::{ConsolidatedMessage, ItemUpdate, OrderUpdate, OverdueMessage};

/// OpenAPI document for PROCURA API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "PROCURA API",
        version = "0.4.0",
        description = "Procurement lifecycle for fleet parts: quote requests, supplier threads, orders",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "PROCURA", url = "https://procura.run")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Quote Requests", description = "Intake, sending, pricing and conversion to orders"),
        (name = "Conversion", description = "Accepting, rejecting and reopening supplier quotes"),
        (name = "Threads", description = "Per-supplier message ledgers"),
        (name = "Follow-ups", description = "Overdue detection and supplier reminders"),
        (name = "Assistant", description = "Assistant conversation attached to a quote request"),
        (name = "Orders", description = "Order tracking and supplier mail sync"),
        (name = "Activity", description = "Audit trail"),
        (name = "Webhooks", description = "Mail integration and generation callbacks"),
        (name = "Health", description = "Liveness")
    ),
    paths(
        // === Quote Request Routes ===
        quote_requests::create_quote_request,
        quote_requests::get_quote_request,
        quote_requests::send_quote_request,
        quote_requests::add_supplier,
        quote_requests::record_pricing,
        quote_requests::preview_accept,
        quote_requests::accept_quote,
        quote_requests::reject_quote,
        quote_requests::reopen_quote_request,
        quote_requests::list_overdue,
        quote_requests::get_chat,
        quote_requests::post_chat_message,
        quote_requests::list_activity,

        // === Thread Routes ===
        threads::list_messages,
        threads::record_outbound,
        threads::send_follow_up,
        threads::cancel_link_watch,

        // === Order Routes ===
        orders::get_order,
        orders::sync_order,
        orders::list_activity,

        // === Webhook Routes ===
        webhooks::inbound_email,
        webhooks::assistant_reply,

        // === Health Routes ===
        health::liveness,
        health::health,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode, Role,

            // === Identifiers ===
            TenantId, ActorId, QuoteRequestId, SupplierId, ThreadId, MessageId,
            ChatMessageId, LineItemId, OrderId, OrderItemId,

            // === Domain Types ===
            QuoteRequest, QuoteLineItem, SupplierThread, Message, AttachmentMeta,
            MessageContext, ChatMessage, Order, OrderItem, ActivityLogEntry,
            QuoteRequestStatus, SupplierThreadStatus, OrderStatus, MessageDirection,
            MessageRole, EntityType, ActivityKind,

            // === Lifecycle Types ===
            ConsolidatedMessage, OverdueMessage, OrderUpdate, ItemUpdate,

            // === Quote Request Types ===
            NewLineItem, CreateQuoteRequest, QuoteRequestDetail, AddSupplierRequest,
            PricedItem, RecordPricingRequest, ThreadSelection, AcceptPreview,
            AcceptOutcome, RejectOutcome,

            // === Order Types ===
            OrderDetail, OrderResponse, SyncOutcome, EnrichmentOutcome, EnrichmentRecord,

            // === Ledger Types ===
            InboundMessageRequest, InboundOutcome, OutboundMessageRequest, LinkWatchCancelled,

            // === Chat Types ===
            PostChatRequest, AssistantReplyRequest, ChatReplyState, ChatPostOutcome,

            // === Health Types ===
            HealthResponse, HealthStatus,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Pretty-printed JSON rendering of the document.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_resource() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/quote-requests",
            "/api/v1/quote-requests/{id}/accept",
            "/api/v1/quote-requests/{id}/chat",
            "/api/v1/threads/{id}/messages/{message_id}/follow-up",
            "/api/v1/threads/{id}/link-watch",
            "/api/v1/orders/{id}/sync",
            "/api/v1/webhooks/inbound-email",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_document_serializes() {
        let json = ApiDoc::to_json().unwrap();
        assert!(json.contains("PROCURA API"));
        assert!(json.contains("QuoteRequestStatus"));
    }

    #[test]
    fn test_timestamps_documented_as_date_time_strings() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = &doc["components"]["schemas"];

        let created_at = &schemas["QuoteRequest"]["properties"]["created_at"];
        assert_eq!(created_at["type"], "string");
        assert_eq!(created_at["format"], "date-time");

        let total = &schemas["Order"]["properties"]["total_cents"];
        assert_eq!(total["type"], "integer");
    }
}
