//! Wire types exchanged with the parsing and generation service

use chrono::NaiveDate;
use procura_core::{
    AttachmentMeta, MessageContext, MessageDirection, MessageId, MessageRole, Order, OrderId,
    OrderItem, OrderItemId, QuoteRequestId, SupplierId, ThreadId, Timestamp,
};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// PARSE REQUEST
// ============================================================================

/// One ledger message as sent to the parser. Attachments travel as
/// metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMessage {
    pub message_id: MessageId,
    pub direction: MessageDirection,
    pub sent_at: Option<Timestamp>,
    pub received_at: Option<Timestamp>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
}

impl From<&procura_core::Message> for LedgerMessage {
    fn from(m: &procura_core::Message) -> Self {
        Self {
            message_id: m.message_id,
            direction: m.direction,
            sent_at: m.sent_at,
            received_at: m.received_at,
            created_at: m.created_at,
            subject: m.subject.clone(),
            body: m.body.clone(),
            body_html: m.body_html.clone(),
            attachments: m.attachments.clone(),
        }
    }
}

/// Order fields the parser may propose changes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub status: String,
    pub tracking_number: Option<String>,
    pub shipping_carrier: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
    pub items: Vec<OrderItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemSnapshot {
    pub id: OrderItemId,
    pub part_number: String,
    pub description: String,
    pub quantity: u32,
    pub availability: Option<String>,
    pub tracking_number: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
}

impl OrderSnapshot {
    pub fn new(order: &Order, items: &[OrderItem]) -> Self {
        Self {
            order_id: order.order_id,
            status: order.status.as_db_str().to_string(),
            tracking_number: order.tracking_number.clone(),
            shipping_carrier: order.shipping_carrier.clone(),
            expected_delivery: order.expected_delivery,
            items: items
                .iter()
                .map(|item| OrderItemSnapshot {
                    id: item.order_item_id,
                    part_number: item.part_number.clone(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    availability: item.availability.clone(),
                    tracking_number: item.tracking_number.clone(),
                    expected_delivery: item.expected_delivery,
                })
                .collect(),
        }
    }
}

/// Request to extract order updates from a thread's messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseRequest {
    pub thread_id: ThreadId,
    pub supplier_id: SupplierId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSnapshot>,
    pub messages: Vec<LedgerMessage>,
}

// ============================================================================
// PARSE RESPONSE
// ============================================================================

/// Structured extraction result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub success: bool,
    #[serde(default)]
    pub order_updates: Option<ParsedOrderUpdates>,
    #[serde(default)]
    pub item_updates: Vec<ParsedItemUpdate>,
    #[serde(default)]
    pub extracted_data: Option<serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Order-level candidate values. `status` stays a raw string; the tracker
/// maps it onto the closed status set and drops what it cannot read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedOrderUpdates {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub shipping_carrier: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedItemUpdate {
    pub id: OrderItemId,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub actual_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub availability: Option<String>,
}

/// Accepts `YYYY-MM-DD` or any RFC 3339 timestamp; anything else reads as
/// absent rather than failing the whole response.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().or_else(|| {
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.date_naive())
        })
    }))
}

// ============================================================================
// GENERATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub role: MessageRole,
    pub body: String,
}

/// Interactive assistant prompt with the chat so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub quote_request_id: QuoteRequestId,
    pub history: Vec<ChatTurn>,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub body: String,
    #[serde(default)]
    pub context: Option<MessageContext>,
}

/// Request for a follow-up draft on an unanswered outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    pub thread_id: ThreadId,
    pub supplier_id: SupplierId,
    pub original: LedgerMessage,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpDraft {
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

/// Thread-link lookup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadLink {
    pub external_thread_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response_reads_camel_case_payload() {
        let item_id = OrderItemId::from(uuid::Uuid::now_v7());
        let payload = json!({
            "success": true,
            "orderUpdates": {
                "trackingNumber": "1Z999",
                "shippingCarrier": "UPS",
                "expectedDelivery": "2025-06-12",
                "status": "shipped"
            },
            "itemUpdates": [
                { "id": item_id, "availability": "backordered", "expectedDelivery": "2025-06-20T00:00:00Z" }
            ],
            "confidence": 0.92,
            "suggestedActions": ["confirm delivery window"]
        });

        let response: ParseResponse = serde_json::from_value(payload).unwrap();
        assert!(response.success);
        let order = response.order_updates.unwrap();
        assert_eq!(order.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(order.expected_delivery, NaiveDate::from_ymd_opt(2025, 6, 12));
        assert_eq!(response.item_updates.len(), 1);
        assert_eq!(response.item_updates[0].id, item_id);
        assert_eq!(
            response.item_updates[0].expected_delivery,
            NaiveDate::from_ymd_opt(2025, 6, 20)
        );
    }

    #[test]
    fn test_minimal_response_defaults_optional_sections() {
        let response: ParseResponse = serde_json::from_value(json!({ "success": false })).unwrap();
        assert!(!response.success);
        assert!(response.order_updates.is_none());
        assert!(response.item_updates.is_empty());
    }

    #[test]
    fn test_unreadable_date_is_absent() {
        let updates: ParsedOrderUpdates =
            serde_json::from_value(json!({ "expectedDelivery": "next tuesday" })).unwrap();
        assert_eq!(updates.expected_delivery, None);
    }

    #[test]
    fn test_ledger_message_never_carries_attachment_content() {
        let mut m = procura_core::Message::inbound(
            ThreadId::from(uuid::Uuid::now_v7()),
            procura_core::TenantId::from(uuid::Uuid::now_v7()),
            "see attached invoice",
            chrono::Utc::now(),
        );
        m.attachments.push(AttachmentMeta {
            file_name: "invoice.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 48_213,
        });
        let wire = serde_json::to_value(LedgerMessage::from(&m)).unwrap();
        let attachment = &wire["attachments"][0];
        assert_eq!(attachment["file_name"], "invoice.pdf");
        assert_eq!(attachment.as_object().map(|o| o.len()), Some(3));
    }
}
