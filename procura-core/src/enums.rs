//! Status enumerations for PROCURA entities
//!
//! Each aggregate gets a closed set of states. The string forms are what the
//! datastore and the wire carry; nothing in the lifecycle compares strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for StatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for StatusParseError {}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

// ============================================================================
// QUOTE REQUEST STATUS
// ============================================================================

/// Aggregate negotiation status of a QuoteRequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteRequestStatus {
    /// Being assembled, not yet sent to any supplier
    #[default]
    Draft,
    Sent,
    Received,
    UnderReview,
    Approved,
    Rejected,
    Expired,
    ConvertedToOrder,
}

impl QuoteRequestStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            QuoteRequestStatus::Draft => "DRAFT",
            QuoteRequestStatus::Sent => "SENT",
            QuoteRequestStatus::Received => "RECEIVED",
            QuoteRequestStatus::UnderReview => "UNDER_REVIEW",
            QuoteRequestStatus::Approved => "APPROVED",
            QuoteRequestStatus::Rejected => "REJECTED",
            QuoteRequestStatus::Expired => "EXPIRED",
            QuoteRequestStatus::ConvertedToOrder => "CONVERTED_TO_ORDER",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match normalize(s).as_str() {
            "DRAFT" => Ok(QuoteRequestStatus::Draft),
            "SENT" => Ok(QuoteRequestStatus::Sent),
            "RECEIVED" => Ok(QuoteRequestStatus::Received),
            "UNDER_REVIEW" => Ok(QuoteRequestStatus::UnderReview),
            "APPROVED" => Ok(QuoteRequestStatus::Approved),
            "REJECTED" => Ok(QuoteRequestStatus::Rejected),
            "EXPIRED" => Ok(QuoteRequestStatus::Expired),
            "CONVERTED_TO_ORDER" => Ok(QuoteRequestStatus::ConvertedToOrder),
            _ => Err(StatusParseError {
                kind: "quote request status",
                value: s.to_string(),
            }),
        }
    }

    /// Terminal statuses are never overwritten by derivation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuoteRequestStatus::ConvertedToOrder | QuoteRequestStatus::Expired
        )
    }

    /// Statuses from which a supplier quote may be accepted.
    pub fn can_accept(&self) -> bool {
        matches!(
            self,
            QuoteRequestStatus::Received | QuoteRequestStatus::UnderReview
        )
    }

    /// Statuses from which the explicit reopen action is allowed.
    pub fn can_reopen(&self) -> bool {
        matches!(
            self,
            QuoteRequestStatus::Rejected | QuoteRequestStatus::Expired
        )
    }

    /// Statuses in which new supplier threads may be started.
    pub fn is_negotiating(&self) -> bool {
        matches!(
            self,
            QuoteRequestStatus::Sent
                | QuoteRequestStatus::Received
                | QuoteRequestStatus::UnderReview
        )
    }
}

impl fmt::Display for QuoteRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for QuoteRequestStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// SUPPLIER THREAD STATUS
// ============================================================================

/// Negotiation status of one supplier's conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierThreadStatus {
    #[default]
    Sent,
    Responded,
    NoResponse,
    Accepted,
    Rejected,
    /// Another supplier's quote was accepted
    NotSelected,
}

impl SupplierThreadStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SupplierThreadStatus::Sent => "SENT",
            SupplierThreadStatus::Responded => "RESPONDED",
            SupplierThreadStatus::NoResponse => "NO_RESPONSE",
            SupplierThreadStatus::Accepted => "ACCEPTED",
            SupplierThreadStatus::Rejected => "REJECTED",
            SupplierThreadStatus::NotSelected => "NOT_SELECTED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match normalize(s).as_str() {
            "SENT" => Ok(SupplierThreadStatus::Sent),
            "RESPONDED" => Ok(SupplierThreadStatus::Responded),
            "NO_RESPONSE" => Ok(SupplierThreadStatus::NoResponse),
            "ACCEPTED" => Ok(SupplierThreadStatus::Accepted),
            "REJECTED" => Ok(SupplierThreadStatus::Rejected),
            "NOT_SELECTED" => Ok(SupplierThreadStatus::NotSelected),
            _ => Err(StatusParseError {
                kind: "supplier thread status",
                value: s.to_string(),
            }),
        }
    }

    /// Whether the thread is still open for a decision (accept or reject).
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            SupplierThreadStatus::Sent
                | SupplierThreadStatus::Responded
                | SupplierThreadStatus::NoResponse
        )
    }
}

impl fmt::Display for SupplierThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for SupplierThreadStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// ORDER STATUS
// ============================================================================

/// Fulfillment status of an Order.
///
/// The ranked statuses form a total order (see [`OrderStatus::hierarchy_index`]);
/// `Cancelled` sits outside it as an absorbing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in hierarchy order followed by `Cancelled`.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Position in the fulfillment hierarchy. `None` for `Cancelled`.
    pub fn hierarchy_index(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::InTransit => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse from database string representation.
    ///
    /// Accepts the American spelling `CANCELED` as well, since supplier
    /// emails use both.
    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match normalize(s).as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "IN_TRANSIT" | "SHIPPED" => Ok(OrderStatus::InTransit),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" | "CANCELED" => Ok(OrderStatus::Cancelled),
            _ => Err(StatusParseError {
                kind: "order status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// MESSAGE ENUMS
// ============================================================================

/// Direction of an email relative to the fleet operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageDirection {
    Outbound,
    Inbound,
}

impl MessageDirection {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MessageDirection::Outbound => "OUTBOUND",
            MessageDirection::Inbound => "INBOUND",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match normalize(s).as_str() {
            "OUTBOUND" => Ok(MessageDirection::Outbound),
            "INBOUND" => Ok(MessageDirection::Inbound),
            _ => Err(StatusParseError {
                kind: "message direction",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Author role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageRole {
    User,
    /// Generated by the AI service
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MessageRole::User => "USER",
            MessageRole::Assistant => "ASSISTANT",
            MessageRole::System => "SYSTEM",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match normalize(s).as_str() {
            "USER" => Ok(MessageRole::User),
            "ASSISTANT" => Ok(MessageRole::Assistant),
            "SYSTEM" => Ok(MessageRole::System),
            _ => Err(StatusParseError {
                kind: "message role",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Entity type discriminator for error reporting and audit subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityType {
    QuoteRequest,
    SupplierThread,
    Message,
    ChatMessage,
    Order,
    OrderItem,
    ActivityLog,
}

/// Kind of an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    QuoteSent,
    SupplierAdded,
    QuoteAccepted,
    QuoteRejected,
    QuoteReopened,
    ConversionCompensated,
    OrderUpdatesApplied,
    FollowUpSent,
    ThreadMarkedNoResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_request_status_db_roundtrip() {
        for status in [
            QuoteRequestStatus::Draft,
            QuoteRequestStatus::Sent,
            QuoteRequestStatus::Received,
            QuoteRequestStatus::UnderReview,
            QuoteRequestStatus::Approved,
            QuoteRequestStatus::Rejected,
            QuoteRequestStatus::Expired,
            QuoteRequestStatus::ConvertedToOrder,
        ] {
            assert_eq!(QuoteRequestStatus::from_db_str(status.as_db_str()), Ok(status));
        }
    }

    #[test]
    fn test_status_parse_is_lenient_about_case_and_separators() {
        assert_eq!(
            "under-review".parse::<QuoteRequestStatus>(),
            Ok(QuoteRequestStatus::UnderReview)
        );
        assert_eq!(
            "no response".parse::<SupplierThreadStatus>(),
            Ok(SupplierThreadStatus::NoResponse)
        );
        assert_eq!("canceled".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        let err = OrderStatus::from_db_str("lost").unwrap_err();
        assert_eq!(err.kind, "order status");
        assert!(err.to_string().contains("lost"));
    }

    #[test]
    fn test_order_hierarchy_is_total_over_ranked_statuses() {
        let ranked: Vec<u8> = OrderStatus::ALL
            .iter()
            .filter_map(|s| s.hierarchy_index())
            .collect();
        assert_eq!(ranked, vec![0, 1, 2, 3]);
        assert_eq!(OrderStatus::Cancelled.hierarchy_index(), None);
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&QuoteRequestStatus::ConvertedToOrder).unwrap();
        assert_eq!(json, "\"CONVERTED_TO_ORDER\"");
        let status: SupplierThreadStatus = serde_json::from_str("\"NOT_SELECTED\"").unwrap();
        assert_eq!(status, SupplierThreadStatus::NotSelected);
    }

    #[test]
    fn test_terminal_and_eligibility_predicates() {
        assert!(QuoteRequestStatus::Expired.is_terminal());
        assert!(QuoteRequestStatus::ConvertedToOrder.is_terminal());
        assert!(!QuoteRequestStatus::Rejected.is_terminal());
        assert!(QuoteRequestStatus::UnderReview.can_accept());
        assert!(QuoteRequestStatus::Received.can_accept());
        assert!(!QuoteRequestStatus::Sent.can_accept());
        assert!(QuoteRequestStatus::Expired.can_reopen());
        assert!(!SupplierThreadStatus::NotSelected.is_open());
    }
}
