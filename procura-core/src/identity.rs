//! Identity types for PROCURA entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Monetary amount in integer cents of the quote currency.
pub type Cents = i64;

/// Common behavior of the strongly-typed entity identifiers.
///
/// Every id wraps a UUIDv7 so ids sort by creation time, but the wrapper keeps
/// a `ThreadId` from ever being passed where an `OrderId` is expected.
pub trait EntityIdType:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Human-readable entity name used in error messages.
    const ENTITY_NAME: &'static str;

    /// Wrap a raw UUID.
    fn new(uuid: Uuid) -> Self;

    /// Borrow the raw UUID.
    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh timestamp-sortable id.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// The all-zero id, only meaningful in tests and placeholders.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_entity_id!(
    /// Tenant (fleet operator) that owns every other record.
    TenantId,
    "Tenant"
);
define_entity_id!(
    /// User or integration acting on behalf of a tenant.
    ActorId,
    "Actor"
);
define_entity_id!(QuoteRequestId, "QuoteRequest");
define_entity_id!(SupplierId, "Supplier");
define_entity_id!(
    /// Identifies one SupplierThread (QuoteRequest x Supplier conversation).
    ThreadId,
    "SupplierThread"
);
define_entity_id!(MessageId, "Message");
define_entity_id!(ChatMessageId, "ChatMessage");
define_entity_id!(LineItemId, "LineItem");
define_entity_id!(OrderId, "Order");
define_entity_id!(OrderItemId, "OrderItem");
define_entity_id!(ActivityId, "ActivityLog");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_time_sortable() {
        let first = OrderId::now_v7();
        let second = OrderId::now_v7();
        assert!(first <= second);
    }

    #[test]
    fn test_id_parse_roundtrip_through_display() {
        let id = ThreadId::now_v7();
        let parsed: ThreadId = id.to_string().parse().expect("valid uuid");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<QuoteRequestId>().is_err());
    }

    #[test]
    fn test_id_serializes_as_bare_uuid() {
        let id = SupplierId::nil();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }
}
