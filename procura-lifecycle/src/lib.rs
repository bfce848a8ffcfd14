//! PROCURA Lifecycle - negotiation and fulfillment rules
//!
//! Pure functions over snapshots of the procurement state:
//!
//! - [`status`]: aggregate QuoteRequest status from its supplier threads
//! - [`follow_up`]: outbound messages whose response is overdue
//! - [`consolidate`]: folding near-duplicate assistant chat messages
//! - [`merge`]: monotonic application of supplier-reported order updates
//! - [`tracker`]: which ledger messages the order tracker forwards
//!
//! Nothing here performs I/O. Services read fresh state, call these
//! functions and persist the outcome.

pub mod consolidate;
pub mod follow_up;
pub mod merge;
pub mod status;
pub mod tracker;

pub use consolidate::{consolidate, consolidate_groups, is_duplicate, ConsolidatedMessage};
pub use follow_up::{days_overdue, detect_overdue, is_reply_to, overdue_in_thread, OverdueMessage};
pub use merge::{apply_item_update, apply_order_update, merge_status, ItemUpdate, OrderUpdate};
pub use status::{current_round, derive_status, ThreadSnapshot};
pub use tracker::post_creation_messages;
