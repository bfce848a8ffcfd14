//! Service Layer
//!
//! Business logic behind the routes. Services read fresh state from the
//! store, apply the lifecycle rules and persist the outcome; routes only
//! extract inputs and shape responses.

mod activity_service;
mod chat_service;
mod conversion_service;
mod follow_up_service;
mod ledger_service;
mod lookup;
mod quote_service;
mod tracking_service;

pub use activity_service::*;
pub use chat_service::*;
pub use conversion_service::*;
pub use follow_up_service::*;
pub use ledger_service::*;
pub use lookup::*;
pub use quote_service::*;
pub use tracking_service::*;
