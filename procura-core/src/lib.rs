//! PROCURA Core - Data types for the fleet-parts procurement lifecycle
//!
//! Quote requests, per-supplier threads and their message ledgers, orders,
//! and the audit log. This crate holds data and errors only; the lifecycle
//! rules live in `procura-lifecycle`.

mod config;
mod entities;
mod enums;
mod error;
mod identity;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
