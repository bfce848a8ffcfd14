//! Constants for PROCURA API
//!
//! This module contains all constant values used throughout the API.

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

pub const DEFAULT_API_PORT: u16 = 3000;

// ============================================================================
// ACTOR HEADERS
// ============================================================================

/// Set by the upstream gateway after authenticating the caller.
pub const TENANT_HEADER: &str = "x-procura-tenant-id";

pub const ACTOR_HEADER: &str = "x-procura-actor-id";

pub const ROLE_HEADER: &str = "x-procura-role";

// ============================================================================
// ASSISTANT CHAT
// ============================================================================

/// How often the chat ledger is polled after a generation timeout.
pub const DEFAULT_CHAT_POLL_INTERVAL_MS: u64 = 2_000;

/// How long the chat ledger is polled before answering "pending".
pub const DEFAULT_CHAT_POLL_BUDGET_SECS: u64 = 30;

// ============================================================================
// THREAD LINKING
// ============================================================================

pub const DEFAULT_LINK_INITIAL_DELAY_MS: u64 = 2_000;

pub const DEFAULT_LINK_BACKOFF_MULTIPLIER: u32 = 2;

pub const DEFAULT_LINK_MAX_DELAY_SECS: u64 = 60;

pub const DEFAULT_LINK_MAX_ATTEMPTS: u32 = 6;

// ============================================================================
// RESPONSE SWEEP
// ============================================================================

/// Default interval between NO_RESPONSE sweeps (5 minutes)
pub const DEFAULT_RESPONSE_SWEEP_INTERVAL_SECS: u64 = 300;

/// Maximum SENT threads examined per sweep
pub const DEFAULT_RESPONSE_SWEEP_BATCH_SIZE: usize = 100;

// ============================================================================
// REQUEST LIMITS
// ============================================================================

/// Maximum line items on one quote request
pub const MAX_LINE_ITEMS: usize = 200;

/// Maximum invited suppliers on one quote request
pub const MAX_SUPPLIERS: usize = 25;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_schedule_constants_are_sane() {
        assert!(DEFAULT_LINK_BACKOFF_MULTIPLIER >= 1);
        assert!(DEFAULT_LINK_MAX_ATTEMPTS > 0);
        assert!(DEFAULT_LINK_INITIAL_DELAY_MS <= DEFAULT_LINK_MAX_DELAY_SECS * 1_000);
    }

    #[test]
    fn test_chat_poll_interval_fits_budget() {
        assert!(DEFAULT_CHAT_POLL_INTERVAL_MS < DEFAULT_CHAT_POLL_BUDGET_SECS * 1_000);
    }
}
