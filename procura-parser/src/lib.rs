//! PROCURA Parser - external parsing and generation service seam
//!
//! The service reads supplier emails and returns structured order updates,
//! drafts follow-up emails, answers assistant chat prompts and reports
//! when the mail backend has linked a thread. This crate defines the
//! [`ParsingService`] trait, its wire types, a reqwest implementation and a
//! scripted mock.

mod client;
mod config;
mod mock;
mod types;

pub use client::HttpParsingService;
pub use config::{
    ParserConfig, DEFAULT_CHAT_TIMEOUT_SECS, DEFAULT_PARSE_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
pub use mock::MockParsingService;
pub use types::{
    ChatReply, ChatRequest, ChatTurn, FollowUpDraft, FollowUpRequest, LedgerMessage,
    OrderItemSnapshot, OrderSnapshot, ParseRequest, ParseResponse, ParsedItemUpdate,
    ParsedOrderUpdates, ThreadLink,
};

use ::async_trait::async_trait;
use procura_core::{ParserError, ProcuraResult, ThreadId};

// ============================================================================
// PARSING SERVICE TRAIT
// ============================================================================

/// External parsing / generation service.
///
/// Calls block the caller until the service answers or the configured
/// timeout elapses; a timeout surfaces as `ParserError::Timeout`.
#[async_trait]
pub trait ParsingService: Send + Sync {
    /// Extract order and item updates from ledger messages.
    async fn parse_updates(&self, request: &ParseRequest) -> ProcuraResult<ParseResponse>;

    /// Generate an assistant chat reply.
    async fn generate_reply(&self, request: &ChatRequest) -> ProcuraResult<ChatReply>;

    /// Draft a follow-up email for an overdue outbound message.
    async fn generate_follow_up(&self, request: &FollowUpRequest) -> ProcuraResult<FollowUpDraft>;

    /// External thread id once the mail backend has linked the thread.
    async fn lookup_thread_link(&self, thread_id: ThreadId) -> ProcuraResult<Option<String>>;

    /// Name used in logs and error messages.
    fn provider_name(&self) -> &str;
}

/// Stand-in used when no service URL is configured. Every call fails with
/// `ParserError::NotConfigured`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledParsingService;

#[async_trait]
impl ParsingService for DisabledParsingService {
    async fn parse_updates(&self, _request: &ParseRequest) -> ProcuraResult<ParseResponse> {
        Err(ParserError::NotConfigured.into())
    }

    async fn generate_reply(&self, _request: &ChatRequest) -> ProcuraResult<ChatReply> {
        Err(ParserError::NotConfigured.into())
    }

    async fn generate_follow_up(&self, _request: &FollowUpRequest) -> ProcuraResult<FollowUpDraft> {
        Err(ParserError::NotConfigured.into())
    }

    async fn lookup_thread_link(&self, _thread_id: ThreadId) -> ProcuraResult<Option<String>> {
        Err(ParserError::NotConfigured.into())
    }

    fn provider_name(&self) -> &str {
        "disabled"
    }
}
