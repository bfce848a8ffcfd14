//! Scripted in-memory parsing service for tests

use crate::types::{
    ChatReply, ChatRequest, FollowUpDraft, FollowUpRequest, ParseRequest, ParseResponse,
};
use crate::ParsingService;
use ::async_trait::async_trait;
use procura_core::{ProcuraResult, ThreadId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock parsing service.
///
/// Scripted results are consumed in order; once a script runs dry the mock
/// falls back to a benign default (successful empty parse, canned chat
/// reply, canned follow-up, immediate thread link).
#[derive(Debug, Default)]
pub struct MockParsingService {
    parse_script: Mutex<VecDeque<ProcuraResult<ParseResponse>>>,
    chat_script: Mutex<VecDeque<ProcuraResult<ChatReply>>>,
    follow_up_script: Mutex<VecDeque<ProcuraResult<FollowUpDraft>>>,
    /// Lookups that still report "not linked yet", per thread.
    pending_links: Mutex<HashMap<ThreadId, u32>>,
    parse_requests: Mutex<Vec<ParseRequest>>,
    latency: Option<Duration>,
    parse_calls: AtomicUsize,
    chat_calls: AtomicUsize,
    follow_up_calls: AtomicUsize,
    link_calls: AtomicUsize,
}

impl MockParsingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parse_result(mut self, result: ProcuraResult<ParseResponse>) -> Self {
        self.parse_script.get_mut().push_back(result);
        self
    }

    pub fn with_chat_result(mut self, result: ProcuraResult<ChatReply>) -> Self {
        self.chat_script.get_mut().push_back(result);
        self
    }

    pub fn with_follow_up_result(mut self, result: ProcuraResult<FollowUpDraft>) -> Self {
        self.follow_up_script.get_mut().push_back(result);
        self
    }

    /// Report `thread_id` as unlinked for the next `attempts` lookups.
    pub fn with_link_after(mut self, thread_id: ThreadId, attempts: u32) -> Self {
        self.pending_links.get_mut().insert(thread_id, attempts);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn push_parse_result(&self, result: ProcuraResult<ParseResponse>) {
        self.parse_script.lock().await.push_back(result);
    }

    pub async fn set_link_after(&self, thread_id: ThreadId, attempts: u32) {
        self.pending_links.lock().await.insert(thread_id, attempts);
    }

    /// Parse requests received so far.
    pub async fn parse_requests(&self) -> Vec<ParseRequest> {
        self.parse_requests.lock().await.clone()
    }

    pub fn parse_calls(&self) -> usize {
        self.parse_calls.load(Ordering::Relaxed)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::Relaxed)
    }

    pub fn follow_up_calls(&self) -> usize {
        self.follow_up_calls.load(Ordering::Relaxed)
    }

    pub fn link_calls(&self) -> usize {
        self.link_calls.load(Ordering::Relaxed)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ParsingService for MockParsingService {
    async fn parse_updates(&self, request: &ParseRequest) -> ProcuraResult<ParseResponse> {
        self.parse_calls.fetch_add(1, Ordering::Relaxed);
        self.parse_requests.lock().await.push(request.clone());
        self.simulate_latency().await;
        let scripted = self.parse_script.lock().await.pop_front();
        scripted.unwrap_or_else(|| {
            Ok(ParseResponse {
                success: true,
                ..Default::default()
            })
        })
    }

    async fn generate_reply(&self, request: &ChatRequest) -> ProcuraResult<ChatReply> {
        self.chat_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        let scripted = self.chat_script.lock().await.pop_front();
        scripted.unwrap_or_else(|| {
            Ok(ChatReply {
                body: format!("Looking into \"{}\" now.", request.prompt),
                context: None,
            })
        })
    }

    async fn generate_follow_up(&self, request: &FollowUpRequest) -> ProcuraResult<FollowUpDraft> {
        self.follow_up_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        let scripted = self.follow_up_script.lock().await.pop_front();
        scripted.unwrap_or_else(|| {
            Ok(FollowUpDraft {
                subject: request.original.subject.as_ref().map(|s| format!("Re: {}", s)),
                body: format!(
                    "Following up on our request from {} day(s) ago.",
                    request.days_overdue
                ),
            })
        })
    }

    async fn lookup_thread_link(&self, thread_id: ThreadId) -> ProcuraResult<Option<String>> {
        self.link_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        let mut pending = self.pending_links.lock().await;
        match pending.get_mut(&thread_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(None)
            }
            _ => Ok(Some(format!("ext-{}", thread_id))),
        }
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::{EntityIdType, ParserError, ProcuraError, SupplierId};

    fn parse_request() -> ParseRequest {
        ParseRequest {
            thread_id: ThreadId::now_v7(),
            supplier_id: SupplierId::now_v7(),
            order: None,
            messages: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_scripted_results_are_consumed_in_order() {
        let mock = MockParsingService::new()
            .with_parse_result(Err(ParserError::Timeout {
                provider: "mock".to_string(),
                after_ms: 10,
            }
            .into()))
            .with_parse_result(Ok(ParseResponse {
                success: true,
                confidence: Some(0.8),
                ..Default::default()
            }));

        assert!(mock.parse_updates(&parse_request()).await.is_err());
        let second = mock.parse_updates(&parse_request()).await.unwrap();
        assert_eq!(second.confidence, Some(0.8));
        let fallback = mock.parse_updates(&parse_request()).await.unwrap();
        assert!(fallback.success);
        assert_eq!(mock.parse_calls(), 3);
        assert_eq!(mock.parse_requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_link_reported_after_pending_attempts() {
        let thread = ThreadId::now_v7();
        let mock = MockParsingService::new().with_link_after(thread, 2);
        assert_eq!(mock.lookup_thread_link(thread).await.unwrap(), None);
        assert_eq!(mock.lookup_thread_link(thread).await.unwrap(), None);
        assert_eq!(
            mock.lookup_thread_link(thread).await.unwrap(),
            Some(format!("ext-{}", thread))
        );
    }

    #[tokio::test]
    async fn test_scripted_error_passes_through() {
        let mock = MockParsingService::new().with_chat_result(Err(ParserError::Unsuccessful {
            provider: "mock".to_string(),
            reason: "model overloaded".to_string(),
        }
        .into()));
        let request = ChatRequest {
            quote_request_id: procura_core::QuoteRequestId::now_v7(),
            history: Vec::new(),
            prompt: "hello".to_string(),
        };
        let err = mock.generate_reply(&request).await.unwrap_err();
        assert!(matches!(err, ProcuraError::Parser(ParserError::Unsuccessful { .. })));
    }
}
