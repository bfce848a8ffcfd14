//! HTTP client for the parsing and generation service

use crate::config::ParserConfig;
use crate::types::{
    ChatReply, ChatRequest, FollowUpDraft, FollowUpRequest, ParseRequest, ParseResponse, ThreadLink,
};
use crate::ParsingService;
use ::async_trait::async_trait;
use procura_core::{ParserError, ProcuraResult, ThreadId};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

const PROVIDER: &str = "parser";

/// Error body the service returns alongside non-2xx statuses.
#[derive(Debug, serde::Deserialize)]
struct ServiceError {
    error: String,
}

/// reqwest-backed [`ParsingService`].
pub struct HttpParsingService {
    client: Client,
    base_url: String,
    parse_timeout: Duration,
    chat_timeout: Duration,
}

impl HttpParsingService {
    /// Build a client from configuration. Fails if no base URL is set.
    pub fn new(config: &ParserConfig) -> ProcuraResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or(ParserError::NotConfigured)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e| {
                ParserError::Transport {
                    provider: PROVIDER.to_string(),
                    reason: format!("invalid API key header value: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.parse_timeout)
            .build()
            .map_err(|e| ParserError::Transport {
                provider: PROVIDER.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            parse_timeout: config.parse_timeout,
            chat_timeout: config.chat_timeout,
        })
    }

    fn transport_error(&self, e: reqwest::Error, timeout: Duration) -> ParserError {
        if e.is_timeout() {
            ParserError::Timeout {
                provider: PROVIDER.to_string(),
                after_ms: timeout.as_millis() as u64,
            }
        } else {
            ParserError::Transport {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            }
        }
    }

    async fn post<Req: Serialize + Sync, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
        timeout: Duration,
    ) -> ProcuraResult<Res> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, timeout))?;

        let status = response.status();
        tracing::debug!(endpoint, status = %status, "Parser response received");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ServiceError>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(ParserError::RequestFailed {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let parsed = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e, timeout)
            } else {
                ParserError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    reason: format!("Failed to parse response: {}", e),
                }
            }
        })?;
        Ok(parsed)
    }
}

#[async_trait]
impl ParsingService for HttpParsingService {
    async fn parse_updates(&self, request: &ParseRequest) -> ProcuraResult<ParseResponse> {
        let response: ParseResponse = self.post("parse", request, self.parse_timeout).await?;
        if !response.success {
            return Err(ParserError::Unsuccessful {
                provider: PROVIDER.to_string(),
                reason: response
                    .error
                    .unwrap_or_else(|| "no reason given".to_string()),
            }
            .into());
        }
        Ok(response)
    }

    async fn generate_reply(&self, request: &ChatRequest) -> ProcuraResult<ChatReply> {
        self.post("chat", request, self.chat_timeout).await
    }

    async fn generate_follow_up(&self, request: &FollowUpRequest) -> ProcuraResult<FollowUpDraft> {
        self.post("follow-up", request, self.parse_timeout).await
    }

    async fn lookup_thread_link(&self, thread_id: ThreadId) -> ProcuraResult<Option<String>> {
        let url = format!("{}/threads/{}/link", self.base_url, thread_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e, self.parse_timeout))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let link: ThreadLink = response.json().await.map_err(|e| {
                    ParserError::InvalidResponse {
                        provider: PROVIDER.to_string(),
                        reason: format!("Failed to parse thread link: {}", e),
                    }
                })?;
                Ok(link.external_thread_id.filter(|id| !id.is_empty()))
            }
            status => Err(ParserError::RequestFailed {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }
            .into()),
        }
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}

impl std::fmt::Debug for HttpParsingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpParsingService")
            .field("base_url", &self.base_url)
            .field("parse_timeout", &self.parse_timeout)
            .field("chat_timeout", &self.chat_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatTurn;
    use procura_core::{EntityIdType, MessageRole, QuoteRequestId, SupplierId};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_service(base_url: &str) -> HttpParsingService {
        let config = ParserConfig {
            base_url: Some(base_url.to_string()),
            api_key: Some("test-key".to_string()),
            parse_timeout: Duration::from_secs(5),
            chat_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        HttpParsingService::new(&config).unwrap()
    }

    fn parse_request() -> ParseRequest {
        ParseRequest {
            thread_id: ThreadId::now_v7(),
            supplier_id: SupplierId::now_v7(),
            order: None,
            messages: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_parse_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "orderUpdates": { "trackingNumber": "1Z999", "status": "IN_TRANSIT" }
            })))
            .mount(&server)
            .await;

        let service = test_service(&server.uri());
        let response = service.parse_updates(&parse_request()).await.unwrap();
        assert_eq!(
            response.order_updates.unwrap().tracking_number.as_deref(),
            Some("1Z999")
        );
    }

    #[tokio::test]
    async fn test_parse_unsuccessful_result_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": false, "error": "no order data found" })),
            )
            .mount(&server)
            .await;

        let err = test_service(&server.uri())
            .parse_updates(&parse_request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no order data found"), "got: {err}");
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/parse"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({ "error": "upstream down" })))
            .mount(&server)
            .await;

        let err = test_service(&server.uri())
            .parse_updates(&parse_request())
            .await
            .unwrap_err();
        match err {
            procura_core::ProcuraError::Parser(ParserError::RequestFailed { status, message, .. }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_chat_reply_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "body": "late" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let request = ChatRequest {
            quote_request_id: QuoteRequestId::now_v7(),
            history: vec![ChatTurn {
                role: MessageRole::User,
                body: "find brake pads".to_string(),
            }],
            prompt: "find brake pads".to_string(),
        };
        let err = test_service(&server.uri())
            .generate_reply(&request)
            .await
            .unwrap_err();
        match err {
            procura_core::ProcuraError::Parser(e) => assert!(e.is_timeout(), "got: {e:?}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_thread_link_not_found_is_none() {
        let server = MockServer::start().await;
        let thread_id = ThreadId::now_v7();
        Mock::given(method("GET"))
            .and(path(format!("/threads/{}/link", thread_id)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let link = test_service(&server.uri())
            .lookup_thread_link(thread_id)
            .await
            .unwrap();
        assert_eq!(link, None);
    }

    #[tokio::test]
    async fn test_thread_link_found() {
        let server = MockServer::start().await;
        let thread_id = ThreadId::now_v7();
        Mock::given(method("GET"))
            .and(path(format!("/threads/{}/link", thread_id)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "externalThreadId": "gm-1842" })),
            )
            .mount(&server)
            .await;

        let link = test_service(&server.uri())
            .lookup_thread_link(thread_id)
            .await
            .unwrap();
        assert_eq!(link.as_deref(), Some("gm-1842"));
    }

    #[test]
    fn test_new_requires_base_url() {
        let err = HttpParsingService::new(&ParserConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            procura_core::ProcuraError::Parser(ParserError::NotConfigured)
        ));
    }

    #[test]
    fn test_debug_omits_credentials() {
        let service = test_service("http://localhost:1");
        let rendered = format!("{:?}", service);
        assert!(!rendered.contains("test-key"));
    }
}
