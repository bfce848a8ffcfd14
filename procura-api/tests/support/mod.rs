//! Shared helpers for the HTTP-level tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use procura_api::constants::{ACTOR_HEADER, ROLE_HEADER, TENANT_HEADER};
use procura_api::jobs::ThreadLinkConfig;
use procura_api::{create_router, ApiConfig, AppState};
use procura_core::{ActorId, EntityIdType, LifecycleConfig, TenantId};
use procura_parser::ParsingService;
use procura_storage::ProcurementStore;
use serde_json::Value;
use tower::ServiceExt;

/// A router over the given store and parser, plus one caller identity.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
}

impl TestApp {
    pub fn new(store: Arc<dyn ProcurementStore>, parser: Arc<dyn ParsingService>) -> Self {
        Self::with_tenant(store, parser, TenantId::now_v7())
    }

    pub fn with_tenant(
        store: Arc<dyn ProcurementStore>,
        parser: Arc<dyn ParsingService>,
        tenant_id: TenantId,
    ) -> Self {
        let state = AppState::new(
            store,
            parser,
            LifecycleConfig::default(),
            ApiConfig::default(),
            ThreadLinkConfig::default(),
        );
        let router = create_router(state.clone());
        Self {
            state,
            router,
            tenant_id,
            actor_id: ActorId::now_v7(),
        }
    }

    /// Issue a request. `role` of `None` sends no actor headers at all.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        role: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder
                .header(TENANT_HEADER, self.tenant_id.to_string())
                .header(ACTOR_HEADER, self.actor_id.to_string())
                .header(ROLE_HEADER, role);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn buyer(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(method, uri, Some("BUYER"), body).await
    }

    pub async fn viewer(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        self.request(method, uri, Some("VIEWER"), None).await
    }

    /// Stop background link watches started by the requests.
    pub fn shutdown(&self) {
        self.state.shutdown.cancel();
    }
}

/// Read a string field as a typed id.
pub fn id_at<T: std::str::FromStr>(value: &Value, pointer: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("no string at {pointer} in {value}"))
        .parse()
        .unwrap()
}
