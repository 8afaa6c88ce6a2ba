//! Test utilities: an in-process fake vendor API.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use chat_relay::provider::{ProviderKind, ProviderSettings};

/// One request received by the fake vendor.
#[derive(Debug, Clone)]
pub struct Captured {
    pub headers: HeaderMap,
    pub uri: Uri,
    pub body: Value,
}

#[derive(Clone)]
struct Behavior {
    status: StatusCode,
    body: String,
    delay: Duration,
    seen: Arc<Mutex<Vec<Captured>>>,
}

/// A running fake vendor.
pub struct FakeVendor {
    pub base_url: String,
    seen: Arc<Mutex<Vec<Captured>>>,
}

impl FakeVendor {
    /// Start a vendor that answers every request with `status` and `body`.
    pub async fn start(status: u16, body: &str) -> Self {
        Self::start_delayed(status, body, Duration::ZERO).await
    }

    /// Like [`FakeVendor::start`], sleeping `delay` before answering.
    pub async fn start_delayed(status: u16, body: &str, delay: Duration) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let behavior = Behavior {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            delay,
            seen: seen.clone(),
        };

        let app = Router::new().fallback(respond).with_state(behavior);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            seen,
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<Captured> {
        self.seen.lock().unwrap().clone()
    }

    /// Provider settings pointing at this vendor.
    pub fn settings(&self, kind: ProviderKind) -> ProviderSettings {
        let mut settings = ProviderSettings::new(kind, "test-key");
        settings.endpoint = format!("{}/v1/endpoint", self.base_url);
        settings.timeout = Duration::from_secs(5);
        settings.connect_timeout = Duration::from_secs(1);
        settings
    }
}

async fn respond(
    State(behavior): State<Behavior>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let body = serde_json::from_str(&body).unwrap_or(Value::Null);
    behavior.seen.lock().unwrap().push(Captured { headers, uri, body });

    if !behavior.delay.is_zero() {
        tokio::time::sleep(behavior.delay).await;
    }

    (
        behavior.status,
        [(header::CONTENT_TYPE, "application/json")],
        behavior.body.clone(),
    )
        .into_response()
}

/// An address where nothing is listening.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1/endpoint")
}

/// A well-formed OpenAI-style completion body.
pub fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}
