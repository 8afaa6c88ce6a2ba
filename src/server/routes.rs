//! HTTP routes.
//!
//! - GET  /               landing page
//! - POST /chat           relay one message to the default provider
//! - POST /api/query      relay one prompt to a named provider
//! - POST /api/auto-route relay one prompt to a provider chosen by content
//! - GET  /health
//! - GET  /metrics        Prometheus exposition

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, Span};
use uuid::Uuid;

use crate::error::RelayError;
use crate::metrics::Metrics;
use crate::provider::ProviderKind;
use crate::relay::Relay;
use crate::server::page::INDEX_HTML;

/// Application state shared across handlers.
pub struct AppState {
    pub relay: Relay,
    pub metrics: Arc<Metrics>,
    pub start_time: Instant,
}

/// Build the axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat))
        .route("/api/query", post(query))
        .route("/api/auto-route", post(auto_route))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Assigns a v4 UUID to requests that arrive without `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Span wrapping the whole request, so relay and provider logs carry the id.
fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// JSON body extractor whose rejections use the relay's error body.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = RelayError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| RelayError::InvalidRequest(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Inbound chat request. A missing or null `message` is relayed as empty.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct AutoRouteRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoRouteResponse {
    pub response: String,
    pub model: ProviderKind,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub default_provider: ProviderKind,
    pub providers: Vec<ProviderKind>,
}

/// Missing or empty fields are rejected; whitespace is passed through as-is.
fn required(field: Option<String>, name: &str) -> Result<String, RelayError> {
    field
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RelayError::InvalidRequest(format!("{name} is required")))
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn chat(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ChatRequest>,
) -> Result<Json<ChatReply>, RelayError> {
    let message = req.message.unwrap_or_default();

    info!(
        provider = %state.relay.default_provider(),
        message_chars = message.chars().count(),
        "Chat request"
    );

    let reply = state.relay.chat(&message).await?;
    Ok(Json(ChatReply { reply }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<QueryRequest>,
) -> Result<Json<QueryResponse>, RelayError> {
    let prompt = required(req.prompt, "prompt")?;
    let model = required(req.model, "model")?;

    info!(model = model, "Query request");

    let response = state.relay.query(&model, &prompt).await?;
    Ok(Json(QueryResponse { response }))
}

async fn auto_route(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<AutoRouteRequest>,
) -> Result<Json<AutoRouteResponse>, RelayError> {
    let prompt = required(req.prompt, "prompt")?;

    info!(prompt_chars = prompt.chars().count(), "Auto-route request");

    let routed = state.relay.auto_route(&prompt).await?;
    Ok(Json(AutoRouteResponse {
        response: routed.reply,
        model: routed.provider,
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        default_provider: state.relay.default_provider(),
        providers: state.relay.configured(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
