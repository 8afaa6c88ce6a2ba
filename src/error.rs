//! Error types for the relay.
//!
//! [`RelayError`] is the single result type of every chat call. It maps onto an
//! HTTP response so handlers can return it directly with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::provider::ProviderKind;

/// Maximum number of characters of an upstream body echoed back in diagnostics.
const EXCERPT_LIMIT: usize = 512;

/// Failure of a single relayed chat call.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The upstream could not be reached or the connection broke.
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// The upstream did not answer within the configured deadline.
    #[error("upstream request timed out: {0}")]
    Timeout(String),

    /// The vendor answered with an error payload or a non-success status.
    #[error("vendor error ({status}): {message}")]
    Vendor { status: u16, message: String },

    /// The vendor answered, but not in the expected shape.
    #[error("malformed vendor response: {0}")]
    MalformedResponse(String),

    /// The inbound request is missing a required field.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),

    /// The provider exists but no credential was configured for it.
    #[error("provider {0} is not configured")]
    ProviderNotConfigured(ProviderKind),
}

/// A provider name that does not match any supported vendor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs can carry credentials in the query string.
        let err = err.without_url();
        if err.is_timeout() {
            RelayError::Timeout(err.to_string())
        } else {
            RelayError::Transport(err.to_string())
        }
    }
}

impl RelayError {
    /// Short machine-readable label, used in error bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Transport(_) => "transport",
            RelayError::Timeout(_) => "timeout",
            RelayError::Vendor { .. } => "vendor",
            RelayError::MalformedResponse(_) => "malformed_response",
            RelayError::InvalidRequest(_) => "invalid_request",
            RelayError::UnknownProvider(_) => "unknown_provider",
            RelayError::ProviderNotConfigured(_) => "provider_not_configured",
        }
    }

    /// HTTP status returned to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Vendor { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            RelayError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            RelayError::InvalidRequest(_)
            | RelayError::UnknownProvider(_)
            | RelayError::ProviderNotConfigured(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The human-readable part of the error, without the variant prefix.
    fn message(&self) -> String {
        match self {
            RelayError::Vendor { message, .. } => message.clone(),
            RelayError::Transport(m)
            | RelayError::Timeout(m)
            | RelayError::MalformedResponse(m)
            | RelayError::InvalidRequest(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

/// JSON error body: `{ "error": { "kind": ..., "message": ... } }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.message(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Truncate an upstream body for inclusion in a diagnostic message.
pub fn excerpt(body: &str) -> String {
    if body.chars().count() <= EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut out: String = body.chars().take(EXCERPT_LIMIT).collect();
    out.push_str("...");
    out
}

/// Errors raised while assembling the runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),

    #[error("no provider credential found; set one of DEEPSEEK_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY or GEMINI_API_KEY")]
    NoProviders,

    #[error("default provider {0} has no credential")]
    DefaultNotConfigured(ProviderKind),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
