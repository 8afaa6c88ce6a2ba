//! Vendor completion APIs behind a single trait.
//!
//! - [`openai_compat`]: OpenAI chat-completions wire format (OpenAI, DeepSeek)
//! - [`anthropic`]: Anthropic Messages API
//! - [`gemini`]: Google Gemini `generateContent`
//!
//! Every implementation issues exactly one HTTP request per
//! [`ChatProvider::complete`] call and never retries.

pub mod anthropic;
pub mod gemini;
pub mod openai_compat;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{excerpt, RelayError, UnknownProvider};

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatibleProvider;

/// Supported upstream vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    DeepSeek,
    #[serde(alias = "chatgpt")]
    OpenAi,
    #[serde(alias = "claude")]
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// All vendors, in default-selection order.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::DeepSeek,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
    ];

    /// Lowercase name used in URLs, logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Environment variables holding the vendor credential, in lookup order.
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::DeepSeek => &["DEEPSEEK_API_KEY"],
            ProviderKind::OpenAi => &["OPENAI_API_KEY", "CHATGPT_API_KEY"],
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
            ProviderKind::Gemini => &["GEMINI_API_KEY"],
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
            ProviderKind::Gemini => "gemini-pro",
        }
    }

    /// Vendor endpoint for a given model.
    pub fn default_endpoint(&self, model: &str) -> String {
        match self {
            ProviderKind::DeepSeek => "https://api.deepseek.com/chat/completions".to_string(),
            ProviderKind::OpenAi => "https://api.openai.com/v1/chat/completions".to_string(),
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/messages".to_string(),
            ProviderKind::Gemini => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
            ),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "openai" | "chatgpt" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// Fully resolved settings for one vendor.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: String,
    pub endpoint: String,
    pub model: String,

    /// Optional system turn sent ahead of the user message.
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,

    /// Deadline for the whole upstream round trip.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl ProviderSettings {
    /// Settings with the vendor's default endpoint and model.
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        let model = kind.default_model().to_string();
        Self {
            kind,
            api_key: api_key.into(),
            endpoint: kind.default_endpoint(&model),
            model,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Build the HTTP client used for this vendor. Both deadlines are always set.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
    }
}

/// A vendor completion API that turns one user prompt into one reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    /// Send `prompt` as the sole user turn and return the reply text.
    async fn complete(&self, prompt: &str) -> Result<String, RelayError>;
}

/// Build the provider implementation matching `settings.kind`.
pub fn build_provider(settings: ProviderSettings) -> Result<Arc<dyn ChatProvider>, reqwest::Error> {
    let provider: Arc<dyn ChatProvider> = match settings.kind {
        ProviderKind::DeepSeek | ProviderKind::OpenAi => {
            Arc::new(OpenAiCompatibleProvider::new(settings)?)
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(settings)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(settings)?),
    };
    Ok(provider)
}

/// Read an upstream response as JSON, turning error payloads and non-success
/// statuses into [`RelayError::Vendor`].
pub(crate) async fn read_vendor_json(
    kind: ProviderKind,
    response: reqwest::Response,
) -> Result<Value, RelayError> {
    let status = response.status();
    let body = response.text().await?;

    debug!(provider = %kind, status = %status, bytes = body.len(), "Upstream response");

    let value: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) if status.is_success() => {
            warn!(provider = %kind, error = %e, "Upstream body is not JSON");
            return Err(RelayError::MalformedResponse(format!(
                "{kind} returned a non-JSON body: {}",
                excerpt(&body)
            )));
        }
        Err(_) => {
            return Err(RelayError::Vendor {
                status: status.as_u16(),
                message: excerpt(&body),
            });
        }
    };

    if let Some(message) = vendor_error_message(&value) {
        warn!(provider = %kind, status = %status, error = %message, "Vendor reported an error");
        return Err(RelayError::Vendor {
            status: status.as_u16(),
            message,
        });
    }

    if !status.is_success() {
        return Err(RelayError::Vendor {
            status: status.as_u16(),
            message: excerpt(&body),
        });
    }

    Ok(value)
}

/// Extract the message of an `error` member, in any of the shapes vendors use.
fn vendor_error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| excerpt(&Value::Object(obj.clone()).to_string())),
        ),
        other => Some(excerpt(&other.to_string())),
    }
}

/// Deserialize the expected success shape, reporting what was missing.
pub(crate) fn decode_reply<T: serde::de::DeserializeOwned>(
    kind: ProviderKind,
    value: Value,
) -> Result<T, RelayError> {
    let raw = value.to_string();
    serde_json::from_value(value).map_err(|e| {
        RelayError::MalformedResponse(format!(
            "unexpected {kind} response ({e}): {}",
            excerpt(&raw)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("chatgpt".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!(" Claude ".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert_eq!("DeepSeek".parse::<ProviderKind>(), Ok(ProviderKind::DeepSeek));
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_gemini_endpoint_embeds_model() {
        let settings = ProviderSettings::new(ProviderKind::Gemini, "k");
        assert!(settings.endpoint.ends_with("/models/gemini-pro:generateContent"));
    }

    #[test]
    fn test_vendor_error_shapes() {
        assert_eq!(
            vendor_error_message(&json!({"error": {"message": "Invalid key", "type": "auth"}})),
            Some("Invalid key".to_string())
        );
        assert_eq!(
            vendor_error_message(&json!({"error": "quota exceeded"})),
            Some("quota exceeded".to_string())
        );
        assert_eq!(vendor_error_message(&json!({"error": null, "choices": []})), None);
        assert_eq!(vendor_error_message(&json!({"choices": []})), None);
    }
}
