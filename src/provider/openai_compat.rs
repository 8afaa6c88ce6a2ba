//! OpenAI chat-completions wire format, shared by OpenAI and DeepSeek.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::RelayError;
use crate::provider::{decode_reply, read_vendor_json, ChatProvider, ProviderKind, ProviderSettings};

/// Outbound request body.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// Expected success body. Only the fields the relay reads.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Client for any endpoint speaking the OpenAI chat-completions format.
pub struct OpenAiCompatibleProvider {
    client: Client,
    settings: ProviderSettings,
}

impl OpenAiCompatibleProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, reqwest::Error> {
        let client = settings.http_client()?;
        debug!(
            provider = %settings.kind,
            model = %settings.model,
            url = %settings.endpoint,
            "Created OpenAI-compatible provider"
        );
        Ok(Self { client, settings })
    }

    /// Build the request body for a single user turn.
    pub fn build_request<'a>(&'a self, prompt: &'a str) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.settings.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn kind(&self) -> ProviderKind {
        self.settings.kind
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    #[instrument(skip(self, prompt), fields(provider = %self.settings.kind, model = %self.settings.model))]
    async fn complete(&self, prompt: &str) -> Result<String, RelayError> {
        let body = self.build_request(prompt);

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let value = read_vendor_json(self.settings.kind, response).await?;
        let reply: ChatCompletionResponse = decode_reply(self.settings.kind, value)?;

        reply
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                RelayError::MalformedResponse(format!("{} returned no choices", self.settings.kind))
            })?
            .message
            .content
            .ok_or_else(|| {
                RelayError::MalformedResponse(format!(
                    "{} returned a choice without message content",
                    self.settings.kind
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let provider =
            OpenAiCompatibleProvider::new(ProviderSettings::new(ProviderKind::DeepSeek, "k")).unwrap();
        let body = serde_json::to_value(provider.build_request("hello")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "deepseek-chat",
                "messages": [{"role": "user", "content": "hello"}]
            })
        );
    }

    #[test]
    fn test_system_prompt_and_sampling() {
        let mut settings = ProviderSettings::new(ProviderKind::OpenAi, "k");
        settings.system_prompt = Some("be brief".to_string());
        settings.temperature = Some(0.3);
        settings.max_tokens = Some(4000);
        let provider = OpenAiCompatibleProvider::new(settings).unwrap();

        let body = serde_json::to_value(provider.build_request("hi")).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["max_tokens"], 4000);
    }
}
