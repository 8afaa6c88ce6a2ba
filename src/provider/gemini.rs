//! Google Gemini `generateContent`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::RelayError;
use crate::provider::{decode_reply, read_vendor_json, ChatProvider, ProviderKind, ProviderSettings};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
pub struct Content<'a> {
    pub parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct Part<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: CandidateContent,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

pub struct GeminiProvider {
    client: Client,
    settings: ProviderSettings,
}

impl GeminiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: settings.http_client()?,
            settings,
        })
    }

    pub fn build_request<'a>(&'a self, prompt: &'a str) -> GenerateContentRequest<'a> {
        let generation_config = (self.settings.temperature.is_some()
            || self.settings.max_tokens.is_some())
        .then(|| GenerationConfig {
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_tokens,
        });

        GenerateContentRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            system_instruction: self.settings.system_prompt.as_deref().map(|text| Content {
                parts: [Part { text }],
            }),
            generation_config,
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.settings.model))]
    async fn complete(&self, prompt: &str) -> Result<String, RelayError> {
        // Gemini authenticates with a query parameter rather than a header.
        let response = self
            .client
            .post(&self.settings.endpoint)
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let value = read_vendor_json(ProviderKind::Gemini, response).await?;
        let reply: GenerateContentResponse = decode_reply(ProviderKind::Gemini, value)?;

        reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| {
                RelayError::MalformedResponse("gemini returned no candidate text".to_string())
            })
    }
}
