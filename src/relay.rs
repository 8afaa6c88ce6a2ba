//! The relay: configured providers plus the rules for picking one.
//!
//! A [`Relay`] is built once at startup and is read-only afterwards. Each call
//! goes to exactly one provider; a failed call is reported, never retried
//! elsewhere.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ConfigError, RelayError};
use crate::metrics::Metrics;
use crate::provider::{build_provider, ChatProvider, ProviderKind};

/// Prompts shorter than this (in characters) auto-route to Gemini.
const SHORT_PROMPT_CHARS: usize = 100;

const PROGRAMMING_KEYWORDS: &[&str] = &[
    "code", "program", "function", "compile", "debug", "كود", "برمجة", "برمج",
];

const CREATIVE_KEYWORDS: &[&str] = &["story", "poem", "creative", "إبداع", "قصه", "قصة"];

/// A reply together with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub reply: String,
    pub provider: ProviderKind,
}

pub struct Relay {
    default: ProviderKind,
    providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
    metrics: Arc<Metrics>,
}

impl Relay {
    /// Create a relay over `providers`. The default must be among them.
    pub fn new(
        default: ProviderKind,
        providers: Vec<Arc<dyn ChatProvider>>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ConfigError> {
        let providers: HashMap<_, _> = providers.into_iter().map(|p| (p.kind(), p)).collect();
        if !providers.contains_key(&default) {
            return Err(ConfigError::DefaultNotConfigured(default));
        }
        Ok(Self {
            default,
            providers,
            metrics,
        })
    }

    /// Build every provider that has a credential in `config`.
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Result<Self, ConfigError> {
        let default = config
            .resolve_default_provider()
            .ok_or(ConfigError::NoProviders)?;

        let mut providers = Vec::new();
        for kind in ProviderKind::ALL {
            if let Some(settings) = config.provider_settings(kind) {
                info!(
                    provider = %kind,
                    model = %settings.model,
                    endpoint = %settings.endpoint,
                    timeout_secs = settings.timeout.as_secs(),
                    "Provider configured"
                );
                providers.push(build_provider(settings)?);
            }
        }

        Self::new(default, providers, metrics)
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default
    }

    /// Configured providers, in [`ProviderKind::ALL`] order.
    pub fn configured(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.providers.contains_key(kind))
            .collect()
    }

    /// Send `message` to the default provider.
    pub async fn chat(&self, message: &str) -> Result<String, RelayError> {
        self.dispatch(self.default, message).await
    }

    /// Send `prompt` to the provider named `name`.
    pub async fn query(&self, name: &str, prompt: &str) -> Result<String, RelayError> {
        let kind: ProviderKind = name.parse()?;
        if !self.providers.contains_key(&kind) {
            return Err(RelayError::ProviderNotConfigured(kind));
        }
        self.dispatch(kind, prompt).await
    }

    /// Pick a provider from the prompt's content and send it there.
    pub async fn auto_route(&self, prompt: &str) -> Result<Routed, RelayError> {
        let preferred = route_for_prompt(prompt);
        let provider = if self.providers.contains_key(&preferred) {
            preferred
        } else {
            debug!(
                preferred = %preferred,
                fallback = %self.default,
                "Preferred provider not configured, using default"
            );
            self.default
        };

        let reply = self.dispatch(provider, prompt).await?;
        Ok(Routed { reply, provider })
    }

    async fn dispatch(&self, kind: ProviderKind, prompt: &str) -> Result<String, RelayError> {
        let provider = self
            .providers
            .get(&kind)
            .ok_or(RelayError::ProviderNotConfigured(kind))?;

        let start = Instant::now();
        let result = provider.complete(prompt).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(reply) => {
                self.metrics.observe(kind, "ok", elapsed);
                info!(
                    provider = %kind,
                    model = provider.model(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    reply_chars = reply.chars().count(),
                    "Upstream call succeeded"
                );
            }
            Err(e) => {
                self.metrics.observe(kind, e.kind(), elapsed);
                warn!(
                    provider = %kind,
                    model = provider.model(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Upstream call failed"
                );
            }
        }

        result
    }
}

/// Latin keywords must start a word: "codes" matches "code", "decode" does not.
/// Arabic keywords match anywhere, as they are often written with attached
/// prefixes such as the article.
fn has_keyword(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| {
        if k.is_ascii() {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word.starts_with(k))
        } else {
            lower.contains(k)
        }
    })
}

/// Keyword heuristic choosing a vendor for a prompt.
///
/// Programming questions go to DeepSeek, creative writing to Anthropic, short
/// prompts to Gemini and everything else to OpenAI.
pub fn route_for_prompt(prompt: &str) -> ProviderKind {
    let lower = prompt.to_lowercase();
    if has_keyword(&lower, PROGRAMMING_KEYWORDS) {
        ProviderKind::DeepSeek
    } else if has_keyword(&lower, CREATIVE_KEYWORDS) {
        ProviderKind::Anthropic
    } else if prompt.chars().count() < SHORT_PROMPT_CHARS {
        ProviderKind::Gemini
    } else {
        ProviderKind::OpenAi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo(ProviderKind);

    #[async_trait]
    impl ChatProvider for Echo {
        fn kind(&self) -> ProviderKind {
            self.0
        }

        fn model(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String, RelayError> {
            Ok(format!("{}:{prompt}", self.0))
        }
    }

    fn relay(default: ProviderKind, kinds: &[ProviderKind]) -> Relay {
        let providers = kinds
            .iter()
            .map(|k| Arc::new(Echo(*k)) as Arc<dyn ChatProvider>)
            .collect();
        Relay::new(default, providers, Arc::new(Metrics::new().unwrap())).unwrap()
    }

    #[test]
    fn test_route_for_prompt() {
        assert_eq!(route_for_prompt("Fix this Rust code please"), ProviderKind::DeepSeek);
        assert_eq!(route_for_prompt("اكتب لي كود بايثون"), ProviderKind::DeepSeek);
        assert_eq!(route_for_prompt("Tell me a story"), ProviderKind::Anthropic);
        assert_eq!(route_for_prompt("What is the capital of France?"), ProviderKind::Gemini);
        assert_eq!(route_for_prompt(&"why ".repeat(30)), ProviderKind::OpenAi);
    }

    #[test]
    fn test_keywords_match_word_starts_only() {
        assert_eq!(route_for_prompt("Programming help"), ProviderKind::DeepSeek);
        assert_eq!(route_for_prompt("(debugging) my app"), ProviderKind::DeepSeek);
        assert_eq!(route_for_prompt("storytelling tips"), ProviderKind::Anthropic);
        assert_eq!(route_for_prompt("decode this base64 string"), ProviderKind::Gemini);
        assert_eq!(route_for_prompt("barcode scanner"), ProviderKind::Gemini);
        assert_eq!(route_for_prompt("a history of Rome"), ProviderKind::Gemini);
        assert_eq!(route_for_prompt("ساعدني في البرمجة"), ProviderKind::DeepSeek);
    }

    #[test]
    fn test_default_must_be_configured() {
        let result = Relay::new(
            ProviderKind::OpenAi,
            vec![Arc::new(Echo(ProviderKind::DeepSeek)) as Arc<dyn ChatProvider>],
            Arc::new(Metrics::new().unwrap()),
        );
        assert!(matches!(result, Err(ConfigError::DefaultNotConfigured(ProviderKind::OpenAi))));
    }

    #[tokio::test]
    async fn test_chat_uses_default() {
        let relay = relay(ProviderKind::DeepSeek, &[ProviderKind::DeepSeek, ProviderKind::OpenAi]);
        assert_eq!(relay.chat("hi").await.unwrap(), "deepseek:hi");
        assert_eq!(relay.metrics.request_count(ProviderKind::DeepSeek, "ok"), 1);
    }

    #[tokio::test]
    async fn test_query_errors() {
        let relay = relay(ProviderKind::DeepSeek, &[ProviderKind::DeepSeek]);
        assert!(matches!(
            relay.query("mistral", "hi").await,
            Err(RelayError::UnknownProvider(_))
        ));
        assert!(matches!(
            relay.query("claude", "hi").await,
            Err(RelayError::ProviderNotConfigured(ProviderKind::Anthropic))
        ));
        assert_eq!(relay.query("DeepSeek", "hi").await.unwrap(), "deepseek:hi");
    }

    #[tokio::test]
    async fn test_auto_route_falls_back_to_default() {
        let relay = relay(ProviderKind::OpenAi, &[ProviderKind::OpenAi, ProviderKind::DeepSeek]);

        let routed = relay.auto_route("debug my code").await.unwrap();
        assert_eq!(routed.provider, ProviderKind::DeepSeek);

        // Gemini is preferred for short prompts but not configured here.
        let routed = relay.auto_route("hello").await.unwrap();
        assert_eq!(routed.provider, ProviderKind::OpenAi);
        assert_eq!(routed.reply, "openai:hello");
    }
}
