//! Runtime configuration for chat-relay.
//!
//! Layers, lowest to highest precedence: built-in defaults, an optional JSON
//! file, environment variables, command-line flags. The result is immutable
//! and handed to the relay once at startup.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::provider::{ProviderKind, ProviderSettings};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-relay", about = "Relay chat messages to a hosted LLM completion API")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address. Overrides PORT.
    #[arg(long)]
    pub listen: Option<String>,

    /// Default provider (deepseek, openai, anthropic, gemini). Overrides CHAT_PROVIDER.
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream call limits.
    pub upstream: UpstreamConfig,

    /// Provider answering `/chat`. When unset, the first provider with a
    /// credential wins, in the order of [`ProviderKind::ALL`].
    pub default_provider: Option<ProviderKind>,

    /// Per-vendor settings.
    pub providers: ProvidersConfig,

    /// Environment overrides for whichever provider ends up answering `/chat`.
    #[serde(skip)]
    pub default_overrides: DefaultOverrides,
}

/// `CHAT_MODEL` / `CHAT_API_URL`. Resolved against the final default provider,
/// after every configuration layer has been applied.
#[derive(Debug, Clone, Default)]
pub struct DefaultOverrides {
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Deadlines applied to every outbound vendor call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Whole-request deadline in seconds.
    pub timeout_secs: u64,

    /// TCP/TLS connect deadline in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

/// Settings for every supported vendor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub deepseek: ProviderConfig,
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub gemini: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::DeepSeek => &self.deepseek,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Gemini => &self.gemini,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        match kind {
            ProviderKind::DeepSeek => &mut self.deepseek,
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::Gemini => &mut self.gemini,
        }
    }
}

/// One vendor's settings. Unset fields fall back to the vendor defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Credential. Usually supplied through the environment rather than the file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Endpoint override (e.g. a self-hosted OpenAI-compatible server).
    pub endpoint: Option<String>,

    /// Model override.
    pub model: Option<String>,

    /// System turn sent ahead of every user message.
    pub system_prompt: Option<String>,

    pub temperature: Option<f64>,

    pub max_tokens: Option<u32>,
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary variable lookup. Empty values count as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for kind in ProviderKind::ALL {
            if let Some(key) = kind.api_key_vars().iter().find_map(|name| var(*name)) {
                self.providers.get_mut(kind).api_key = Some(key);
            }
        }

        if let Some(name) = var("CHAT_PROVIDER") {
            self.default_provider = Some(name.parse()?);
        }

        if let Some(port) = var("PORT") {
            let port: u16 = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "PORT",
                value: port.clone(),
            })?;
            self.server.listen = format!("0.0.0.0:{port}");
        }

        if let Some(secs) = var("CHAT_TIMEOUT_SECS") {
            self.upstream.timeout_secs = secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidValue {
                    var: "CHAT_TIMEOUT_SECS",
                    value: secs.clone(),
                })?;
        }

        if let Some(model) = var("CHAT_MODEL") {
            self.default_overrides.model = Some(model);
        }
        if let Some(endpoint) = var("CHAT_API_URL") {
            self.default_overrides.endpoint = Some(endpoint);
        }

        Ok(())
    }

    /// Overlay command-line flags.
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(name) = &cli.provider {
            self.default_provider = Some(name.parse()?);
        }
        Ok(())
    }

    /// The provider answering `/chat`, if any credential is present.
    pub fn resolve_default_provider(&self) -> Option<ProviderKind> {
        self.default_provider.or_else(|| {
            ProviderKind::ALL
                .into_iter()
                .find(|kind| self.providers.get(*kind).api_key.is_some())
        })
    }

    /// Resolved settings for `kind`, or `None` when it has no credential.
    pub fn provider_settings(&self, kind: ProviderKind) -> Option<ProviderSettings> {
        let cfg = self.providers.get(kind);
        let api_key = cfg.api_key.clone()?;

        let (model, endpoint) = if self.resolve_default_provider() == Some(kind) {
            (
                self.default_overrides.model.as_ref().or(cfg.model.as_ref()),
                self.default_overrides.endpoint.as_ref().or(cfg.endpoint.as_ref()),
            )
        } else {
            (cfg.model.as_ref(), cfg.endpoint.as_ref())
        };

        let mut settings = ProviderSettings::new(kind, api_key);
        if let Some(model) = model {
            settings.model = model.clone();
            settings.endpoint = kind.default_endpoint(model);
        }
        if let Some(endpoint) = endpoint {
            settings.endpoint = endpoint.clone();
        }
        settings.system_prompt = cfg.system_prompt.clone();
        settings.temperature = cfg.temperature;
        settings.max_tokens = cfg.max_tokens;
        settings.timeout = Duration::from_secs(self.upstream.timeout_secs);
        settings.connect_timeout = Duration::from_secs(self.upstream.connect_timeout_secs);
        Some(settings)
    }
}
