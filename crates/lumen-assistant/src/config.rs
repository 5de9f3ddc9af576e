//! Assistant configuration.

use std::path::Path;

use lumen_supervisor::{DEFAULT_MODEL, DEFAULT_PORT};
use serde::Deserialize;
use thiserror::Error;

use crate::ollama::DEFAULT_OLLAMA_URL;

/// Default OpenAI-compatible endpoint for the remote path.
pub const DEFAULT_REMOTE_URL: &str = "https://api.openai.com/v1";

/// Default model on the remote path.
pub const DEFAULT_REMOTE_MODEL: &str = "gpt-3.5-turbo";

/// Configuration for the assistant.
///
/// Field names in settings files follow the editor extension's settings:
/// `useOllama`, `ollamaModel`, `apiKey`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Use the local Ollama service instead of the remote API
    pub use_ollama: bool,
    /// Model to ensure and use on the Ollama path
    pub ollama_model: String,
    /// Bearer credential for the remote API
    pub api_key: String,
    /// Base URL of the Ollama service
    pub ollama_url: String,
    /// Base URL of the OpenAI-compatible remote API
    pub remote_url: String,
    /// Model to request on the remote path
    pub remote_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling cutoff
    pub top_p: f32,
    /// Maximum tokens to generate
    pub num_predict: i32,
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            use_ollama: true,
            ollama_model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            remote_model: DEFAULT_REMOTE_MODEL.to_string(),
            temperature: 0.7,
            top_p: 0.9,
            num_predict: 1000,
        }
    }
}

impl AssistantConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Load config from a JSON settings file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse config from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Override fields with any `LUMEN_*` environment variables that are set.
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("LUMEN_USE_OLLAMA") {
            self.use_ollama = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = var("LUMEN_OLLAMA_MODEL") {
            self.ollama_model = v;
        }
        if let Some(v) = var("LUMEN_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.api_key = v;
        }
        if let Some(v) = var("LUMEN_OLLAMA_URL") {
            self.ollama_url = v;
        }
        if let Some(v) = var("LUMEN_REMOTE_URL") {
            self.remote_url = v;
        }
        if let Some(v) = var("LUMEN_REMOTE_MODEL") {
            self.remote_model = v;
        }
        self
    }

    /// Port of the Ollama service named by `ollama_url`.
    pub fn ollama_port(&self) -> u16 {
        reqwest::Url::parse(&self.ollama_url)
            .ok()
            .and_then(|url| url.port_or_known_default())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Check if the config can reach some backend.
    pub fn is_valid(&self) -> bool {
        self.use_ollama || !self.api_key.is_empty()
    }

    /// Create a builder for configuration.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder::default()
    }
}

/// Builder for assistant configuration.
#[derive(Debug, Default)]
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl AssistantConfigBuilder {
    pub fn use_ollama(mut self, use_ollama: bool) -> Self {
        self.config.use_ollama = use_ollama;
        self
    }

    pub fn ollama_model(mut self, model: impl Into<String>) -> Self {
        self.config.ollama_model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn ollama_url(mut self, url: impl Into<String>) -> Self {
        self.config.ollama_url = url.into();
        self
    }

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote_url = url.into();
        self
    }

    pub fn remote_model(mut self, model: impl Into<String>) -> Self {
        self.config.remote_model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = top_p;
        self
    }

    pub fn num_predict(mut self, tokens: i32) -> Self {
        self.config.num_predict = tokens;
        self
    }

    pub fn build(self) -> AssistantConfig {
        self.config
    }
}
