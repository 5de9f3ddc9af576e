//! Ollama API client for local generation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama API client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

/// Errors from the Ollama client.
#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Ollama API error: {0}")]
    Api(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Ollama server not running at {0}. Start it with: ollama serve")]
    ServerNotRunning(String),
    #[error("Model '{0}' not found. Pull it with: ollama pull {0}")]
    ModelNotFound(String),
}

/// Sampling options sent with each request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: i32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            num_predict: 1000,
        }
    }
}

/// Request to Ollama generate API.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// Response from Ollama generate API.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

/// Response from Ollama tags API (list models).
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client for `model` on the default URL.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_config(DEFAULT_OLLAMA_URL, model)
    }

    /// Create a new Ollama client with custom URL and model.
    pub fn with_config(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Check if Ollama server is running and model is available.
    pub async fn check_availability(&self) -> Result<(), OllamaError> {
        let tags_url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&tags_url)
            .send()
            .await
            .map_err(|_| OllamaError::ServerNotRunning(self.base_url.clone()))?;

        if !response.status().is_success() {
            return Err(OllamaError::ServerNotRunning(self.base_url.clone()));
        }

        let tags: TagsResponse = serde_json::from_str(&response.text().await?)?;
        let model_base = self.model.split(':').next().unwrap_or(&self.model);

        let model_found = tags
            .models
            .iter()
            .any(|m| m.name == self.model || m.name.starts_with(&format!("{}:", model_base)));

        if !model_found {
            return Err(OllamaError::ModelNotFound(self.model.clone()));
        }

        Ok(())
    }

    /// Generate a completion for `prompt`.
    pub async fn generate(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<String, OllamaError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options,
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    OllamaError::ServerNotRunning(self.base_url.clone())
                } else {
                    OllamaError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OllamaError::Api(format!("{}: {}", status, text)));
        }

        let response: GenerateResponse = serde_json::from_str(&response.text().await?)?;

        if let Some(error) = response.error {
            return Err(OllamaError::Api(error));
        }

        Ok(response.response)
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_default_client() {
        let client = OllamaClient::new("llama2");
        assert_eq!(client.base_url(), DEFAULT_OLLAMA_URL);
        assert_eq!(client.model(), "llama2");
    }

    #[test]
    fn test_builder_pattern() {
        let client = OllamaClient::with_config("http://myserver:11434/", "llama2")
            .with_model("codellama:7b");
        assert_eq!(client.base_url(), "http://myserver:11434");
        assert_eq!(client.model(), "codellama:7b");
    }

    #[tokio::test]
    async fn test_generate_request_shape() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate").json_body(json!({
                    "model": "llama2",
                    "prompt": "hello",
                    "stream": false,
                    "options": { "temperature": 0.5, "top_p": 0.25, "num_predict": 64 }
                }));
                then.status(200)
                    .json_body(json!({ "response": "hi there", "done": true }));
            })
            .await;

        let client = OllamaClient::with_config(server.base_url(), "llama2");
        let options = GenerateOptions {
            temperature: 0.5,
            top_p: 0.25,
            num_predict: 64,
        };
        let text = client.generate("hello", options).await.unwrap();

        assert_eq!(text, "hi there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_error_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .json_body(json!({ "error": "model 'llama2' not found" }));
            })
            .await;

        let client = OllamaClient::with_config(server.base_url(), "llama2");
        let err = client
            .generate("hello", GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OllamaError::Api(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_generate_http_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let client = OllamaClient::with_config(server.base_url(), "llama2");
        let err = client
            .generate("hello", GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OllamaError::Api(msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn test_availability_matches_tags() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200)
                    .json_body(json!({ "models": [{ "name": "llama2:latest" }] }));
            })
            .await;

        let client = OllamaClient::with_config(server.base_url(), "llama2");
        assert!(client.check_availability().await.is_ok());

        let missing = client.clone().with_model("mistral");
        assert!(matches!(
            missing.check_availability().await,
            Err(OllamaError::ModelNotFound(_))
        ));
    }
}
