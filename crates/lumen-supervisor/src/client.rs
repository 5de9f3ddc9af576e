//! HTTP client for the Ollama health and model-listing endpoint.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::SupervisorError;
use crate::{DEFAULT_PORT, HEALTH_PATH};

/// Timeout for health checks and model listing.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);

/// Client for the parts of the Ollama API the supervisor needs.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

/// A model reported by `/api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Response from `/api/tags`.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelSummary>,
}

impl ServiceClient {
    /// Create a new client for the default port.
    pub fn new() -> Self {
        Self::with_port(DEFAULT_PORT)
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a new client with a custom port on localhost.
    pub fn with_port(port: u16) -> Self {
        Self::with_url(format!("http://localhost:{}", port))
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the service answers its health endpoint with HTTP 200.
    ///
    /// Never fails: connection errors, timeouts and any other status all
    /// read as "not reachable".
    pub async fn is_reachable(&self) -> bool {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);

        match self.client.get(&url).timeout(REQUEST_TIMEOUT).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!("Health check against {} failed: {}", url, e);
                false
            }
        }
    }

    /// List the models installed in the service.
    pub async fn list_models(&self) -> Result<Vec<ModelSummary>, SupervisorError> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);

        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SupervisorError::Api(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let body = response.text().await?;
        let tags: TagsResponse = serde_json::from_str(&body)?;
        Ok(tags.models)
    }
}

impl Default for ServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Check whether an Ollama service answers on `localhost:<port>`.
pub async fn check_reachable(port: u16) -> bool {
    ServiceClient::with_port(port).is_reachable().await
}
