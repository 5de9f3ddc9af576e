//! Readiness checking, with and without the ability to launch the service.

use async_trait::async_trait;
use tracing::debug;

use crate::client::ServiceClient;
use crate::error::SupervisorError;
use crate::paths::install_instructions;
use crate::DEFAULT_PORT;

/// Something that can tell whether the Ollama service is ready.
#[async_trait]
pub trait ReadinessChecker: Send + Sync {
    /// Whether the service answers its health endpoint right now.
    async fn is_ready(&self) -> bool;

    /// Bring the service up, or explain why that is not possible.
    async fn ensure_ready(&self) -> Result<(), SupervisorError>;

    /// Whether this checker can start the service itself.
    fn can_launch(&self) -> bool;

    /// Instructions to show a user when the service is not ready.
    fn instructions(&self) -> &str {
        install_instructions()
    }

    /// Make sure the service has a model to answer with.
    ///
    /// Returns true when at least one model is installed, whichever it is.
    /// When none is, a launching checker pulls `model` first; a read-only
    /// checker cannot pull and reports false.
    async fn ensure_model(&self, model: &str) -> bool;
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait]
impl ReadinessChecker for crate::Supervisor {
    async fn is_ready(&self) -> bool {
        self.is_reachable().await
    }

    async fn ensure_ready(&self) -> Result<(), SupervisorError> {
        self.ensure_running().await
    }

    fn can_launch(&self) -> bool {
        true
    }

    async fn ensure_model(&self, model: &str) -> bool {
        self.ensure_default_model(model).await
    }
}

/// Checker that can only observe the service and report instructions.
#[derive(Debug, Clone)]
pub struct ReadOnlyChecker {
    client: ServiceClient,
}

impl ReadOnlyChecker {
    pub fn new(port: u16) -> Self {
        Self {
            client: ServiceClient::with_port(port),
        }
    }

    pub fn with_client(client: ServiceClient) -> Self {
        Self { client }
    }
}

impl Default for ReadOnlyChecker {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

#[async_trait]
impl ReadinessChecker for ReadOnlyChecker {
    async fn is_ready(&self) -> bool {
        self.client.is_reachable().await
    }

    async fn ensure_ready(&self) -> Result<(), SupervisorError> {
        if self.client.is_reachable().await {
            return Ok(());
        }
        Err(SupervisorError::NotRunning {
            url: self.client.base_url().to_string(),
            instructions: install_instructions().to_string(),
        })
    }

    fn can_launch(&self) -> bool {
        false
    }

    async fn ensure_model(&self, model: &str) -> bool {
        match self.client.list_models().await {
            Ok(models) if models.is_empty() => {
                debug!("No models installed and '{}' cannot be pulled from here", model);
                false
            }
            Ok(_) => true,
            Err(e) => {
                debug!("Could not list installed models: {}", e);
                false
            }
        }
    }
}

/// The checker native builds use.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformChecker = crate::Supervisor;

/// The checker browser builds use.
#[cfg(target_arch = "wasm32")]
pub type PlatformChecker = ReadOnlyChecker;

/// Create the checker for the current build target.
pub fn platform_checker(port: u16) -> PlatformChecker {
    #[cfg(not(target_arch = "wasm32"))]
    {
        crate::Supervisor::new().with_port(port)
    }
    #[cfg(target_arch = "wasm32")]
    {
        ReadOnlyChecker::new(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn unreachable_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_read_only_reports_instructions() {
        let checker = ReadOnlyChecker::new(unreachable_port());
        assert!(!checker.can_launch());
        assert!(!checker.is_ready().await);

        let err = checker.ensure_ready().await.unwrap_err();
        match err {
            SupervisorError::NotRunning { instructions, .. } => {
                assert!(instructions.contains("ollama serve"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_read_only_accepts_any_installed_model() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200)
                    .json_body(json!({ "models": [{ "name": "llama2:latest" }] }));
            })
            .await;

        let checker = ReadOnlyChecker::with_client(ServiceClient::with_url(server.base_url()));
        assert!(checker.ensure_ready().await.is_ok());
        assert!(checker.ensure_model("llama2").await);
        // Any installed model will do, as with the launching checker.
        assert!(checker.ensure_model("mistral").await);
    }

    #[tokio::test]
    async fn test_read_only_without_models() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200).json_body(json!({ "models": [] }));
            })
            .await;

        let checker = ReadOnlyChecker::with_client(ServiceClient::with_url(server.base_url()));
        assert!(!checker.ensure_model("llama2").await);
    }

    #[test]
    fn test_platform_checker_can_launch() {
        let checker = platform_checker(11434);
        assert!(checker.can_launch());
    }

    #[test]
    fn test_trait_objects() {
        let checkers: Vec<Box<dyn ReadinessChecker>> = vec![
            Box::new(platform_checker(11434)),
            Box::new(ReadOnlyChecker::default()),
        ];
        let launchers = checkers.iter().filter(|c| c.can_launch()).count();
        assert_eq!(launchers, 1);
    }
}
