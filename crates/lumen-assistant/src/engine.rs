//! Assistant - the entry point for questions and explanations.

use lumen_supervisor::{ReadinessChecker, SupervisorError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{RemoteClient, RemoteError};
use crate::config::AssistantConfig;
use crate::ollama::{GenerateOptions, OllamaClient, OllamaError};
use crate::prompt::{self, SYSTEM_PROMPT};

/// Which backend answers requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantBackend {
    /// Local Ollama service
    Ollama,
    /// OpenAI-compatible remote API
    Remote,
}

#[derive(Debug)]
enum Backend {
    Ollama(OllamaClient),
    Remote(RemoteClient),
}

/// Answers questions and explains code using the configured backend.
#[derive(Debug)]
pub struct Assistant {
    config: AssistantConfig,
    backend: Backend,
}

/// Errors from the assistant.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("{0}")]
    Ollama(#[from] OllamaError),
    #[error("{0}")]
    Remote(#[from] RemoteError),
    #[error("{0}")]
    Supervisor(#[from] SupervisorError),
    #[error("nothing to {0}: input is empty")]
    EmptyInput(&'static str),
    #[error("model '{0}' is not available and could not be pulled")]
    ModelUnavailable(String),
}

impl Assistant {
    /// Create an assistant for the backend `config` selects.
    pub fn new(config: AssistantConfig) -> Result<Self, AssistantError> {
        let backend = if config.use_ollama {
            Backend::Ollama(OllamaClient::with_config(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            ))
        } else {
            Backend::Remote(RemoteClient::new(&config)?)
        };

        Ok(Self { config, backend })
    }

    pub fn backend(&self) -> AssistantBackend {
        match self.backend {
            Backend::Ollama(_) => AssistantBackend::Ollama,
            Backend::Remote(_) => AssistantBackend::Remote,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Name of the model requests go to.
    pub fn model(&self) -> &str {
        match &self.backend {
            Backend::Ollama(client) => client.model(),
            Backend::Remote(client) => client.model(),
        }
    }

    /// Make sure the backend can serve requests.
    ///
    /// On the Ollama path this brings the service up through `checker` and
    /// makes sure some model is installed, pulling the configured one into an
    /// empty service when `checker` can. The remote path needs nothing.
    pub async fn prepare(&self, checker: &dyn ReadinessChecker) -> Result<(), AssistantError> {
        if self.backend() == AssistantBackend::Remote {
            debug!("Remote backend selected, nothing to prepare");
            return Ok(());
        }

        checker.ensure_ready().await?;

        if !checker.ensure_model(&self.config.ollama_model).await {
            warn!("Model '{}' could not be ensured", self.config.ollama_model);
            return Err(AssistantError::ModelUnavailable(
                self.config.ollama_model.clone(),
            ));
        }

        info!("Ollama is ready; requests use model '{}'", self.config.ollama_model);
        Ok(())
    }

    /// Answer a free-form question, optionally about some context.
    pub async fn ask(&self, question: &str, context: Option<&str>) -> Result<String, AssistantError> {
        if question.trim().is_empty() {
            return Err(AssistantError::EmptyInput("ask"));
        }
        let user_prompt = prompt::question_prompt(question, context);
        self.complete(&user_prompt).await
    }

    /// Explain a piece of code.
    pub async fn explain(&self, code: &str, language: Option<&str>) -> Result<String, AssistantError> {
        if code.trim().is_empty() {
            return Err(AssistantError::EmptyInput("explain"));
        }
        let user_prompt = prompt::explain_prompt(code, language);
        self.complete(&user_prompt).await
    }

    async fn complete(&self, user_prompt: &str) -> Result<String, AssistantError> {
        match &self.backend {
            Backend::Ollama(client) => {
                debug!("Calling Ollama model {}...", client.model());
                let options = GenerateOptions {
                    temperature: self.config.temperature,
                    top_p: self.config.top_p,
                    num_predict: self.config.num_predict,
                };
                Ok(client.generate(&prompt::with_system(user_prompt), options).await?)
            }
            Backend::Remote(client) => {
                debug!("Calling remote model {}...", client.model());
                Ok(client.complete(SYSTEM_PROMPT, user_prompt).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use lumen_supervisor::{ReadOnlyChecker, ServiceClient};
    use serde_json::json;

    fn ollama_config(url: String) -> AssistantConfig {
        AssistantConfig::builder().ollama_url(url).build()
    }

    #[test]
    fn test_backend_selection() {
        let local = Assistant::new(AssistantConfig::default()).unwrap();
        assert_eq!(local.backend(), AssistantBackend::Ollama);
        assert_eq!(local.model(), "llama2");

        let remote = Assistant::new(
            AssistantConfig::builder()
                .use_ollama(false)
                .api_key("sk-test")
                .build(),
        )
        .unwrap();
        assert_eq!(remote.backend(), AssistantBackend::Remote);
        assert_eq!(remote.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn test_remote_requires_key() {
        let result = Assistant::new(AssistantConfig::builder().use_ollama(false).build());
        assert!(matches!(
            result,
            Err(AssistantError::Remote(RemoteError::MissingApiKey))
        ));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let assistant = Assistant::new(AssistantConfig::default()).unwrap();
        assert!(matches!(
            assistant.ask("   ", None).await,
            Err(AssistantError::EmptyInput("ask"))
        ));
        assert!(matches!(
            assistant.explain("", Some("rust")).await,
            Err(AssistantError::EmptyInput("explain"))
        ));
    }

    #[tokio::test]
    async fn test_ask_through_ollama() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("Question: What is Rust?")
                    .body_contains("\"stream\":false");
                then.status(200)
                    .json_body(json!({ "response": "A systems language.", "done": true }));
            })
            .await;

        let assistant = Assistant::new(ollama_config(server.base_url())).unwrap();
        let answer = assistant.ask("What is Rust?", None).await.unwrap();

        assert_eq!(answer, "A systems language.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_explain_through_remote() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("following python code");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": "It prints 1." } }]
                }));
            })
            .await;

        let config = AssistantConfig::builder()
            .use_ollama(false)
            .api_key("sk-test")
            .remote_url(server.base_url())
            .build();
        let assistant = Assistant::new(config).unwrap();
        let answer = assistant.explain("print(1)", Some("python")).await.unwrap();

        assert_eq!(answer, "It prints 1.");
    }

    #[tokio::test]
    async fn test_prepare_with_read_only_checker() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200)
                    .json_body(json!({ "models": [{ "name": "llama2:latest" }] }));
            })
            .await;

        let checker = ReadOnlyChecker::with_client(ServiceClient::with_url(server.base_url()));
        let assistant = Assistant::new(ollama_config(server.base_url())).unwrap();
        assistant.prepare(&checker).await.unwrap();
    }

    #[tokio::test]
    async fn test_prepare_fails_on_empty_service() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200).json_body(json!({ "models": [] }));
            })
            .await;

        let checker = ReadOnlyChecker::with_client(ServiceClient::with_url(server.base_url()));
        let assistant = Assistant::new(
            AssistantConfig::builder()
                .ollama_url(server.base_url())
                .ollama_model("mistral")
                .build(),
        )
        .unwrap();
        assert!(matches!(
            assistant.prepare(&checker).await,
            Err(AssistantError::ModelUnavailable(model)) if model == "mistral"
        ));
    }

    #[tokio::test]
    async fn test_prepare_remote_is_noop() {
        let config = AssistantConfig::builder()
            .use_ollama(false)
            .api_key("sk-test")
            .build();
        let assistant = Assistant::new(config).unwrap();
        // Nothing listens here; the remote path must not look.
        let checker = ReadOnlyChecker::new(1);
        assistant.prepare(&checker).await.unwrap();
    }
}
