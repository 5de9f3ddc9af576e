//! Client for an OpenAI-compatible chat completion API.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AssistantConfig;

/// Remote chat completion client, authenticated with a bearer key.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: i32,
}

/// Errors from the remote client.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing API key - set apiKey in settings or LUMEN_API_KEY")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("No completion returned")]
    EmptyCompletion,
}

/// OpenAI-compatible chat completion request.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: i32,
    stream: bool,
}

/// Chat message in OpenAI format.
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI-compatible chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Error envelope returned by the API.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl RemoteClient {
    /// Create a new remote client.
    pub fn new(config: &AssistantConfig) -> Result<Self, RemoteError> {
        if config.api_key.is_empty() {
            return Err(RemoteError::MissingApiKey);
        }

        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| RemoteError::InvalidApiKey)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.remote_url.trim_end_matches('/').to_string(),
            model: config.remote_model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.num_predict,
        })
    }

    /// Send a system and user message and return the reply text.
    pub async fn complete(&self, system: &str, user_message: &str) -> Result<String, RemoteError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(RemoteError::EmptyCompletion)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_missing_api_key() {
        let config = AssistantConfig::default();
        let result = RemoteClient::new(&config);
        assert!(matches!(result, Err(RemoteError::MissingApiKey)));
    }

    #[test]
    fn test_invalid_api_key() {
        let config = AssistantConfig::builder().api_key("sk-\nbad").build();
        let result = RemoteClient::new(&config);
        assert!(matches!(result, Err(RemoteError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_bearer_completion() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .body_contains("\"role\":\"system\"");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "42" } }]
                }));
            })
            .await;

        let config = AssistantConfig::builder()
            .api_key("sk-test")
            .remote_url(server.url("/v1"))
            .build();
        let client = RemoteClient::new(&config).unwrap();
        let text = client.complete("system", "question").await.unwrap();

        assert_eq!(text, "42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401)
                    .json_body(json!({ "error": { "message": "Incorrect API key" } }));
            })
            .await;

        let config = AssistantConfig::builder()
            .api_key("sk-wrong")
            .remote_url(server.base_url())
            .build();
        let client = RemoteClient::new(&config).unwrap();
        let err = client.complete("system", "question").await.unwrap_err();

        match err {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
