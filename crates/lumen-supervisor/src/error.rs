//! Error types for supervisor operations.

use thiserror::Error;

/// Errors that can occur while supervising the Ollama service.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// None of the candidate paths answered the version probe, or none of the
    /// spawned candidates became reachable.
    #[error("Ollama executable not found (tried {tried} candidate paths)")]
    ExecutableNotFound { tried: usize },

    /// Every attempt of `ensure_running` failed.
    #[error("Ollama failed to start after {attempts} attempts")]
    StartupFailure { attempts: u32 },

    /// HTTP request to the service failed.
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// Service answered with an unexpected status.
    #[error("Ollama API error: {0}")]
    Api(String),

    /// `ollama pull` exited with a non-zero code.
    #[error("Failed to pull model '{name}' (exit code {code:?})")]
    ResourceFetch { name: String, code: Option<i32> },

    /// `ollama create` exited with a non-zero code.
    #[error("Failed to create model '{name}' (exit code {code:?})")]
    CreateFailed { name: String, code: Option<i32> },

    /// The service is not running and this checker cannot start it.
    #[error("Ollama is not running at {url}. {instructions}")]
    NotRunning { url: String, instructions: String },

    /// No candidate path is configured at all.
    #[error("No Ollama executable configured")]
    NoExecutable,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SupervisorError {
    /// Whether this error means the service could not be brought up at all,
    /// as opposed to a failure talking to a running instance.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            SupervisorError::ExecutableNotFound { .. }
                | SupervisorError::StartupFailure { .. }
                | SupervisorError::NotRunning { .. }
                | SupervisorError::NoExecutable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_error_message() {
        let err = SupervisorError::ExecutableNotFound { tried: 4 };
        assert!(err.to_string().contains("executable not found"));
        assert!(err.is_launch_failure());
    }

    #[test]
    fn test_startup_failure_names_attempts() {
        let err = SupervisorError::StartupFailure { attempts: 3 };
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_fetch_failure_is_not_launch_failure() {
        let err = SupervisorError::ResourceFetch {
            name: "llama2".to_string(),
            code: Some(1),
        };
        assert!(!err.is_launch_failure());
        assert!(err.to_string().contains("llama2"));
    }
}
