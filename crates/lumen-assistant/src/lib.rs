//! # Lumen Assistant
//!
//! Answers questions and explains code for the editor bridge and the web
//! page, using either the local Ollama service or a remote
//! OpenAI-compatible API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  ask / explain  │ --> │    Assistant    │ --> │  Ollama  (local)│
//! │  request        │     │  (prompt build) │     │  Remote  (API)  │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!                               │
//!                       ┌───────┴────────┐
//!                       │ ReadinessChecker│
//!                       └────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use lumen_assistant::{Assistant, AssistantConfig};
//! use lumen_supervisor::Supervisor;
//!
//! let assistant = Assistant::new(AssistantConfig::from_env())?;
//! assistant.prepare(&Supervisor::new()).await?;
//!
//! let answer = assistant.ask("What does `?` do in Rust?", None).await?;
//! ```

mod client;
mod config;
mod engine;
mod ollama;
pub mod prompt;

pub use client::{RemoteClient, RemoteError};
pub use config::{
    AssistantConfig, AssistantConfigBuilder, ConfigError, DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_URL,
};
pub use engine::{Assistant, AssistantBackend, AssistantError};
pub use ollama::{GenerateOptions, OllamaClient, OllamaError, DEFAULT_OLLAMA_URL};
