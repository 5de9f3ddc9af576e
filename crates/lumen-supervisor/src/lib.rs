//! Supervision of a locally installed Ollama server.
//!
//! Lumen does not run models itself. This crate finds the `ollama`
//! executable, starts `ollama serve` when nothing answers on the service
//! port, waits for it to become ready, and pulls or creates models through
//! the executable's subcommands.

mod client;
mod error;
#[cfg(not(target_arch = "wasm32"))]
mod model;
pub mod paths;
mod readiness;
#[cfg(not(target_arch = "wasm32"))]
mod supervisor;

pub use client::{check_reachable, ModelSummary, ServiceClient, REQUEST_TIMEOUT};
pub use error::SupervisorError;
#[cfg(not(target_arch = "wasm32"))]
pub use model::{ModelTool, Modelfile, CODING_ASSISTANT_SYSTEM};
pub use readiness::{platform_checker, PlatformChecker, ReadOnlyChecker, ReadinessChecker};
#[cfg(not(target_arch = "wasm32"))]
pub use supervisor::{Supervisor, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, SETTLE_INTERVAL};

/// Default port of the Ollama service.
pub const DEFAULT_PORT: u16 = 11434;

/// Health and model-listing endpoint.
pub const HEALTH_PATH: &str = "/api/tags";

/// Model pulled when the service has none installed.
pub const DEFAULT_MODEL: &str = "llama2";
