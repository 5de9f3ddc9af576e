//! CLI commands.

use lumen_assistant::AssistantError;
use lumen_supervisor::{paths, SupervisorError};

pub mod extension;
pub mod menu;
pub mod ollama;
pub mod status;
pub mod web;

/// What the launcher was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Web,
    Extension,
    Ollama,
    Customize,
    Status,
    Quit,
}

/// Turn a supervisor error into a report, with install instructions when
/// Ollama could not be started at all.
pub(crate) fn supervisor_report(err: SupervisorError) -> miette::Report {
    if err.is_launch_failure() {
        miette::miette!(help = paths::install_instructions(), "{}", err)
    } else {
        miette::miette!("{}", err)
    }
}

pub(crate) fn assistant_report(err: AssistantError) -> miette::Report {
    match err {
        AssistantError::Supervisor(err) => supervisor_report(err),
        AssistantError::ModelUnavailable(model) => miette::miette!(
            help = format!("Pull it manually with: ollama pull {}", model),
            "Model '{}' is not available",
            model
        ),
        other => miette::miette!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_failures_carry_instructions() {
        let report = supervisor_report(SupervisorError::StartupFailure { attempts: 3 });
        let help = report.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("ollama"));
        assert!(report.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_other_failures_have_no_help() {
        let report = supervisor_report(SupervisorError::Api("boom".to_string()));
        assert!(report.help().is_none());
    }

    #[test]
    fn test_model_unavailable_help() {
        let report = assistant_report(AssistantError::ModelUnavailable("llama2".to_string()));
        let help = report.help().map(|h| h.to_string()).unwrap_or_default();
        assert_eq!(help, "Pull it manually with: ollama pull llama2");
    }
}
