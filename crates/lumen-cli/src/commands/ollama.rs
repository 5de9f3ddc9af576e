//! Ollama setup and model customization commands.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use lumen_assistant::AssistantConfig;
use lumen_supervisor::{paths, ModelTool, Modelfile, Supervisor};

use super::supervisor_report;

/// Name of the model `--customize` creates.
pub const DEFAULT_CUSTOM_MODEL: &str = "lumen-coder";

/// Supervisor for the configured port whose service outlives the launcher.
pub(crate) fn supervisor_for(config: &AssistantConfig) -> Supervisor {
    Supervisor::new()
        .with_port(config.ollama_port())
        .with_log_file(paths::service_log_path())
}

/// Run `task` with a spinner showing `message`.
async fn with_spinner<F: Future>(message: &str, task: F) -> F::Output {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));

    let output = task.await;
    spinner.finish_and_clear();
    output
}

/// Start Ollama if needed and make sure the configured model is installed.
pub(crate) async fn setup(config: &AssistantConfig) -> miette::Result<()> {
    let supervisor = supervisor_for(config);

    with_spinner("Starting Ollama...", supervisor.ensure_running())
        .await
        .map_err(supervisor_report)?;
    println!("Ollama is running on port {}", supervisor.port());

    if !supervisor.ensure_default_model(&config.ollama_model).await {
        return Err(miette::miette!(
            help = format!("Pull it manually with: ollama pull {}", config.ollama_model),
            "Could not make sure model '{}' is installed",
            config.ollama_model
        ));
    }

    let models = supervisor.list_models().await.map_err(supervisor_report)?;
    println!();
    println!("Installed models:");
    for model in &models {
        println!("  - {}", model.name);
    }

    if let Some(pid) = supervisor.detach() {
        println!();
        println!("Started Ollama (PID {}); it keeps running after Lumen exits.", pid);
        println!("Service log: {}", paths::service_log_path().display());
    }

    Ok(())
}

/// Create the customized coding model and optionally open a test session.
pub(crate) async fn customize(config: &AssistantConfig, name: &str) -> miette::Result<()> {
    let supervisor = supervisor_for(config);

    with_spinner("Starting Ollama...", supervisor.ensure_running())
        .await
        .map_err(supervisor_report)?;

    if !supervisor.ensure_default_model(&config.ollama_model).await {
        return Err(miette::miette!(
            "Base model '{}' is not available",
            config.ollama_model
        ));
    }

    let executable = supervisor
        .candidates()
        .first()
        .cloned()
        .ok_or_else(|| miette::miette!("No Ollama executable configured"))?;
    let tool = ModelTool::new(executable);
    let modelfile = Modelfile::coding_assistant(&config.ollama_model);

    println!("Creating model '{}' from '{}'...", name, config.ollama_model);
    let path = tool
        .create(name, &modelfile)
        .await
        .map_err(supervisor_report)?;
    println!("Model '{}' created (definition: {})", name, path.display());
    println!();
    println!("Use it by setting \"ollamaModel\": \"{}\" in your settings.", name);

    supervisor.detach();

    if confirm("Try the model now?")? {
        tool.run_interactive(name).await.map_err(supervisor_report)?;
    }

    Ok(())
}

fn confirm(question: &str) -> miette::Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout()
        .flush()
        .map_err(|e| miette::miette!("Failed to write prompt: {}", e))?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| miette::miette!("Failed to read answer: {}", e))?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
