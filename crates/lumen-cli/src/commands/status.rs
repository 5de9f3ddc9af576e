//! Status command - show configuration and Ollama service state.

use lumen_assistant::AssistantConfig;
use lumen_supervisor::{paths, ServiceClient};

pub(crate) async fn run(config: &AssistantConfig) -> miette::Result<()> {
    println!("Lumen Status");
    println!("============");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    if config.use_ollama {
        println!("Backend:          Ollama ({})", config.ollama_url);
        println!("Model:            {}", config.ollama_model);
    } else {
        println!("Backend:          remote API ({})", config.remote_url);
        println!("Model:            {}", config.remote_model);
        println!("API key:          {}", if config.api_key.is_empty() { "missing" } else { "set" });
    }
    println!();

    println!("Candidate executables (in order):");
    for path in paths::candidate_paths() {
        println!("  - {}", path);
    }
    println!();
    println!("Data directory:   {}", paths::lumen_data_dir().display());
    println!("Service log:      {}", paths::service_log_path().display());
    println!();

    let client = ServiceClient::with_port(config.ollama_port());
    if !client.is_reachable().await {
        println!("Ollama:           not running at {}", client.base_url());
        println!();
        println!("{}", paths::install_instructions());
        return Ok(());
    }

    println!("Ollama:           running at {}", client.base_url());
    match client.list_models().await {
        Ok(models) if models.is_empty() => {
            println!("Models:           none installed");
            println!();
            println!("To install the default model, run:");
            println!("  lumen --ollama");
        }
        Ok(models) => {
            println!("Models:");
            for model in models {
                println!("  - {}", model.name);
            }
        }
        Err(e) => println!("Models:           could not list ({})", e),
    }

    Ok(())
}
