//! Lumen CLI - launcher for the web page, the editor bridge and Ollama setup.

use clap::{ArgGroup, Parser};
use lumen_assistant::AssistantConfig;
use std::path::{Path, PathBuf};

mod commands;

use commands::Mode;

/// Lumen - a local programming assistant on top of Ollama
#[derive(Parser)]
#[command(name = "lumen")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").multiple(false)))]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Serve the web page and its question API
    #[arg(long, group = "mode")]
    web: bool,

    /// Run the editor bridge on stdin/stdout
    #[arg(long, group = "mode")]
    extension: bool,

    /// Start Ollama if needed and make sure the default model is installed
    #[arg(long, group = "mode")]
    ollama: bool,

    /// Create the customized coding model and optionally try it
    #[arg(long, group = "mode")]
    customize: bool,

    /// Show the Ollama installation and service status
    #[arg(long, group = "mode")]
    status: bool,

    /// Settings file (JSON with useOllama, ollamaModel, apiKey)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port for the web server
    #[arg(long, default_value_t = commands::web::DEFAULT_WEB_PORT)]
    port: u16,

    /// Directory the web page is served from
    #[arg(long, default_value = "web")]
    web_root: PathBuf,

    /// Name of the customized model
    #[arg(long, default_value = commands::ollama::DEFAULT_CUSTOM_MODEL)]
    model_name: String,
}

impl Cli {
    fn mode(&self) -> Option<Mode> {
        if self.web {
            Some(Mode::Web)
        } else if self.extension {
            Some(Mode::Extension)
        } else if self.ollama {
            Some(Mode::Ollama)
        } else if self.customize {
            Some(Mode::Customize)
        } else if self.status {
            Some(Mode::Status)
        } else {
            None
        }
    }
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout belongs to the editor bridge.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = load_config(cli.config.as_deref())?;

    let mode = match cli.mode() {
        Some(mode) => mode,
        None => commands::menu::choose()?,
    };

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to start async runtime: {}", e))?;

    runtime.block_on(async {
        match mode {
            Mode::Web => commands::web::run(config, cli.port, &cli.web_root).await,
            Mode::Extension => commands::extension::run(config).await,
            Mode::Ollama => commands::ollama::setup(&config).await,
            Mode::Customize => commands::ollama::customize(&config, &cli.model_name).await,
            Mode::Status => commands::status::run(&config).await,
            Mode::Quit => Ok(()),
        }
    })
}

fn load_config(path: Option<&Path>) -> miette::Result<AssistantConfig> {
    let config = match path {
        Some(path) => AssistantConfig::from_file(path)
            .map_err(|e| miette::miette!("{}: {}", path.display(), e))?
            .merge_env(),
        None => AssistantConfig::from_env(),
    };

    if !config.is_valid() {
        return Err(miette::miette!(
            help = "Set apiKey in the settings file or LUMEN_API_KEY, or enable useOllama.",
            "The remote API is selected but no API key is configured"
        ));
    }

    Ok(config)
}
