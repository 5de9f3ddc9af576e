//! Model fetching and customization through the `ollama` executable.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::SupervisorError;
use crate::paths::{modelfile_path, modelfiles_dir};

/// System prompt baked into the default customized model.
pub const CODING_ASSISTANT_SYSTEM: &str = "You are Lumen, a concise programming assistant. \
Answer questions about code directly, prefer short examples over long prose, \
and say so when you are unsure.";

/// Definition of a custom model, rendered in Ollama's Modelfile format.
#[derive(Debug, Clone, PartialEq)]
pub struct Modelfile {
    base: String,
    system: Option<String>,
    template: Option<String>,
    parameters: Vec<(String, String)>,
}

impl Modelfile {
    /// Start a definition derived from `base`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            system: None,
            template: None,
            parameters: Vec::new(),
        }
    }

    /// The default code-helper preset.
    pub fn coding_assistant(base: impl Into<String>) -> Self {
        Self::new(base)
            .with_parameter("temperature", "0.7")
            .with_parameter("top_p", "0.9")
            .with_system(CODING_ASSISTANT_SYSTEM)
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    /// Base model this definition builds on.
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl fmt::Display for Modelfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FROM {}", self.base)?;
        for (key, value) in &self.parameters {
            writeln!(f, "PARAMETER {} {}", key, value)?;
        }
        if let Some(template) = &self.template {
            writeln!(f, "TEMPLATE \"\"\"{}\"\"\"", template)?;
        }
        if let Some(system) = &self.system {
            writeln!(f, "SYSTEM \"\"\"{}\"\"\"", system)?;
        }
        Ok(())
    }
}

/// Runs model subcommands of the `ollama` executable.
#[derive(Debug, Clone)]
pub struct ModelTool {
    executable: String,
    workdir: PathBuf,
}

impl ModelTool {
    /// Create a tool that invokes `executable`.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            workdir: modelfiles_dir(),
        }
    }

    /// Set the directory generated definition files are written to.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = dir.into();
        self
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Fetch a model, streaming the executable's progress to the console.
    pub async fn pull(&self, name: &str) -> Result<(), SupervisorError> {
        info!("Pulling model '{}' with {}", name, self.executable);

        let status = Command::new(&self.executable)
            .arg("pull")
            .arg(name)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if status.success() {
            info!("Model '{}' is available", name);
            Ok(())
        } else {
            Err(SupervisorError::ResourceFetch {
                name: name.to_string(),
                code: status.code(),
            })
        }
    }

    /// Write the definition file and create a model from it.
    ///
    /// Returns the path of the definition file that was used.
    pub async fn create(
        &self,
        name: &str,
        modelfile: &Modelfile,
    ) -> Result<PathBuf, SupervisorError> {
        fs::create_dir_all(&self.workdir)?;
        let path = modelfile_path(&self.workdir, name);
        fs::write(&path, modelfile.to_string())?;
        debug!("Wrote model definition to {:?}", path);

        info!("Creating model '{}' from {}", name, modelfile.base());

        let status = Command::new(&self.executable)
            .arg("create")
            .arg(name)
            .arg("-f")
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if status.success() {
            info!("Model '{}' created", name);
            Ok(path)
        } else {
            Err(SupervisorError::CreateFailed {
                name: name.to_string(),
                code: status.code(),
            })
        }
    }

    /// Open an interactive session with a model on the console.
    pub async fn run_interactive(&self, name: &str) -> Result<(), SupervisorError> {
        info!("Starting interactive session with '{}'", name);

        let status = Command::new(&self.executable)
            .arg("run")
            .arg(name)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if !status.success() {
            return Err(SupervisorError::Api(format!(
                "`{} run {}` exited with {}",
                self.executable, name, status
            )));
        }
        Ok(())
    }

    /// Directory definition files are written to.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}
