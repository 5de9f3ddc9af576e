//! Candidate executable locations and Lumen data directories.

use std::path::PathBuf;

/// Name of the executable when it is on `PATH`.
#[cfg(target_os = "windows")]
pub const EXECUTABLE_NAME: &str = "ollama.exe";
#[cfg(not(target_os = "windows"))]
pub const EXECUTABLE_NAME: &str = "ollama";

/// Ordered list of places where Ollama is conventionally installed.
///
/// Most likely location first. Nothing is checked on disk here; the
/// supervisor probes each entry with `--version` when it needs one.
pub fn candidate_paths() -> Vec<String> {
    platform_candidates()
}

#[cfg(target_os = "windows")]
fn platform_candidates() -> Vec<String> {
    let mut paths = vec![EXECUTABLE_NAME.to_string()];
    if let Some(local) = dirs::data_local_dir() {
        paths.push(
            local
                .join("Programs")
                .join("Ollama")
                .join("ollama.exe")
                .display()
                .to_string(),
        );
    }
    paths.push(r"C:\Program Files\Ollama\ollama.exe".to_string());
    paths
}

#[cfg(target_os = "macos")]
fn platform_candidates() -> Vec<String> {
    vec![
        EXECUTABLE_NAME.to_string(),
        "/usr/local/bin/ollama".to_string(),
        "/opt/homebrew/bin/ollama".to_string(),
        "/Applications/Ollama.app/Contents/Resources/ollama".to_string(),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn platform_candidates() -> Vec<String> {
    vec![
        EXECUTABLE_NAME.to_string(),
        "/usr/local/bin/ollama".to_string(),
        "/usr/bin/ollama".to_string(),
        home_dir().join(".local/bin/ollama").display().to_string(),
    ]
}

/// Human-readable instructions for installing and starting Ollama.
pub fn install_instructions() -> &'static str {
    if cfg!(target_os = "windows") {
        "Install Ollama from https://ollama.com/download/windows, then run `ollama serve`."
    } else if cfg!(target_os = "macos") {
        "Install Ollama with `brew install ollama` or from https://ollama.com/download/mac, then run `ollama serve`."
    } else {
        "Install Ollama with `curl -fsSL https://ollama.com/install.sh | sh`, then run `ollama serve`."
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(std::env::temp_dir)
}

/// Get the Lumen data directory (~/.lumen/).
pub fn lumen_data_dir() -> PathBuf {
    home_dir().join(".lumen")
}

/// Get the directory generated model definition files are written to.
pub fn modelfiles_dir() -> PathBuf {
    lumen_data_dir().join("modelfiles")
}

/// Get the file a detached service's output is appended to.
pub fn service_log_path() -> PathBuf {
    lumen_data_dir().join("ollama.log")
}

/// Get the path of the definition file for a named model.
pub fn modelfile_path(dir: &std::path::Path, model_name: &str) -> PathBuf {
    let safe: String = model_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    dir.join(format!("{}.Modelfile", safe))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_lookup_comes_first() {
        let paths = candidate_paths();
        assert_eq!(paths[0], EXECUTABLE_NAME);
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn test_linux_candidates() {
        let paths = candidate_paths();
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[1], "/usr/local/bin/ollama");
        assert_eq!(paths[2], "/usr/bin/ollama");
        assert!(paths[3].ends_with(".local/bin/ollama"));
        assert!(!paths[3].starts_with('~'));
    }

    #[test]
    fn test_modelfile_path_sanitizes_tags() {
        let dir = std::path::Path::new("/tmp/lumen");
        let path = modelfile_path(dir, "lumen-coder:latest");
        assert_eq!(path, dir.join("lumen-coder_latest.Modelfile"));
    }

    #[test]
    fn test_data_dirs_nest() {
        assert!(modelfiles_dir().starts_with(lumen_data_dir()));
        assert!(service_log_path().starts_with(lumen_data_dir()));
    }
}
