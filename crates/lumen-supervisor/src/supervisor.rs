//! Supervisor for the local Ollama service.
//!
//! Finds a working `ollama` executable among the candidate paths, starts
//! `ollama serve`, and waits for the health endpoint to answer. Retries are
//! linear with fixed delays; nothing is persisted between calls.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::client::{ModelSummary, ServiceClient};
use crate::error::SupervisorError;
use crate::model::ModelTool;
use crate::paths::candidate_paths;
use crate::DEFAULT_PORT;

/// Delay between spawning the service and re-checking reachability.
pub const SETTLE_INTERVAL: Duration = Duration::from_secs(3);

/// Number of attempts `ensure_running` makes.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay after each start attempt before re-checking reachability.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_GRACE: Duration = Duration::from_millis(500);

/// A child process this supervisor spawned and still owns.
#[derive(Debug)]
struct ManagedProcess {
    pid: u32,
    path: String,
    stop_tx: oneshot::Sender<()>,
}

type SharedHandle = Arc<Mutex<Option<ManagedProcess>>>;

/// Manager for the Ollama service process.
///
/// At most one child is owned at a time. Dropping the supervisor does not
/// terminate its child: the service is left running for other clients.
/// Call [`Supervisor::stop`] to shut down a process this instance started.
#[derive(Debug)]
pub struct Supervisor {
    port: u16,
    max_retries: u32,
    retry_delay: Duration,
    settle_interval: Duration,
    candidates: Vec<String>,
    log_file: Option<PathBuf>,
    client: ServiceClient,
    starting: AtomicBool,
    managed: SharedHandle,
}

/// Clears the starting flag when a start attempt ends, however it ends.
struct StartGuard<'a>(&'a AtomicBool);

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Supervisor {
    /// Create a supervisor with default settings for this platform.
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            settle_interval: SETTLE_INTERVAL,
            candidates: candidate_paths(),
            log_file: None,
            client: ServiceClient::with_port(DEFAULT_PORT),
            starting: AtomicBool::new(false),
            managed: Arc::new(Mutex::new(None)),
        }
    }

    /// Set a custom port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self.client = ServiceClient::with_port(port);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    /// Replace the candidate executable list.
    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Append the service's output to `path` instead of forwarding it to
    /// the log.
    ///
    /// A detached service must not write into pipes owned by this process,
    /// which go away when the host exits.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Get the port this supervisor checks.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Candidate executables, in priority order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Get a client for the supervised service.
    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Whether a start attempt is in progress.
    pub fn is_starting(&self) -> bool {
        self.starting.load(Ordering::Acquire)
    }

    /// Whether this supervisor owns a running child.
    pub fn is_managing(&self) -> bool {
        self.handle().is_some()
    }

    /// PID of the owned child, if any.
    pub fn managed_pid(&self) -> Option<u32> {
        self.handle().as_ref().map(|p| p.pid)
    }

    /// Check if the service answers its health endpoint.
    pub async fn is_reachable(&self) -> bool {
        self.client.is_reachable().await
    }

    /// List the models installed in the running service.
    pub async fn list_models(&self) -> Result<Vec<ModelSummary>, SupervisorError> {
        self.client.list_models().await
    }

    /// Start the service from the first candidate that works.
    ///
    /// Returns `Ok(false)` without doing anything if another start attempt is
    /// already in progress, and `Ok(true)` once the service is reachable.
    pub async fn start_process(&self) -> Result<bool, SupervisorError> {
        let Some(_guard) = self.try_begin_start() else {
            debug!("Start already in progress, skipping");
            return Ok(false);
        };

        if self.is_reachable().await {
            info!("Ollama is already running on port {}", self.port);
            return Ok(true);
        }

        for path in &self.candidates {
            if !probe_executable(path).await {
                debug!("No usable executable at {}", path);
                continue;
            }

            info!("Starting Ollama from {}", path);
            if let Err(e) = self.spawn_managed(path) {
                warn!("Failed to spawn {}: {}", path, e);
                continue;
            }

            sleep(self.settle_interval).await;

            if self.is_reachable().await {
                info!("Ollama is ready on port {}", self.port);
                return Ok(true);
            }

            warn!(
                "Ollama from {} did not become reachable within {:?}, stopping it",
                path, self.settle_interval
            );
            self.stop();
        }

        Err(SupervisorError::ExecutableNotFound {
            tried: self.candidates.len(),
        })
    }

    /// Make sure the service is reachable, starting it if necessary.
    pub async fn ensure_running(&self) -> Result<(), SupervisorError> {
        for attempt in 1..=self.max_retries {
            if self.is_reachable().await {
                return Ok(());
            }

            info!("Starting Ollama (attempt {}/{})", attempt, self.max_retries);
            if let Err(e) = self.start_process().await {
                warn!("Attempt {} failed: {}", attempt, e);
            }

            sleep(self.retry_delay).await;

            if self.is_reachable().await {
                return Ok(());
            }
        }

        Err(SupervisorError::StartupFailure {
            attempts: self.max_retries,
        })
    }

    /// Terminate the owned child, if any.
    ///
    /// SIGTERM goes to the child's process group before this returns; the
    /// watcher force-kills the group if it is still alive after a short
    /// grace period. Safe to call when nothing is owned.
    pub fn stop(&self) {
        let Some(process) = self.handle().take() else {
            return;
        };

        info!("Stopping Ollama (PID: {}, from {})", process.pid, process.path);
        #[cfg(unix)]
        signal_group(process.pid, libc::SIGTERM);

        // The watcher is gone only if the child already exited.
        let _ = process.stop_tx.send(());
    }

    /// Give up ownership of the child without terminating it.
    ///
    /// Returns the PID of the released process.
    pub fn detach(&self) -> Option<u32> {
        let process = self.handle().take()?;
        info!("Leaving Ollama running (PID: {})", process.pid);
        // Dropping the sender tells the watcher to let the child be.
        drop(process.stop_tx);
        Some(process.pid)
    }

    /// Pull `name` if the service has no models installed.
    ///
    /// Never fails; any problem is logged and reported as `false`.
    pub async fn ensure_default_model(&self, name: &str) -> bool {
        let models = match self.list_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!("Could not list installed models: {}", e);
                return false;
            }
        };

        if !models.is_empty() {
            debug!("{} model(s) installed, not pulling '{}'", models.len(), name);
            return true;
        }

        let Some(executable) = self.candidates.first() else {
            warn!("{}", SupervisorError::NoExecutable);
            return false;
        };

        match ModelTool::new(executable.clone()).pull(name).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    fn try_begin_start(&self) -> Option<StartGuard<'_>> {
        self.starting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| StartGuard(&self.starting))
    }

    fn handle(&self) -> MutexGuard<'_, Option<ManagedProcess>> {
        self.managed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_managed(&self, path: &str) -> Result<u32, SupervisorError> {
        // Never own two children at once.
        self.stop();

        let mut command = Command::new(path);
        command.arg("serve").stdin(Stdio::null());
        match &self.log_file {
            Some(log_path) => {
                if let Some(dir) = log_path.parent() {
                    fs::create_dir_all(dir)?;
                }
                let log = OpenOptions::new().create(true).append(true).open(log_path)?;
                command.stdout(log.try_clone()?).stderr(log);
            }
            None => {
                command.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        let pid = child.id().unwrap_or_default();
        debug!("Ollama process started with PID: {}", pid);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, pid, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, pid, "stderr"));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.handle() = Some(ManagedProcess {
            pid,
            path: path.to_string(),
            stop_tx,
        });
        tokio::spawn(watch_process(child, pid, stop_rx, Arc::clone(&self.managed)));

        Ok(pid)
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `<path> --version` and report whether it succeeded.
async fn probe_executable(path: &str) -> bool {
    let probe = Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match timeout(PROBE_TIMEOUT, probe).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!("Probe of {} failed: {}", path, e);
            false
        }
        Err(_) => {
            debug!("Probe of {} timed out", path);
            false
        }
    }
}

async fn forward_output<R>(reader: R, pid: u32, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(pid, stream, "{}", line);
    }
}

/// Wait for the child to exit or for a stop request.
async fn watch_process(
    mut child: Child,
    pid: u32,
    stop_rx: oneshot::Receiver<()>,
    managed: SharedHandle,
) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) if status.success() => info!("Ollama (PID: {}) exited", pid),
                Ok(status) => warn!("Ollama (PID: {}) exited unexpectedly: {}", pid, status),
                Err(e) => warn!("Error waiting for Ollama (PID: {}): {}", pid, e),
            }
            release(&managed, pid);
        }
        request = stop_rx => {
            if request.is_ok() {
                terminate(child, pid).await;
            } else {
                debug!("Ownership of PID {} released", pid);
            }
        }
    }
}

/// Clear the owned handle if it still refers to `pid`.
fn release(managed: &SharedHandle, pid: u32) {
    let mut handle = managed.lock().unwrap_or_else(PoisonError::into_inner);
    if handle.as_ref().is_some_and(|p| p.pid == pid) {
        *handle = None;
    }
}

/// Send `signal` to the process group led by `pid`.
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    if pgid <= 0 {
        return;
    }
    // SAFETY: the group leader is a child we spawned and have not reaped,
    // so its id cannot have been reused.
    unsafe {
        libc::kill(-pgid, signal);
    }
}

/// Wait out the grace period after SIGTERM, then kill whatever is left.
async fn terminate(mut child: Child, pid: u32) {
    match timeout(STOP_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!("Ollama exited with status: {}", status),
        Ok(Err(e)) => {
            warn!("Error checking Ollama status: {}", e);
            force_kill(&mut child, pid).await;
        }
        Err(_) => {
            warn!("Ollama didn't exit gracefully, killing...");
            force_kill(&mut child, pid).await;
        }
    }
}

async fn force_kill(child: &mut Child, pid: u32) {
    #[cfg(unix)]
    signal_group(pid, libc::SIGKILL);
    #[cfg(not(unix))]
    let _ = pid;

    let _ = child.kill().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn unreachable_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_defaults() {
        let supervisor = Supervisor::new();
        assert_eq!(supervisor.port(), 11434);
        assert_eq!(supervisor.max_retries(), 3);
        assert_eq!(supervisor.candidates(), candidate_paths().as_slice());
        assert!(!supervisor.is_starting());
        assert!(!supervisor.is_managing());
    }

    #[test]
    fn test_with_port_moves_client() {
        let supervisor = Supervisor::new().with_port(9999);
        assert_eq!(supervisor.port(), 9999);
        assert_eq!(supervisor.client().base_url(), "http://localhost:9999");
    }

    #[test]
    fn test_stop_without_child_is_noop() {
        let supervisor = Supervisor::new();
        supervisor.stop();
        supervisor.stop();
        assert!(!supervisor.is_managing());
        assert_eq!(supervisor.detach(), None);
    }

    #[test]
    fn test_start_guard_resets() {
        let supervisor = Supervisor::new();
        {
            let guard = supervisor.try_begin_start();
            assert!(guard.is_some());
            assert!(supervisor.is_starting());
            assert!(supervisor.try_begin_start().is_none());
        }
        assert!(!supervisor.is_starting());
    }

    #[tokio::test]
    async fn test_start_while_starting_does_nothing() {
        let supervisor = Supervisor::new()
            .with_port(unreachable_port())
            .with_candidates(["/nonexistent/lumen-test/ollama"]);

        let _guard = supervisor.try_begin_start();
        // Without the guard this would fail with ExecutableNotFound.
        assert!(!supervisor.start_process().await.unwrap());
        assert!(!supervisor.is_managing());
    }

    #[tokio::test]
    async fn test_start_when_reachable_spawns_nothing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200).json_body(json!({ "models": [] }));
            })
            .await;

        let supervisor = Supervisor::new()
            .with_port(server.port())
            .with_candidates(["/nonexistent/lumen-test/ollama"]);

        assert!(supervisor.start_process().await.unwrap());
        assert!(!supervisor.is_managing());
        assert!(!supervisor.is_starting());
    }

    #[tokio::test]
    async fn test_start_with_no_working_candidate() {
        let supervisor = Supervisor::new()
            .with_port(unreachable_port())
            .with_candidates(["/nonexistent/a/ollama", "/nonexistent/b/ollama"]);

        let err = supervisor.start_process().await.unwrap_err();
        assert!(matches!(err, SupervisorError::ExecutableNotFound { tried: 2 }));
        assert!(!supervisor.is_starting());
    }

    #[tokio::test]
    async fn test_default_model_soft_fails_without_service() {
        let supervisor = Supervisor::new().with_port(unreachable_port());
        assert!(!supervisor.ensure_default_model("llama2").await);
    }

    #[tokio::test]
    async fn test_default_model_without_candidates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200).json_body(json!({ "models": [] }));
            })
            .await;

        let supervisor = Supervisor::new()
            .with_port(server.port())
            .with_candidates(Vec::<String>::new());
        assert!(!supervisor.ensure_default_model("llama2").await);
    }
}
