use crate::error::{PipelineError, Stage};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Per-stream capture limit; older output is dropped first
pub const MAX_CAPTURED_BYTES: usize = 64 * 1024;

/// How long to wait for output readers once the process itself is gone
const READER_GRACE: Duration = Duration::from_secs(2);

/// One external-process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
    pub stage: Stage,
}

impl ProcessSpec {
    pub fn new(stage: Stage, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            timeout,
            stage,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Human-readable command line for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Three-way result of a stage invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Success {
        stdout: String,
        stderr: String,
    },
    ProcessFailure {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    Timeout {
        partial_output: String,
        after: Duration,
    },
}

impl StageOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        StageOutcome::Success {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        StageOutcome::ProcessFailure {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Converts a non-success outcome into the matching pipeline error
    pub fn into_result(self, stage: Stage) -> Result<String, PipelineError> {
        match self {
            StageOutcome::Success { stdout, .. } => Ok(stdout),
            StageOutcome::ProcessFailure {
                exit_code,
                stdout,
                stderr,
            } => Err(PipelineError::ProcessFailure {
                stage,
                exit_code,
                stdout,
                stderr,
            }),
            StageOutcome::Timeout {
                partial_output,
                after,
            } => Err(PipelineError::Timeout {
                stage,
                after,
                partial_output,
            }),
        }
    }
}

/// Seam between stage logic and the operating system
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &ProcessSpec) -> StageOutcome;
}

/// Production runner: spawns in a fresh process group and kills the whole
/// group when the timeout fires
#[derive(Debug, Default, Clone)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

fn spawn_reader<R>(reader: Option<R>, buffer: SharedBuffer) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = reader?;
    Some(tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let Ok(mut buf) = buffer.lock() else { break };
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.len() > MAX_CAPTURED_BYTES {
                        let excess = buf.len() - MAX_CAPTURED_BYTES;
                        buf.drain(..excess);
                    }
                }
            }
        }
    }))
}

async fn finish_reader(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if tokio::time::timeout(READER_GRACE, handle).await.is_err() {
            debug!("Output reader still open after process exit, abandoning it");
        }
    }
}

fn take_text(buffer: &SharedBuffer) -> String {
    buffer
        .lock()
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: killpg only sends a signal; the group was created for this child.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> StageOutcome {
        debug!(stage = %spec.stage, command = %spec.command_line(), "Spawning process");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(stage = %spec.stage, program = %spec.program, error = %e, "Failed to spawn process");
                return StageOutcome::failure(
                    None,
                    format!("failed to spawn {}: {}", spec.program, e),
                );
            }
        };

        let stdout_buf: SharedBuffer = Arc::default();
        let stderr_buf: SharedBuffer = Arc::default();
        let stdout_task = spawn_reader(child.stdout.take(), Arc::clone(&stdout_buf));
        let stderr_task = spawn_reader(child.stderr.take(), Arc::clone(&stderr_buf));

        let status = tokio::select! {
            status = child.wait() => Some(status),
            () = tokio::time::sleep(spec.timeout) => None,
        };

        match status {
            Some(Ok(status)) => {
                finish_reader(stdout_task).await;
                finish_reader(stderr_task).await;
                let stdout = take_text(&stdout_buf);
                let stderr = take_text(&stderr_buf);
                if status.success() {
                    StageOutcome::Success { stdout, stderr }
                } else {
                    StageOutcome::ProcessFailure {
                        exit_code: status.code(),
                        stdout,
                        stderr,
                    }
                }
            }
            Some(Err(e)) => {
                kill_group(&child);
                let _ = child.kill().await;
                finish_reader(stdout_task).await;
                finish_reader(stderr_task).await;
                let mut stderr = take_text(&stderr_buf);
                stderr.push_str(&format!("\nfailed to wait for {}: {}", spec.program, e));
                StageOutcome::ProcessFailure {
                    exit_code: None,
                    stdout: take_text(&stdout_buf),
                    stderr,
                }
            }
            None => {
                warn!(
                    stage = %spec.stage,
                    command = %spec.command_line(),
                    timeout_secs = spec.timeout.as_secs_f64(),
                    "Process timed out, killing process group"
                );
                kill_group(&child);
                let _ = child.kill().await;
                let _ = child.wait().await;
                finish_reader(stdout_task).await;
                finish_reader(stderr_task).await;

                let stdout = take_text(&stdout_buf);
                let stderr = take_text(&stderr_buf);
                let partial_output = match (stdout.is_empty(), stderr.is_empty()) {
                    (true, _) => stderr,
                    (false, true) => stdout,
                    (false, false) => format!("{}\n{}", stdout.trim_end(), stderr),
                };
                StageOutcome::Timeout {
                    partial_output,
                    after: spec.timeout,
                }
            }
        }
    }
}
