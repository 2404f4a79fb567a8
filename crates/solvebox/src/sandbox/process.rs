//! A single warm container and its stdio
//!
//! The runtime client is started ahead of time and blocks on stdin. Writing
//! the program and closing stdin runs it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, instrument, warn};

use crate::parser::split_timing;
use crate::sandbox::command::{SandboxAction, SandboxCommand};
use crate::sandbox::{RUNTIME_FAILURE_EXIT_CODE, SandboxError};
use crate::types::{ExecutionResult, ResourceLimits};

const READ_CHUNK: usize = 8 * 1024;

/// First-line stderr prefixes a runtime prints when the container never started
const RUNTIME_ERROR_PREFIXES: &[&str] = &[
    "docker: ",
    "Error response from daemon",
    "Unable to find image",
    // podman
    "Error: ",
];

/// A spawned, unused sandbox process
///
/// Consumed by [`PooledProcess::run`]. A process that is dropped without
/// running is force-removed on a background thread.
#[derive(Debug)]
pub struct PooledProcess {
    id: u64,
    name: String,
    language: String,
    runtime_path: PathBuf,
    limits: ResourceLimits,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    created_at: Instant,
    /// Set once the container is known to be gone
    finished: bool,
}

impl PooledProcess {
    /// Start the runtime client for `command`
    ///
    /// Returns as soon as the client process exists; the container itself
    /// boots in the background.
    pub fn spawn(
        id: u64,
        language: impl Into<String>,
        command: SandboxCommand,
        limits: ResourceLimits,
    ) -> Result<Self, SandboxError> {
        let name = command.name().to_string();
        let runtime_path = command.runtime_path().to_path_buf();
        let args = command.limits(limits.clone()).build();

        let (program, rest) = args.split_first().ok_or_else(|| SandboxError::SpawnFailed {
            path: runtime_path.clone(),
            source: std::io::Error::new(ErrorKind::InvalidInput, "empty command arguments"),
        })?;

        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::SpawnFailed {
                path: runtime_path.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        debug!(id, name = %name, "spawned sandbox process");

        Ok(Self {
            id,
            name,
            language: language.into(),
            runtime_path,
            limits,
            child,
            stdin,
            stdout,
            stderr,
            created_at: Instant::now(),
            finished: false,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Container name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Time since the process was spawned
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Check that the runtime client is still waiting for input
    ///
    /// A client that exited on its own (bad image, daemon restart) is
    /// marked finished and will not be cleaned up again.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(id = self.id, ?status, "idle sandbox exited");
                self.finished = true;
                false
            }
            Err(e) => {
                warn!(id = self.id, error = %e, "failed to poll sandbox process");
                false
            }
        }
    }

    /// Feed `program` to the sandbox and collect its output
    ///
    /// Stdin is closed after the program is written, which starts it. The
    /// wall-time limit covers the whole exchange; on expiry the container is
    /// removed and the result is marked timed out.
    #[instrument(skip(self, program), fields(id = self.id, name = %self.name))]
    pub async fn run(mut self, program: &[u8]) -> Result<ExecutionResult, SandboxError> {
        let stdin = self.stdin.take().ok_or(SandboxError::Consumed)?;
        let stdout = self.stdout.take().ok_or(SandboxError::Consumed)?;
        let stderr = self.stderr.take().ok_or(SandboxError::Consumed)?;

        let cap = self.limits.max_output_bytes().unwrap_or(usize::MAX);
        let wall_limit = self.limits.wall_time_limit.map(Duration::from_secs_f64);
        let start = Instant::now();

        let outcome = {
            let exchange = async {
                tokio::join!(
                    write_program(stdin, program),
                    read_capped(stdout, cap),
                    read_capped(stderr, cap),
                    self.child.wait(),
                )
            };
            match wall_limit {
                Some(limit) => tokio::time::timeout(limit, exchange).await.ok(),
                None => Some(exchange.await),
            }
        };
        let wall_time = start.elapsed().as_secs_f64();

        let Some((written, stdout, stderr, status)) = outcome else {
            warn!(wall_time, "sandbox exceeded wall time limit");
            self.remove().await;
            return Ok(ExecutionResult {
                wall_time,
                timed_out: true,
                ..ExecutionResult::default()
            });
        };
        self.mark_finished();

        written?;
        let (stdout, stdout_truncated) = stdout?;
        let (stderr, stderr_truncated) = stderr?;
        let status = status?;

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if is_runtime_failure(status.code(), &stdout, &stderr) {
            return Err(SandboxError::RuntimeFailed {
                code: RUNTIME_FAILURE_EXIT_CODE,
                stderr: stderr.trim().to_string(),
            });
        }

        let (elapsed_millis, stdout) = split_timing(&stdout);

        debug!(
            exit_code = ?status.code(),
            wall_time,
            timings = elapsed_millis.len(),
            "sandbox run complete"
        );

        Ok(ExecutionResult {
            elapsed_millis,
            stdout,
            stderr,
            exit_code: status.code(),
            wall_time,
            timed_out: false,
            truncated: stdout_truncated || stderr_truncated,
        })
    }

    fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// Kill the client and force-remove the container
    pub async fn discard(mut self) {
        self.remove().await;
    }

    async fn remove(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(id = self.id, error = %e, "sandbox client already exited");
        }

        let args = remove_args(&self.runtime_path, &self.name);
        if let Some((program, rest)) = args.split_first() {
            match Command::new(program).args(rest).output().await {
                Ok(output) if output.status.success() => {
                    debug!(name = %self.name, "removed container");
                }
                Ok(output) => {
                    // The container may already be gone with --rm
                    debug!(
                        name = %self.name,
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "container removal reported an error"
                    );
                }
                Err(e) => {
                    warn!(name = %self.name, error = %e, "failed to run container removal");
                }
            }
        }
        self.mark_finished();
    }
}

impl Drop for PooledProcess {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        warn!(
            id = self.id,
            name = %self.name,
            "PooledProcess dropped without being run or discarded; \
             removing container on a background thread"
        );

        let args = remove_args(&self.runtime_path, &self.name);
        let name = self.name.clone();

        std::thread::spawn(move || {
            if let Some((program, rest)) = args.split_first() {
                match std::process::Command::new(program).args(rest).output() {
                    Ok(output) if output.status.success() => {
                        debug!(name = %name, "best-effort removal succeeded");
                    }
                    Ok(output) => {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        warn!(name = %name, stderr = %stderr, "best-effort removal failed");
                    }
                    Err(e) => {
                        warn!(name = %name, error = %e, "best-effort removal failed to spawn");
                    }
                }
            }
        });
    }
}

/// Whether an exit came from the runtime rather than the sandboxed program
///
/// Programs can exit with 125 themselves, so the status alone is not enough:
/// the container must also have printed nothing and the runtime's own error
/// must lead stderr.
fn is_runtime_failure(code: Option<i32>, stdout: &str, stderr: &str) -> bool {
    code == Some(RUNTIME_FAILURE_EXIT_CODE)
        && stdout.is_empty()
        && stderr
            .trim_start()
            .lines()
            .next()
            .is_some_and(|line| RUNTIME_ERROR_PREFIXES.iter().any(|p| line.starts_with(p)))
}

fn remove_args(runtime_path: &Path, name: &str) -> Vec<String> {
    SandboxCommand::new(runtime_path, name)
        .action(SandboxAction::Remove)
        .build()
}

/// Write the whole program, then close stdin
///
/// A program may exit before reading everything; that is not an error here.
async fn write_program(mut stdin: ChildStdin, program: &[u8]) -> std::io::Result<()> {
    match stdin.write_all(program).await {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
        result => result?,
    }
    match stdin.shutdown().await {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

/// Drain a stream, keeping at most `cap` bytes
///
/// Reading continues past the cap so the writer never blocks on a full pipe.
async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut truncated = false;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(buf.len());
        if n > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }

    Ok((buf, truncated))
}
