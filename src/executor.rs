//! Command execution with live output and a hard timeout.
//!
//! The final candidate runs through a non-interactive shell. Its stdout and
//! stderr are relayed line by line as they arrive while the executor waits on
//! the process and a timer concurrently. Whichever finishes first wins:
//!
//! - **Process exits**: the real exit code is returned.
//! - **Timer fires**: the process and everything it started are killed, the
//!   shell is reaped, a timeout message is written to the error stream, and
//!   exit code 1 is returned.
//!
//! Ordering is preserved within each stream but not between them.

use crate::activity_log::ActivityLog;
use crate::error::ExecutionError;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Wall-clock limit for the executed command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit code reported for a command killed by the timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 1;

/// How long relays may keep draining after the process has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Result of running a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub timed_out: bool,
}

/// Destination for relayed output lines.
pub trait OutputSink: Send + Sync + 'static {
    fn stdout_line(&self, line: &str);
    fn stderr_line(&self, line: &str);
}

/// Relays to this process's own stdout and stderr.
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn stdout_line(&self, line: &str) {
        println!("{}", line);
    }

    fn stderr_line(&self, line: &str) {
        eprintln!("{}", line);
    }
}

/// Program and leading arguments used to run a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellInvocation {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// `pwsh -NoProfile -NonInteractive -Command <command>`.
    pub fn powershell() -> Self {
        Self::new("pwsh", &["-NoProfile", "-NonInteractive", "-Command"])
    }
}

impl Default for ShellInvocation {
    fn default() -> Self {
        Self::powershell()
    }
}

/// Anything that can run the winning candidate.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, candidate: &str) -> Result<ExecutionOutcome, ExecutionError>;
}

/// Runs commands through a shell with streaming output and a timeout.
///
/// # Example
///
/// ```ignore
/// let executor = CommandExecutor::new(ActivityLog::disabled());
/// let outcome = executor.execute("Write-Output hello").await?;
/// assert_eq!(outcome.exit_code, 0);
/// ```
pub struct CommandExecutor {
    shell: ShellInvocation,
    timeout: Duration,
    sink: Arc<dyn OutputSink>,
    log: ActivityLog,
}

impl CommandExecutor {
    pub fn new(log: ActivityLog) -> Self {
        Self {
            shell: ShellInvocation::powershell(),
            timeout: DEFAULT_TIMEOUT,
            sink: Arc::new(ConsoleSink),
            log,
        }
    }

    pub fn with_shell(mut self, shell: ShellInvocation) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

enum Stream {
    Stdout,
    Stderr,
}

fn relay<R>(reader: R, sink: Arc<dyn OutputSink>, stream: Stream) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']);
                    match stream {
                        Stream::Stdout => sink.stdout_line(line),
                        Stream::Stderr => sink.stderr_line(line),
                    }
                }
            }
        }
    })
}

/// Lets a relay finish what is buffered, then gives up on it.
async fn drain(task: Option<JoinHandle<()>>) {
    if let Some(mut task) = task {
        if tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err() {
            task.abort();
        }
    }
}

/// Kills the child and every process in its group.
#[cfg(unix)]
async fn kill_process_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("Killing process group {} failed: {}", pid, e);
        }
    }
    if let Err(e) = child.start_kill() {
        debug!("Kill after timeout failed: {}", e);
    }
}

/// Kills the child and its descendants with `taskkill /T`.
#[cfg(not(unix))]
async fn kill_process_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        let pid = pid.to_string();
        let killed = Command::new("taskkill")
            .args(["/T", "/F", "/PID", pid.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = killed {
            debug!("taskkill for {} failed: {}", pid, e);
        }
    }
    if let Err(e) = child.start_kill() {
        debug!("Kill after timeout failed: {}", e);
    }
}

#[async_trait]
impl CommandRunner for CommandExecutor {
    async fn execute(&self, candidate: &str) -> Result<ExecutionOutcome, ExecutionError> {
        info!("Executing command: {}", candidate);
        self.log.record(&format!("execute: {}", candidate));

        let mut command = Command::new(&self.shell.program);
        command
            .args(&self.shell.args)
            .arg(candidate)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The shell leads a fresh group so a timeout reaches everything it started.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
            program: self.shell.program.clone(),
            source,
        })?;

        let stdout_task = child
            .stdout
            .take()
            .map(|out| relay(out, self.sink.clone(), Stream::Stdout));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| relay(err, self.sink.clone(), Stream::Stderr));

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(self.timeout) => None,
        };

        match finished {
            Some(status) => {
                drain(stdout_task).await;
                drain(stderr_task).await;

                let status = status.map_err(ExecutionError::Abnormal)?;
                // No code means the process was killed by a signal.
                let exit_code = status.code().unwrap_or(1);
                debug!("Command exited with {}", exit_code);
                self.log.record(&format!("exit code: {}", exit_code));
                Ok(ExecutionOutcome {
                    exit_code,
                    timed_out: false,
                })
            }
            None => {
                kill_process_tree(&mut child).await;
                if let Err(e) = child.wait().await {
                    debug!("Reaping after timeout failed: {}", e);
                }
                for task in [stdout_task, stderr_task].into_iter().flatten() {
                    task.abort();
                }

                let message = format!(
                    "Command timed out after {} seconds and was terminated.",
                    self.timeout.as_secs()
                );
                warn!("{}", message);
                self.sink.stderr_line(&message);
                self.log.record(&message);
                Ok(ExecutionOutcome {
                    exit_code: TIMEOUT_EXIT_CODE,
                    timed_out: true,
                })
            }
        }
    }
}
