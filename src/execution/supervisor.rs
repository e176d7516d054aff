//! Command supervisor - runs one shell command line under timeout control
//!
//! stdout and stderr are drained by two background tasks into one shared
//! buffer. Each read signals activity, which pushes the idle deadline back.
//! The wait loop races process exit, the idle deadline, the total deadline
//! and cancellation.

use crate::core::Shell;
use crate::execution::process;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exit code recorded for a command killed by a timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// How long leftover background processes may keep the output open
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// How long to wait for the output readers after the process group is gone
const IO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// A fully interpolated command line and its limits
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command_line: String,
    pub shell: Shell,
    pub timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

/// Outcome of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Combined stdout and stderr
    pub output: String,

    /// Real exit code, 124 when killed by a timeout, 1 when the process
    /// could not be started or waited on
    pub exit_code: i32,

    pub timed_out: bool,

    /// Why the command did not exit on its own
    pub error: Option<String>,
}

impl CommandResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn exited(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            output: output.into(),
            exit_code,
            ..Default::default()
        }
    }

    pub fn timed_out(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_code: TIMEOUT_EXIT_CODE,
            timed_out: true,
            error: Some("command timed out".to_string()),
        }
    }

    pub fn failed(&self) -> bool {
        self.exit_code != 0
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion or forced termination
    async fn run(&self, request: &CommandRequest, cancel: &CancellationToken) -> CommandResult;
}

/// Output sink shared by the stdout and stderr readers
#[derive(Clone, Default)]
struct OutputSink {
    buffer: Arc<Mutex<Vec<u8>>>,
    activity: Arc<Notify>,
}

impl OutputSink {
    fn write(&self, bytes: &[u8]) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.extend_from_slice(bytes);
        }
        self.activity.notify_one();
    }

    fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|buffer| String::from_utf8_lossy(&buffer).into_owned())
            .unwrap_or_default()
    }
}

fn drain<R>(mut reader: R, sink: OutputSink) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.write(&chunk[..n]),
                Err(e) => {
                    debug!(error = %e, "output reader stopped");
                    break;
                }
            }
        }
    })
}

/// Wait for the readers to hit EOF, dropping each handle once it finishes.
///
/// Safe to cancel and call again: unfinished handles stay in `readers`.
async fn join_readers(readers: &mut Vec<JoinHandle<()>>) {
    while let Some(reader) = readers.last_mut() {
        let _ = reader.await;
        readers.pop();
    }
}

/// Sleep until `deadline`, or forever when there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn terminate_on_timeout(
    child: &mut Child,
    command_line: &str,
    kind: &str,
    limit: Duration,
) -> CommandResult {
    warn!(command = %command_line, ?limit, kind, "command timed out, killing process tree");
    process::kill_tree(child).await;
    let _ = child.wait().await;
    CommandResult {
        exit_code: TIMEOUT_EXIT_CODE,
        timed_out: true,
        error: Some(format!("{} of {:?} exceeded", kind, limit)),
        ..Default::default()
    }
}

enum ExitReason {
    Exited(ExitStatus),
    WaitError(std::io::Error),
    IdleTimeout(Duration),
    Timeout(Duration),
    Cancelled,
}

/// Runs commands through the configured shell
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellSupervisor;

impl ShellSupervisor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ShellSupervisor {
    async fn run(&self, request: &CommandRequest, cancel: &CancellationToken) -> CommandResult {
        let (program, args) = request.shell.invocation();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(&request.command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process::isolate(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(shell = %request.shell, error = %e, "failed to start command");
                return CommandResult {
                    exit_code: 1,
                    error: Some(format!("failed to start {}: {}", program, e)),
                    ..Default::default()
                };
            }
        };
        let pid = child.id();
        debug!(pid = ?pid, command = %request.command_line, "command started");

        let sink = OutputSink::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(drain(stdout, sink.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(drain(stderr, sink.clone()));
        }

        let started = Instant::now();
        let deadline = request.timeout.map(|t| started + t);
        let mut idle_deadline = request.idle_timeout.map(|t| started + t);

        let reason = loop {
            tokio::select! {
                status = child.wait() => {
                    break match status {
                        Ok(status) => ExitReason::Exited(status),
                        Err(e) => ExitReason::WaitError(e),
                    };
                }
                _ = sink.activity.notified() => {
                    idle_deadline = request.idle_timeout.map(|t| Instant::now() + t);
                }
                _ = sleep_until(idle_deadline) => {
                    break ExitReason::IdleTimeout(request.idle_timeout.unwrap_or_default());
                }
                _ = sleep_until(deadline) => {
                    break ExitReason::Timeout(request.timeout.unwrap_or_default());
                }
                _ = cancel.cancelled() => break ExitReason::Cancelled,
            }
        };

        let mut result = match reason {
            ExitReason::Exited(status) => CommandResult {
                exit_code: status.code().unwrap_or(1),
                ..Default::default()
            },
            ExitReason::WaitError(e) => {
                warn!(error = %e, "failed to wait for command");
                CommandResult {
                    exit_code: 1,
                    error: Some(format!("failed to wait for command: {}", e)),
                    ..Default::default()
                }
            }
            ExitReason::IdleTimeout(limit) => {
                terminate_on_timeout(&mut child, &request.command_line, "idle_timeout", limit).await
            }
            ExitReason::Timeout(limit) => {
                terminate_on_timeout(&mut child, &request.command_line, "timeout", limit).await
            }
            ExitReason::Cancelled => {
                debug!(command = %request.command_line, "command cancelled, killing process tree");
                process::kill_tree(&mut child).await;
                let _ = child.wait().await;
                CommandResult {
                    exit_code: 1,
                    error: Some("cancelled".to_string()),
                    ..Default::default()
                }
            }
        };

        // Background processes may still hold the pipes after the shell exits
        if tokio::time::timeout(DRAIN_GRACE, join_readers(&mut readers))
            .await
            .is_err()
        {
            debug!(
                command = %request.command_line,
                "output still open after exit, killing leftover processes"
            );
            if let Some(pid) = pid {
                process::kill_group(pid).await;
            }
            if tokio::time::timeout(IO_CAPTURE_TIMEOUT, join_readers(&mut readers))
                .await
                .is_err()
            {
                warn!("output still open after killing the process group, dropping the rest");
                for reader in &readers {
                    reader.abort();
                }
            }
        }

        result.output = sink.contents();
        debug!(
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            elapsed = ?started.elapsed(),
            "command finished"
        );
        result
    }
}
