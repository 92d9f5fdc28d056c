//! Timeout-bounded execution of external commands
//!
//! This module provides:
//! - `ProcessInvocation` / `ProcessResult` value types
//! - The `ProcessRunner` trait used by the publisher, VCS and scan steps
//! - `SystemProcessRunner`, which drains stdout and stderr concurrently so a
//!   child filling one pipe can never block on it while we read the other
//! - `log_process_result`, which relays captured output to a reporter

use crate::error::ProcessError;
use crate::output::Reporter;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Default timeout for an invocation that does not set one
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for the stderr drain after the child has exited or been killed
const STREAM_GRACE: Duration = Duration::from_secs(2);

/// A single external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Report stderr output and timeouts as warnings instead of errors
    pub errors_as_warnings: bool,
    pub timeout: Duration,
    /// Value masked as `***` when the command line is displayed
    pub secret: Option<String>,
}

impl ProcessInvocation {
    /// Creates an invocation with no arguments and the default timeout
    pub fn new(program: impl Into<String>, working_dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.as_ref().to_path_buf(),
            errors_as_warnings: false,
            timeout: DEFAULT_TIMEOUT,
            secret: None,
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

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn errors_as_warnings(mut self, errors_as_warnings: bool) -> Self {
        self.errors_as_warnings = errors_as_warnings;
        self
    }

    /// Marks a value (typically a credential) to be masked in display output
    pub fn masking(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secret = Some(secret);
        }
        self
    }

    /// Returns the command line for logging, with the secret masked
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            match &self.secret {
                Some(secret) if arg.contains(secret.as_str()) => {
                    line.push_str(&arg.replace(secret.as_str(), "***"))
                }
                _ => line.push_str(arg),
            }
        }
        line
    }
}

/// Captured result of a finished (or timed out) command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessResult {
    /// Exit code; `None` when the process was killed or ended by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessResult {
    /// Creates a completed result
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// Creates a timed out result carrying the partial output
    pub fn timed_out(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: true,
        }
    }

    /// Returns true if the command exited with code zero within its timeout
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs the command to completion or until its timeout expires.
    ///
    /// A timeout is not an error: the result has `timed_out` set and carries
    /// whatever output was captured. Errors are reserved for commands that
    /// could not be started or waited on.
    async fn run(&self, invocation: &ProcessInvocation) -> Result<ProcessResult, ProcessError>;
}

/// Process runner that executes real commands
#[derive(Debug, Default, Clone)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, invocation: &ProcessInvocation) -> Result<ProcessResult, ProcessError> {
        let program = invocation.program.as_str();
        debug!(
            command = %invocation.display_line(),
            dir = %invocation.working_dir.display(),
            "starting process"
        );

        let mut child = Command::new(program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::spawn(program, e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::io(program, std::io::Error::other("stdout not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessError::io(program, std::io::Error::other("stderr not piped")))?;

        // stderr is drained in the background before stdout is touched
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let mut stderr_task = tokio::spawn(drain(stderr, Arc::clone(&stderr_buf)));

        let mut stdout_buf = Vec::new();
        let completion = tokio::time::timeout(invocation.timeout, async {
            read_into(&mut stdout, &mut stdout_buf).await?;
            child.wait().await
        })
        .await;

        let (exit_code, timed_out) = match completion {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => return Err(ProcessError::wait(program, e)),
            Err(_) => {
                warn!(
                    command = %invocation.display_line(),
                    timeout_secs = invocation.timeout.as_secs(),
                    "process timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!(program, error = %e, "failed to kill timed out process");
                }
                (None, true)
            }
        };

        // a grandchild may hold stderr open; keep what was read and stop waiting
        if tokio::time::timeout(STREAM_GRACE, &mut stderr_task).await.is_err() {
            stderr_task.abort();
        }
        let stderr_buf = std::mem::take(&mut *stderr_buf.lock().unwrap_or_else(|e| e.into_inner()));

        debug!(program, ?exit_code, timed_out, "process finished");

        Ok(ProcessResult {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
            timed_out,
        })
    }
}

/// Reads `reader` to EOF, keeping everything read so far in `buf` if cancelled
async fn read_into<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Reads `reader` to EOF into a shared buffer that stays readable if the
/// task is aborted midway
async fn drain<R: AsyncRead + Unpin>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 8192];
    while let Ok(n) = reader.read(&mut chunk).await {
        if n == 0 {
            break;
        }
        sink.lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(&chunk[..n]);
    }
}

/// Relays a command's captured output to the reporter.
///
/// stdout goes out at debug level. stderr and timeouts go out as warnings
/// when the invocation asked for `errors_as_warnings`, as errors otherwise.
pub fn log_process_result(
    reporter: &dyn Reporter,
    package: &str,
    invocation: &ProcessInvocation,
    result: &ProcessResult,
) {
    let escalate = |message: &str| {
        if invocation.errors_as_warnings {
            reporter.warning(package, message);
        } else {
            reporter.error(package, message);
        }
    };

    let stdout = result.stdout.trim_end();
    if !stdout.is_empty() {
        reporter.debug(package, stdout);
    }

    if result.timed_out {
        escalate(&format!(
            "'{}' timed out after {}s",
            invocation.display_line(),
            invocation.timeout.as_secs()
        ));
    }

    let stderr = result.stderr.trim_end();
    if !stderr.is_empty() {
        escalate(stderr);
    } else if !result.timed_out && !result.succeeded() {
        escalate(&format!(
            "'{}' exited with code {}",
            invocation.display_line(),
            result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        ));
    }
}

/// Runs an invocation and relays its output, returning whether it succeeded
pub async fn run_logged(
    runner: &dyn ProcessRunner,
    reporter: &dyn Reporter,
    package: &str,
    invocation: &ProcessInvocation,
) -> bool {
    reporter.debug(package, &invocation.display_line());
    match runner.run(invocation).await {
        Ok(result) => {
            log_process_result(reporter, package, invocation, &result);
            result.succeeded()
        }
        Err(e) => {
            let message = e.to_string();
            if invocation.errors_as_warnings {
                reporter.warning(package, &message);
            } else {
                reporter.error(package, &message);
            }
            false
        }
    }
}
