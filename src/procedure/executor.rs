//! Update procedure execution
//!
//! Each procedure runs in its own host process with the package directory as
//! working directory, so nothing a procedure does to its session (handlers,
//! variables, environment) survives into the next package.
//!
//! The host speaks a JSON-lines protocol on stdout, one message per line:
//!
//! ```text
//! {"kind":"info","message":"..."}        debug | verbose | info | warning | error
//! {"kind":"output","value":{...}}        one per returned value
//! {"kind":"exception","message":"..."}   terminating failure
//! ```
//!
//! Anything on stdout that is not a protocol message is relayed as info.
//! Anything on stderr is relayed as an error and marks the run as errored.

use crate::domain::{DiagnosticEvent, Level, PackageDirectory};
use crate::output::Reporter;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

const BOOTSTRAP: &str = include_str!("bootstrap.ps1");

/// How long stderr may stay open once stdout has closed
const STDERR_GRACE: Duration = Duration::from_secs(2);

/// Default limit for a single update procedure
pub const DEFAULT_PROCEDURE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Raw result of running one update procedure
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawProcedureOutput {
    /// Values returned by the procedure, in order; the first is authoritative
    pub values: Vec<Value>,
    /// Whether the procedure wrote to its error stream
    pub had_errors: bool,
    /// Terminating failure, if the procedure raised
    pub exception: Option<String>,
}

impl RawProcedureOutput {
    /// Output of a procedure that returned a single value
    pub fn returning(value: Value) -> Self {
        Self {
            values: vec![value],
            ..Self::default()
        }
    }

    /// Output of a procedure that raised
    pub fn raised(message: impl Into<String>) -> Self {
        Self {
            exception: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Executes a package's update procedure
#[async_trait]
pub trait ProcedureExecutor: Send + Sync {
    /// Runs the procedure of `package`, relaying diagnostics to `reporter` as
    /// they arrive. Failures are folded into the returned output, never
    /// propagated, so one package cannot abort the run.
    async fn execute(&self, package: &PackageDirectory, reporter: &dyn Reporter)
        -> RawProcedureOutput;
}

/// How a procedure file is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureHost {
    /// PowerShell with the embedded bootstrap translating streams to the protocol
    PowerShell { program: String },
    /// Any program speaking the protocol itself; the procedure path is appended
    Command { program: String, args: Vec<String> },
}

impl Default for ProcedureHost {
    fn default() -> Self {
        ProcedureHost::PowerShell {
            program: "pwsh".to_string(),
        }
    }
}

impl ProcedureHost {
    /// Builds the program and argument list that runs `procedure`
    pub fn command_line(&self, procedure: &Path) -> (String, Vec<String>) {
        match self {
            ProcedureHost::PowerShell { program } => {
                let path = procedure.display().to_string().replace('\'', "''");
                let script = format!("& {{\n{}\n}} -Procedure '{}'", BOOTSTRAP, path);
                let args = [
                    "-NoLogo",
                    "-NoProfile",
                    "-NonInteractive",
                    "-ExecutionPolicy",
                    "RemoteSigned",
                    "-Command",
                ]
                .iter()
                .map(|s| s.to_string())
                .chain(std::iter::once(script))
                .collect();
                (program.clone(), args)
            }
            ProcedureHost::Command { program, args } => {
                let mut args = args.clone();
                args.push(procedure.display().to_string());
                (program.clone(), args)
            }
        }
    }
}

/// One line of the host protocol
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ProtocolMessage {
    Debug { message: Option<String> },
    Verbose { message: Option<String> },
    Info { message: Option<String> },
    Warning { message: Option<String> },
    Error { message: Option<String> },
    Output {
        #[serde(default)]
        value: Value,
    },
    Exception { message: Option<String> },
}

/// Executor that launches procedure files through a host program
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    host: ProcedureHost,
    timeout: Duration,
}

impl ScriptExecutor {
    pub fn new(host: ProcedureHost, timeout: Duration) -> Self {
        Self { host, timeout }
    }
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self::new(ProcedureHost::default(), DEFAULT_PROCEDURE_TIMEOUT)
    }
}

/// Accumulates protocol messages into a `RawProcedureOutput`
struct ProtocolReader<'a> {
    package: &'a str,
    reporter: &'a dyn Reporter,
    output: RawProcedureOutput,
}

impl<'a> ProtocolReader<'a> {
    fn new(package: &'a str, reporter: &'a dyn Reporter) -> Self {
        Self {
            package,
            reporter,
            output: RawProcedureOutput::default(),
        }
    }

    fn relay(&mut self, level: Level, message: Option<String>) {
        if level == Level::Error {
            self.output.had_errors = true;
        }
        self.reporter.event(&DiagnosticEvent::new(
            level,
            self.package,
            message.unwrap_or_default(),
        ));
    }

    fn line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        match serde_json::from_str::<ProtocolMessage>(trimmed) {
            Ok(ProtocolMessage::Debug { message }) => self.relay(Level::Debug, message),
            Ok(ProtocolMessage::Verbose { message }) => self.relay(Level::Verbose, message),
            Ok(ProtocolMessage::Info { message }) => self.relay(Level::Info, message),
            Ok(ProtocolMessage::Warning { message }) => self.relay(Level::Warning, message),
            Ok(ProtocolMessage::Error { message }) => self.relay(Level::Error, message),
            Ok(ProtocolMessage::Output { value }) => self.output.values.push(value),
            Ok(ProtocolMessage::Exception { message }) => {
                let message = message.unwrap_or_else(|| "update procedure failed".to_string());
                self.reporter.error(self.package, &message);
                self.output.exception = Some(message);
            }
            Err(_) => self.reporter.info(self.package, line.trim_end()),
        }
    }

    fn stderr_line(&mut self, line: &str) {
        if !line.trim().is_empty() {
            self.relay(Level::Error, Some(line.trim_end().to_string()));
        }
    }

    fn exception(&mut self, message: String) {
        self.reporter.error(self.package, &message);
        if self.output.exception.is_none() {
            self.output.exception = Some(message);
        }
    }

    fn finish(self) -> RawProcedureOutput {
        if self.output.values.len() > 1 {
            self.reporter.warning(
                self.package,
                &format!(
                    "Multiple objects returned ({}); using the first",
                    self.output.values.len()
                ),
            );
        }
        self.output
    }
}

#[async_trait]
impl ProcedureExecutor for ScriptExecutor {
    async fn execute(
        &self,
        package: &PackageDirectory,
        reporter: &dyn Reporter,
    ) -> RawProcedureOutput {
        let mut reader = ProtocolReader::new(&package.name, reporter);

        let Some(procedure) = &package.procedure else {
            reader.exception(format!("{} has no update procedure", package.name));
            return reader.finish();
        };

        let (program, args) = self.host.command_line(procedure);
        debug!(package = %package.name, %program, "running update procedure");

        let spawned = Command::new(&program)
            .args(&args)
            .current_dir(&package.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                reader.exception(format!("failed to start '{}': {}", program, e));
                return reader.finish();
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            reader.exception("procedure host streams were not captured".to_string());
            return reader.finish();
        };

        let deadline = Instant::now() + self.timeout;
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let (mut stdout_open, mut stderr_open) = (true, true);
        let mut stderr_deadline = deadline;
        let mut timed_out = false;

        // Both streams are read here so events keep their arrival order
        while stdout_open || stderr_open {
            let wake = if stdout_open { deadline } else { stderr_deadline };
            tokio::select! {
                line = stdout_lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => reader.line(&line),
                    Ok(None) => {
                        stdout_open = false;
                        stderr_deadline = deadline.min(Instant::now() + STDERR_GRACE);
                    }
                    Err(e) => {
                        reader.exception(format!("failed reading procedure output: {}", e));
                        stdout_open = false;
                        stderr_deadline = deadline.min(Instant::now() + STDERR_GRACE);
                    }
                },
                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => reader.stderr_line(&line),
                    _ => stderr_open = false,
                },
                _ = tokio::time::sleep_until(wake) => {
                    timed_out = stdout_open;
                    break;
                }
            }
        }

        let status = if timed_out {
            None
        } else {
            match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(Ok(status)) => Some(status),
                Ok(Err(e)) => {
                    reader.exception(format!("failed waiting for procedure host: {}", e));
                    return reader.finish();
                }
                Err(_) => {
                    timed_out = true;
                    None
                }
            }
        };

        if timed_out {
            warn!(package = %package.name, "update procedure timed out");
            let _ = child.kill().await;
            reader.exception(format!(
                "update procedure timed out after {}s",
                self.timeout.as_secs()
            ));
        }

        if let Some(status) = status {
            if !status.success() && reader.output.exception.is_none() {
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                reader.exception(format!("procedure host exited with code {}", code));
            }
        }

        reader.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingReporter;
    use serde_json::json;
    use std::path::PathBuf;

    fn feed(lines: &[&str]) -> (RawProcedureOutput, RecordingReporter) {
        let reporter = RecordingReporter::new();
        let mut reader = ProtocolReader::new("beta", &reporter);
        for line in lines {
            reader.line(line);
        }
        let output = reader.finish();
        (output, reporter)
    }

    #[test]
    fn test_protocol_levels_relayed_in_order() {
        let (output, reporter) = feed(&[
            r#"{"kind":"debug","message":"d"}"#,
            r#"{"kind":"verbose","message":"v"}"#,
            r#"{"kind":"info","message":"i"}"#,
            r#"{"kind":"warning","message":"w"}"#,
        ]);

        let events = reporter.events();
        let levels: Vec<Level> = events.iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![Level::Debug, Level::Verbose, Level::Info, Level::Warning]
        );
        assert!(events.iter().all(|e| e.package == "beta"));
        assert!(!output.had_errors);
        assert!(output.values.is_empty());
    }

    #[test]
    fn test_protocol_error_marks_had_errors() {
        let (output, reporter) = feed(&[r#"{"kind":"error","message":"Cannot find path"}"#]);
        assert!(output.had_errors);
        assert_eq!(reporter.messages(Level::Error), vec!["Cannot find path"]);
    }

    #[test]
    fn test_protocol_output_values() {
        let (output, _) = feed(&[
            r#"{"kind":"output","value":{"Name":"beta","RemoteVersion":"2.1.0"}}"#,
        ]);
        assert_eq!(
            output.values,
            vec![json!({"Name":"beta","RemoteVersion":"2.1.0"})]
        );
    }

    #[test]
    fn test_multiple_values_warn() {
        let (output, reporter) = feed(&[
            r#"{"kind":"output","value":"first"}"#,
            r#"{"kind":"output","value":"second"}"#,
        ]);
        assert_eq!(output.values.len(), 2);
        let warnings = reporter.messages(Level::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Multiple objects returned"));
        assert!(reporter.messages(Level::Error).is_empty());
    }

    #[test]
    fn test_exception_recorded() {
        let (output, reporter) = feed(&[r#"{"kind":"exception","message":"boom"}"#]);
        assert_eq!(output.exception.as_deref(), Some("boom"));
        assert_eq!(reporter.messages(Level::Error), vec!["boom"]);
    }

    #[test]
    fn test_null_message_tolerated() {
        let (_, reporter) = feed(&[r#"{"kind":"info","message":null}"#]);
        assert_eq!(reporter.messages(Level::Info), vec![""]);
    }

    #[test]
    fn test_plain_lines_are_info() {
        let (output, reporter) = feed(&["Checking upstream...", "", "{not json"]);
        assert_eq!(
            reporter.messages(Level::Info),
            vec!["Checking upstream...", "{not json"]
        );
        assert!(output.values.is_empty());
    }

    #[test]
    fn test_powershell_command_line() {
        let host = ProcedureHost::default();
        let (program, args) = host.command_line(Path::new("/repo/it's/update.ps1"));
        assert_eq!(program, "pwsh");
        assert_eq!(args[0], "-NoLogo");
        assert!(args.contains(&"-NonInteractive".to_string()));
        let script = args.last().unwrap();
        assert!(script.contains("$ErrorView = 'DetailedView'"));
        assert!(script.ends_with("-Procedure '/repo/it''s/update.ps1'"));
    }

    #[test]
    fn test_command_host_appends_procedure() {
        let host = ProcedureHost::Command {
            program: "sh".to_string(),
            args: vec!["-e".to_string()],
        };
        let (program, args) = host.command_line(Path::new("update.sh"));
        assert_eq!(program, "sh");
        assert_eq!(args, vec!["-e".to_string(), "update.sh".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_procedure_is_exception() {
        let executor = ScriptExecutor::default();
        let reporter = RecordingReporter::new();
        let package = PackageDirectory {
            path: PathBuf::from("/repo/alpha"),
            name: "alpha".to_string(),
            procedure: None,
        };

        let output = executor.execute(&package, &reporter).await;
        assert!(output.exception.unwrap().contains("no update procedure"));
    }

    #[cfg(unix)]
    mod host {
        use super::*;
        use std::fs;

        fn sh_executor(timeout: Duration) -> ScriptExecutor {
            ScriptExecutor::new(
                ProcedureHost::Command {
                    program: "sh".to_string(),
                    args: Vec::new(),
                },
                timeout,
            )
        }

        fn package_with(script: &str) -> (tempfile::TempDir, PackageDirectory) {
            let dir = tempfile::tempdir().unwrap();
            let pkg_dir = dir.path().join("beta");
            fs::create_dir(&pkg_dir).unwrap();
            fs::write(pkg_dir.join("update.sh"), script).unwrap();
            let package = PackageDirectory::inspect(&pkg_dir, "update.sh");
            (dir, package)
        }

        #[tokio::test]
        async fn test_runs_in_package_directory() {
            let (_dir, package) = package_with(
                r#"touch produced.marker
echo '{"kind":"info","message":"hello"}'
echo '{"kind":"output","value":{"Name":"beta"}}'
"#,
            );
            let reporter = RecordingReporter::new();
            let output = sh_executor(Duration::from_secs(30))
                .execute(&package, &reporter)
                .await;

            assert!(package.path.join("produced.marker").exists());
            assert_eq!(output.values, vec![json!({"Name":"beta"})]);
            assert!(output.exception.is_none());
            assert!(!output.had_errors);
            assert_eq!(reporter.messages(Level::Info), vec!["hello"]);
        }

        #[tokio::test]
        async fn test_stderr_marks_errors() {
            let (_dir, package) = package_with("echo 'something broke' >&2\n");
            let reporter = RecordingReporter::new();
            let output = sh_executor(Duration::from_secs(30))
                .execute(&package, &reporter)
                .await;

            assert!(output.had_errors);
            assert!(reporter.contains("something broke"));
        }

        #[tokio::test]
        async fn test_stderr_relayed_in_arrival_order() {
            let (_dir, package) = package_with(
                r#"echo '{"kind":"info","message":"first"}'
sleep 0.3
echo 'second' >&2
sleep 0.3
echo '{"kind":"info","message":"third"}'
echo '{"kind":"output","value":"a"}'
echo '{"kind":"output","value":"b"}'
"#,
            );
            let reporter = RecordingReporter::new();
            let output = sh_executor(Duration::from_secs(30))
                .execute(&package, &reporter)
                .await;

            let messages: Vec<String> = reporter.events().into_iter().map(|e| e.message).collect();
            assert_eq!(
                messages,
                vec![
                    "first".to_string(),
                    "second".to_string(),
                    "third".to_string(),
                    "Multiple objects returned (2); using the first".to_string(),
                ]
            );
            assert_eq!(reporter.messages(Level::Error), vec!["second"]);
            assert!(output.had_errors);
        }

        #[tokio::test]
        async fn test_stderr_held_open_after_stdout_closes() {
            let (_dir, package) = package_with(
                "echo '{\"kind\":\"output\",\"value\":\"Ignore\"}'\nexec 1>&-\nsleep 1\necho 'late' >&2\n",
            );
            let reporter = RecordingReporter::new();
            let output = sh_executor(Duration::from_secs(30))
                .execute(&package, &reporter)
                .await;

            assert!(output.exception.is_none());
            assert_eq!(output.values, vec![json!("Ignore")]);
            assert_eq!(reporter.messages(Level::Error), vec!["late"]);
        }

        #[tokio::test]
        async fn test_nonzero_exit_is_exception() {
            let (_dir, package) = package_with("exit 4\n");
            let reporter = RecordingReporter::new();
            let output = sh_executor(Duration::from_secs(30))
                .execute(&package, &reporter)
                .await;

            assert!(output.exception.unwrap().contains("exited with code 4"));
        }

        #[tokio::test]
        async fn test_timeout_is_exception() {
            let (_dir, package) = package_with("echo '{\"kind\":\"info\",\"message\":\"started\"}'\nexec sleep 10\n");
            let reporter = RecordingReporter::new();
            let output = sh_executor(Duration::from_millis(500))
                .execute(&package, &reporter)
                .await;

            assert!(output.exception.unwrap().contains("timed out"));
            assert!(reporter.contains("started"));
        }

        #[tokio::test]
        async fn test_missing_host_is_exception() {
            let (_dir, package) = package_with("");
            let executor = ScriptExecutor::new(
                ProcedureHost::PowerShell {
                    program: "definitely-not-a-real-shell-xyz".to_string(),
                },
                Duration::from_secs(5),
            );
            let reporter = RecordingReporter::new();
            let output = executor.execute(&package, &reporter).await;

            assert!(output.exception.unwrap().contains("failed to start"));
        }
    }
}
