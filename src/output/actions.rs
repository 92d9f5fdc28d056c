//! GitHub Actions output
//!
//! Live events become workflow commands (`::group::`, `::debug::`,
//! `::warning ::`, `::error ::`) on stdout; plain info lines that look like
//! commands are prefixed so the runner does not execute them. The summary is
//! written as Markdown to the job summary file, overwriting it, or to stdout
//! when no summary file is available or it cannot be written.

use crate::domain::{DiagnosticEvent, Level, RunSummary};
use crate::output::{render_markdown_summary, Reporter, Verbosity};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Reporter for GitHub Actions runners
pub struct ActionsReporter<W: Write + Send> {
    out: Mutex<W>,
    verbosity: Verbosity,
    summary_path: Option<PathBuf>,
}

impl<W: Write + Send> ActionsReporter<W> {
    pub fn new(out: W, verbosity: Verbosity, summary_path: Option<PathBuf>) -> Self {
        Self {
            out: Mutex::new(out),
            verbosity,
            summary_path,
        }
    }

    /// Consumes the reporter, returning the live output writer
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

/// Escapes a message for use as workflow command data
pub fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Keeps a plain log line from being parsed as a workflow command
/// (`::add-mask::`, `::stop-commands::`, legacy `##[...]`)
fn neutralize_commands(line: &str) -> String {
    let trimmed = line.trim_start();
    if trimmed.starts_with("::") || trimmed.starts_with("##[") {
        format!("> {}", line)
    } else {
        line.to_string()
    }
}

impl<W: Write + Send> Reporter for ActionsReporter<W> {
    fn start_group(&self, name: &str) {
        self.write_line(&format!("::group::{}", escape_data(name)));
    }

    fn end_group(&self) {
        self.write_line("::endgroup::");
    }

    fn event(&self, event: &DiagnosticEvent) {
        if self.verbosity == Verbosity::Quiet && event.level < Level::Warning {
            return;
        }

        match event.level {
            // The runner hides ::debug:: unless step debug logging is on
            Level::Debug | Level::Verbose => {
                self.write_line(&format!("::debug::{}", escape_data(&event.message)))
            }
            Level::Info => {
                for line in event.message.lines() {
                    self.write_line(&neutralize_commands(line));
                }
            }
            Level::Warning => {
                self.write_line(&format!("::warning ::{}", escape_data(&event.message)))
            }
            Level::Error => self.write_line(&format!("::error ::{}", escape_data(&event.message))),
        }
    }

    fn write_summary(&self, summary: &RunSummary) -> std::io::Result<()> {
        for name in &summary.untagged {
            self.write_line(&format!(
                "::warning ::{}",
                escape_data(&format!("{} was published but not tagged", name))
            ));
        }

        let markdown = render_markdown_summary(summary);
        let written = match &self.summary_path {
            Some(path) => match std::fs::write(path, &markdown) {
                Ok(()) => true,
                Err(e) => {
                    self.write_line(&format!(
                        "::warning ::{}",
                        escape_data(&format!(
                            "Cannot write job summary to {}: {}",
                            path.display(),
                            e
                        ))
                    ));
                    false
                }
            },
            None => false,
        };

        if !written {
            let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
            out.write_all(markdown.as_bytes())?;
            out.flush()?;
        }

        self.write_line(&summary.headline());
        Ok(())
    }
}
