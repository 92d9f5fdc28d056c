//! Text output for human-readable display
//!
//! This module provides:
//! - `==> package` / `<== package` section markers
//! - Colored level prefixes for warnings and errors
//! - The Markdown summary, printed as-is

use crate::domain::{DiagnosticEvent, Level, RunSummary};
use crate::output::{render_markdown_summary, Reporter, Verbosity};
use colored::Colorize;
use std::io::Write;
use std::sync::Mutex;

/// Text reporter for terminals and plain logs
pub struct TextReporter<W: Write + Send> {
    state: Mutex<TextState<W>>,
    verbosity: Verbosity,
    color: bool,
}

struct TextState<W> {
    out: W,
    /// Names of the open sections, innermost last
    groups: Vec<String>,
}

impl<W: Write + Send> TextReporter<W> {
    /// Create a new text reporter
    pub fn new(out: W, verbosity: Verbosity, color: bool) -> Self {
        Self {
            state: Mutex::new(TextState {
                out,
                groups: Vec::new(),
            }),
            verbosity,
            color,
        }
    }

    /// Consumes the reporter, returning the writer
    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .out
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TextState<W>) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Format the prefix shown before a message at `level`
    fn prefix(&self, level: Level) -> String {
        let label = match level {
            Level::Info => return String::new(),
            Level::Debug => "debug:",
            Level::Verbose => "verbose:",
            Level::Warning => "warning:",
            Level::Error => "error:",
        };

        if !self.color {
            return format!("{} ", label);
        }
        let painted = match level {
            Level::Warning => label.yellow().bold(),
            Level::Error => label.red().bold(),
            _ => label.dimmed(),
        };
        format!("{} ", painted)
    }
}

impl<W: Write + Send> Reporter for TextReporter<W> {
    fn start_group(&self, name: &str) {
        let header = if self.color {
            format!("{} {}", "==>".cyan().bold(), name.bold())
        } else {
            format!("==> {}", name)
        };
        self.with_state(|state| {
            let _ = writeln!(state.out, "{}", header);
            state.groups.push(name.to_string());
        });
    }

    fn end_group(&self) {
        let color = self.color;
        self.with_state(|state| {
            let name = state.groups.pop().unwrap_or_default();
            let marker = format!("<== {}", name);
            if color {
                let _ = writeln!(state.out, "{}", marker.dimmed());
            } else {
                let _ = writeln!(state.out, "{}", marker);
            }
            let _ = state.out.flush();
        });
    }

    fn event(&self, event: &DiagnosticEvent) {
        if !self.verbosity.shows(event.level) {
            return;
        }

        let prefix = self.prefix(event.level);
        let dim = self.color && event.level.is_detail();

        self.with_state(|state| {
            let indent = if state.groups.is_empty() { "" } else { "  " };
            for line in event.message.lines() {
                let _ = if dim {
                    writeln!(state.out, "{}{}{}", indent, prefix, line.dimmed())
                } else {
                    writeln!(state.out, "{}{}{}", indent, prefix, line)
                };
            }
        });
    }

    fn write_summary(&self, summary: &RunSummary) -> std::io::Result<()> {
        let markdown = render_markdown_summary(summary);
        let color = self.color;
        self.with_state(|state| {
            writeln!(state.out)?;
            for name in &summary.untagged {
                if color {
                    writeln!(
                        state.out,
                        "{} {} was published but not tagged",
                        "warning:".yellow().bold(),
                        name
                    )?;
                } else {
                    writeln!(state.out, "warning: {} was published but not tagged", name)?;
                }
            }
            state.out.write_all(markdown.as_bytes())?;
            state.out.flush()
        })
    }
}
