//! Run reporting
//!
//! This module provides:
//! - The `Reporter` trait: grouped per-package sections, leveled diagnostic
//!   events relayed live, and the end-of-run summary
//! - GitHub Actions output (workflow commands + job summary)
//! - Text output for human-readable display
//! - JSON output of the run summary for machine processing

mod actions;
mod json;
mod markdown;
mod recording;
mod text;

pub use actions::{escape_data, ActionsReporter};
pub use json::JsonReporter;
pub use markdown::render_markdown_summary;
pub use recording::{Record, RecordingReporter};
pub use text::TextReporter;

use crate::domain::{DiagnosticEvent, Level, RunSummary};
use std::path::PathBuf;
use std::sync::Arc;

/// Where live output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// GitHub Actions workflow commands
    Actions,
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings, errors and the summary only
    Quiet,
    /// Normal output
    #[default]
    Normal,
    /// Includes debug and verbose diagnostics
    Verbose,
}

impl Verbosity {
    /// Returns true if an event at `level` should be written
    pub fn shows(&self, level: Level) -> bool {
        match self {
            Verbosity::Quiet => level >= Level::Warning,
            Verbosity::Normal => !level.is_detail(),
            Verbosity::Verbose => true,
        }
    }
}

/// Configuration for reporting
#[derive(Debug, Clone, Default)]
pub struct ReporterConfig {
    pub format: ReportFormat,
    pub verbosity: Verbosity,
    /// Write the summary as JSON on stdout; live output moves to stderr
    pub json: bool,
    /// Whether to use colors in text output
    pub color: bool,
    /// Job summary file (GitHub Actions `GITHUB_STEP_SUMMARY`)
    pub summary_path: Option<PathBuf>,
}

/// Sink for everything a run reports.
///
/// Methods take `&self` so one reporter can be shared between the run loop
/// and the tasks it spawns. Failures writing live output are swallowed;
/// only `write_summary` reports them.
pub trait Reporter: Send + Sync {
    /// Opens a collapsible section for one package
    fn start_group(&self, name: &str);

    /// Closes the current section
    fn end_group(&self);

    /// Relays a single diagnostic event
    fn event(&self, event: &DiagnosticEvent);

    /// Writes the end-of-run summary
    fn write_summary(&self, summary: &RunSummary) -> std::io::Result<()>;

    fn log(&self, level: Level, package: &str, message: &str) {
        self.event(&DiagnosticEvent::new(level, package, message));
    }

    fn debug(&self, package: &str, message: &str) {
        self.log(Level::Debug, package, message);
    }

    fn info(&self, package: &str, message: &str) {
        self.log(Level::Info, package, message);
    }

    fn warning(&self, package: &str, message: &str) {
        self.log(Level::Warning, package, message);
    }

    fn error(&self, package: &str, message: &str) {
        self.log(Level::Error, package, message);
    }
}

/// Create a reporter based on configuration
pub fn create_reporter(config: ReporterConfig) -> Arc<dyn Reporter> {
    if config.json {
        let live = TextReporter::new(std::io::stderr(), config.verbosity, config.color);
        return Arc::new(JsonReporter::new(live, std::io::stdout()));
    }

    match config.format {
        ReportFormat::Actions => Arc::new(ActionsReporter::new(
            std::io::stdout(),
            config.verbosity,
            config.summary_path,
        )),
        ReportFormat::Text => Arc::new(TextReporter::new(
            std::io::stdout(),
            config.verbosity,
            config.color,
        )),
    }
}
