//! JSON output of the run summary for machine processing
//!
//! Live events are delegated to an inner reporter (normally text on stderr)
//! so stdout carries nothing but the JSON document.

use crate::domain::{DiagnosticEvent, PackageState, RunSummary};
use crate::output::Reporter;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

/// JSON reporter wrapping a live-output reporter
pub struct JsonReporter<R: Reporter, W: Write + Send> {
    live: R,
    out: Mutex<W>,
}

impl<R: Reporter, W: Write + Send> JsonReporter<R, W> {
    pub fn new(live: R, out: W) -> Self {
        Self {
            live,
            out: Mutex::new(out),
        }
    }

    /// Consumes the reporter, returning the inner reporter and the JSON writer
    pub fn into_parts(self) -> (R, W) {
        (self.live, self.out.into_inner().unwrap_or_else(|e| e.into_inner()))
    }
}

/// JSON representation of the full result
#[derive(Serialize)]
struct JsonOutput<'a> {
    dry_run: bool,
    cancelled: bool,
    started_at: String,
    summary: JsonSummary,
    packages: Vec<JsonPackage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    untagged: Vec<&'a str>,
}

/// JSON representation of summary statistics
#[derive(Serialize)]
struct JsonSummary {
    updated: usize,
    processed: usize,
    failed: usize,
}

/// JSON representation of one package
#[derive(Serialize)]
struct JsonPackage<'a> {
    name: &'a str,
    state: PackageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
}

fn to_json(summary: &RunSummary) -> JsonOutput<'_> {
    let packages = summary
        .packages
        .iter()
        .map(|p| JsonPackage {
            name: &p.name,
            state: p.state,
            tag: summary
                .rows
                .iter()
                .find(|row| row.package_name == p.name && p.state == PackageState::Tagged)
                .map(|row| row.tag_name.as_str()),
        })
        .collect();

    JsonOutput {
        dry_run: summary.dry_run,
        cancelled: summary.cancelled,
        started_at: summary.started_at.to_rfc3339(),
        summary: JsonSummary {
            updated: summary.updated_count,
            processed: summary.packages_processed(),
            failed: summary
                .packages
                .iter()
                .filter(|p| p.state.is_failure())
                .count(),
        },
        packages,
        untagged: summary.untagged.iter().map(String::as_str).collect(),
    }
}

impl<R: Reporter, W: Write + Send> Reporter for JsonReporter<R, W> {
    fn start_group(&self, name: &str) {
        self.live.start_group(name);
    }

    fn end_group(&self) {
        self.live.end_group();
    }

    fn event(&self, event: &DiagnosticEvent) {
        self.live.event(event);
    }

    fn write_summary(&self, summary: &RunSummary) -> std::io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        serde_json::to_writer_pretty(&mut *out, &to_json(summary))?;
        writeln!(out)?;
        out.flush()
    }
}
