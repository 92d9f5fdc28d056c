//! Progress display while the packages root is scanned
//!
//! Provides visual feedback using indicatif. The spinner is always cleared
//! before the first package group opens so it never interleaves with the
//! per-package log.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Spinner shown on stderr during discovery
pub struct Progress {
    /// Whether progress display is enabled (console output on a terminal only)
    enabled: bool,
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }

    /// Shows the discovery spinner for `root`
    pub fn discovering(&mut self, root: &Path) {
        if !self.enabled {
            return;
        }

        let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .map(|style| style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(format!("Discovering packages in {}...", root.display()));
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.bar = Some(spinner);
    }

    /// Clears the spinner once the package list is known
    pub fn found(&mut self, count: usize) {
        if let Some(bar) = self.bar.take() {
            bar.set_message(format!("Found {} package(s)", count));
            bar.finish_and_clear();
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(false)
    }
}
