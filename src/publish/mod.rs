//! Artifact publishing
//!
//! This module provides:
//! - `Publisher`, which pushes every artifact of an updated package to the feed
//! - Dry-run mode when no API key is configured
//! - Withholding of foreign packages (maintained here, owned elsewhere on the feed)
//! - Malware scan submission of produced artifacts (`scan`)

mod scan;

pub use scan::{ScanSettings, ScanSubmitter, DEFAULT_SCAN_MAX_SIZE};

use crate::domain::UpdatedPackage;
use crate::output::Reporter;
use crate::process::{run_logged, ProcessInvocation, ProcessRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default community feed push endpoint
pub const DEFAULT_FEED_URL: &str = "https://push.chocolatey.org/";

/// Default limit for a single push
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Result of publishing one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every artifact was accepted by the feed
    Published,
    /// No credential; the push was only logged
    DryRun,
    /// Foreign package; nothing was pushed
    Withheld,
    /// An artifact was rejected; later artifacts were not attempted
    Failed { artifact: PathBuf, reason: String },
}

/// Settings for the publish step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    /// Publisher executable
    pub program: String,
    pub feed_url: String,
    /// Feed credential; `None` means dry run
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Packages that are never pushed
    pub foreign_packages: Vec<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            program: "choco".to_string(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
            foreign_packages: Vec::new(),
        }
    }
}

impl PublishSettings {
    /// Returns true if pushes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.api_key.as_deref().map_or(true, str::is_empty)
    }

    /// Returns true if the package is maintained here but owned by someone else on the feed
    pub fn is_foreign(&self, name: &str) -> bool {
        self.foreign_packages
            .iter()
            .any(|p| p.eq_ignore_ascii_case(name))
    }
}

/// Pushes artifacts to the feed
pub struct Publisher {
    runner: Arc<dyn ProcessRunner>,
    settings: PublishSettings,
}

impl Publisher {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: PublishSettings) -> Self {
        Self { runner, settings }
    }

    /// Builds the push command for one artifact
    pub fn push_invocation(&self, artifact: &Path, api_key: &str) -> ProcessInvocation {
        let working_dir = artifact.parent().unwrap_or_else(|| Path::new("."));
        ProcessInvocation::new(&self.settings.program, working_dir)
            .arg("push")
            .arg(artifact.display().to_string())
            .args(["--api-key", api_key])
            .args(["--source", self.settings.feed_url.as_str()])
            .arg("--verbose")
            .timeout(self.settings.timeout)
            .errors_as_warnings(false)
            .masking(api_key)
    }

    /// Publishes every artifact of the package, stopping at the first failure
    pub async fn publish(&self, package: &UpdatedPackage, reporter: &dyn Reporter) -> PublishOutcome {
        if self.settings.is_foreign(&package.name) {
            reporter.warning(
                &package.name,
                &format!("{} is a foreign package; publishing withheld", package.name),
            );
            return PublishOutcome::Withheld;
        }

        let api_key = match self.settings.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => {
                for artifact in &package.artifacts {
                    reporter.info(
                        &package.name,
                        &format!("[whatif] {} push {}", self.settings.program, artifact.display()),
                    );
                }
                return PublishOutcome::DryRun;
            }
        };

        for artifact in &package.artifacts {
            let invocation = self.push_invocation(artifact, api_key);
            if !run_logged(self.runner.as_ref(), reporter, &package.name, &invocation).await {
                let reason = format!("failed to push {}", artifact.display());
                reporter.error(&package.name, &reason);
                return PublishOutcome::Failed {
                    artifact: artifact.clone(),
                    reason,
                };
            }
            reporter.info(&package.name, &format!("Pushed {}", artifact.display()));
        }

        PublishOutcome::Published
    }
}
