//! Run orchestrator coordinating the entire update workflow
//!
//! This module provides:
//! - Workflow coordination: discover → execute → interpret → publish → tag → scan
//! - One aggregate commit after the last package
//! - Cooperative cancellation between packages
//! - Error handling with partial continuation: one package failing never
//!   stops the others

use crate::config::Settings;
use crate::discovery::discover_packages;
use crate::domain::{
    IgnoreReason, PackageDirectory, PackageState, RunSummary, UpdateOutcome, UpdatedPackage,
};
use crate::error::DiscoveryError;
use crate::output::Reporter;
use crate::procedure::{
    describe_properties, flatten_streams, interpret, streams_of, ProcedureExecutor, ScriptExecutor,
};
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::progress::Progress;
use crate::publish::{PublishOutcome, Publisher, ScanSubmitter};
use crate::vcs::Vcs;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Exit code when a run finished but some packages failed
pub const EXIT_PARTIAL: u8 = 2;

/// Exit code when a run was interrupted
pub const EXIT_CANCELLED: u8 = 130;

/// Shared flag requesting the run to stop before the next package
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrator for coordinating a run
pub struct Orchestrator {
    settings: Settings,
    executor: Arc<dyn ProcedureExecutor>,
    publisher: Publisher,
    vcs: Vcs,
    scanner: ScanSubmitter,
    reporter: Arc<dyn Reporter>,
    cancellation: CancellationFlag,
    show_progress: bool,
}

/// Result of running the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorResult {
    pub summary: RunSummary,
    /// Whether the aggregate commit was made and succeeded
    pub committed: bool,
}

impl OrchestratorResult {
    /// Process exit code for this run
    pub fn exit_code(&self) -> u8 {
        if self.summary.cancelled {
            EXIT_CANCELLED
        } else if self.summary.has_failures() {
            // Partial success - some packages failed
            EXIT_PARTIAL
        } else {
            0
        }
    }
}

/// How processing of one package ended
enum PackageRun {
    Finished {
        name: String,
        state: PackageState,
        tag: Option<String>,
    },
    Cancelled,
}

impl PackageRun {
    fn finished(name: impl Into<String>, state: PackageState) -> Self {
        PackageRun::Finished {
            name: name.into(),
            state,
            tag: None,
        }
    }
}

impl Orchestrator {
    /// Create an orchestrator running real commands
    pub fn new(
        settings: Settings,
        reporter: Arc<dyn Reporter>,
        cancellation: CancellationFlag,
    ) -> Self {
        let executor = Arc::new(ScriptExecutor::new(
            settings.procedure_host.clone(),
            settings.procedure_timeout,
        ));
        Self::with_components(
            settings,
            Arc::new(SystemProcessRunner::new()),
            executor,
            reporter,
            cancellation,
        )
    }

    /// Create an orchestrator with custom process runner and executor (for testing)
    pub fn with_components(
        settings: Settings,
        runner: Arc<dyn ProcessRunner>,
        executor: Arc<dyn ProcedureExecutor>,
        reporter: Arc<dyn Reporter>,
        cancellation: CancellationFlag,
    ) -> Self {
        Self {
            publisher: Publisher::new(runner.clone(), settings.publish.clone()),
            vcs: Vcs::new(runner.clone(), settings.vcs.clone()),
            scanner: ScanSubmitter::new(runner, settings.scan.clone()),
            settings,
            executor,
            reporter,
            cancellation,
            show_progress: false,
        }
    }

    /// Show a spinner while the packages root is scanned
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run every eligible package, commit, and write the summary.
    ///
    /// Only an unreadable packages root is an error; everything that goes
    /// wrong inside a package is recorded in the summary instead.
    pub async fn run(&self) -> Result<OrchestratorResult, DiscoveryError> {
        let root = &self.settings.packages_root;

        let mut progress = Progress::new(self.show_progress);
        progress.discovering(root);
        let discovered = discover_packages(root, &self.settings.procedure_file);
        progress.found(discovered.as_ref().map(Vec::len).unwrap_or(0));

        let packages: Vec<PackageDirectory> = discovered?
            .into_iter()
            .filter(|p| self.settings.filter.should_process_package(&p.name))
            .collect();

        let mut summary = RunSummary::new(self.settings.is_dry_run());
        self.reporter.info(
            "",
            &format!(
                "{} package(s) to process in {} ({}, tag policy {})",
                packages.len(),
                root.display(),
                if summary.dry_run { "dry run" } else { "publishing" },
                self.settings.vcs.tag_policy
            ),
        );

        for package in &packages {
            if self.cancellation.is_cancelled() {
                self.reporter.warning("", "Cancellation requested");
                summary.cancelled = true;
                break;
            }

            summary = self.process_package(package, summary).await;
            if summary.cancelled {
                break;
            }
        }

        let mut committed = false;
        if summary.has_updates() && !summary.cancelled {
            committed = self
                .vcs
                .commit(root, summary.updated_count, self.reporter.as_ref())
                .await;
        } else {
            debug!(
                updated = summary.updated_count,
                cancelled = summary.cancelled,
                "skipping commit"
            );
        }

        if let Err(e) = self.reporter.write_summary(&summary) {
            error!(error = %e, "failed to write run summary");
        }

        Ok(OrchestratorResult { summary, committed })
    }

    /// Processes one package inside its own output group and folds the
    /// result into the summary
    pub async fn process_package(
        &self,
        package: &PackageDirectory,
        mut summary: RunSummary,
    ) -> RunSummary {
        self.reporter.start_group(&package.name);

        match self.update_package(package).await {
            PackageRun::Finished { name, state, tag } => match (state, tag) {
                (PackageState::Tagged, Some(tag)) => summary.record_tagged(name, tag),
                (PackageState::TagFailed, _) => summary.record_untagged(name),
                (state, _) => summary.record(name, state),
            },
            PackageRun::Cancelled => summary.cancelled = true,
        }

        self.reporter.end_group();
        summary
    }

    async fn update_package(&self, package: &PackageDirectory) -> PackageRun {
        let reporter = self.reporter.as_ref();
        let name = package.name.as_str();

        if self.settings.skip_existing_artifacts && !package.existing_artifacts().is_empty() {
            let outcome = UpdateOutcome::ignored(name, IgnoreReason::ExistingArtifact);
            self.report_outcome(&outcome);
            return PackageRun::finished(name, PackageState::Ignored);
        }

        let raw = self.executor.execute(package, reporter).await;

        if self.cancellation.is_cancelled() {
            reporter.warning(name, "Cancellation requested");
            return PackageRun::Cancelled;
        }

        if let Some(Value::Object(properties)) = raw.values.first() {
            for line in describe_properties(properties) {
                reporter.info(name, &line);
            }
            if let Some(streams) = streams_of(properties) {
                for line in flatten_streams(streams) {
                    reporter.info(name, &line);
                }
            }
        }

        match interpret(package, raw) {
            UpdateOutcome::Updated(updated) => self.publish_and_tag(package, updated).await,
            outcome => {
                self.report_outcome(&outcome);
                let state = outcome.terminal_state().unwrap_or(PackageState::NoChange);
                PackageRun::finished(outcome.package_name(), state)
            }
        }
    }

    async fn publish_and_tag(
        &self,
        package: &PackageDirectory,
        updated: UpdatedPackage,
    ) -> PackageRun {
        let reporter = self.reporter.as_ref();
        let name = updated.name.as_str();

        reporter.info(
            name,
            &format!(
                "{} updated {} -> {} ({} package file(s))",
                name,
                updated.nuspec_version.as_deref().unwrap_or("?"),
                updated.remote_version,
                updated.artifacts.len()
            ),
        );

        let tag = updated.tag_name();
        let state = match self.publisher.publish(&updated, reporter).await {
            PublishOutcome::Withheld => PackageState::Withheld,
            PublishOutcome::Failed { reason, .. } => {
                reporter.warning(name, &format!("Not tagging {}: {}", name, reason));
                PackageState::PublishFailed
            }
            PublishOutcome::Published | PublishOutcome::DryRun => {
                if !self.vcs.stage(&package.path, name, reporter).await {
                    reporter.warning(name, "Staging failed; tagging anyway");
                }
                if self.vcs.tag(&package.path, &tag, name, reporter).await {
                    PackageState::Tagged
                } else {
                    reporter.warning(name, &format!("{} was published but not tagged", name));
                    PackageState::TagFailed
                }
            }
        };

        self.scanner.submit(name, &updated.artifacts, reporter).await;

        PackageRun::Finished {
            name: updated.name.clone(),
            state,
            tag: Some(tag),
        }
    }

    fn report_outcome(&self, outcome: &UpdateOutcome) {
        let name = outcome.package_name();
        match outcome {
            UpdateOutcome::Ignored { reason, .. } => {
                self.reporter.info(name, &format!("Ignored: {}", reason))
            }
            UpdateOutcome::NoChange { .. } => self.reporter.info(name, "No update available"),
            UpdateOutcome::ProcedureError { message, .. } => self
                .reporter
                .warning(name, &format!("Skipping {}: {}", name, message)),
            UpdateOutcome::Updated(_) => {}
        }
    }
}
