//! Per-package outcome types
//!
//! `UpdateOutcome` is what the interpreter makes of an update procedure's
//! return value. `PackageState` is the terminal state a package reaches once
//! publishing and tagging have been attempted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Reason why a package was ignored without publishing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The procedure returned the "Ignore" sentinel
    Sentinel,
    /// Skip-existing mode found an artifact before the procedure ran
    ExistingArtifact,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Sentinel => write!(f, "procedure returned Ignore"),
            IgnoreReason::ExistingArtifact => write!(f, "existing package archive"),
        }
    }
}

/// Flat classification of an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Ignored,
    NoChange,
    Updated,
    ProcedureError,
}

/// A package whose procedure produced at least one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedPackage {
    /// Package name reported by the procedure
    pub name: String,
    /// Upstream version; names the tag
    pub remote_version: String,
    /// Version found in the package's nuspec before the update
    pub nuspec_version: Option<String>,
    /// Produced artifact paths, in the order the procedure listed them
    pub artifacts: Vec<PathBuf>,
    /// Every other property of the returned object, in original order
    pub properties: Map<String, Value>,
}

impl UpdatedPackage {
    /// Name of the tag recording this update
    pub fn tag_name(&self) -> String {
        format!("{}-{}", self.name, self.remote_version)
    }
}

/// Classified result of one update procedure run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Nothing to do by request of the procedure or the run configuration
    Ignored { package: String, reason: IgnoreReason },
    /// The procedure ran but produced no artifact
    NoChange { package: String },
    /// The procedure produced one or more artifacts
    Updated(UpdatedPackage),
    /// The procedure raised or reported errors
    ProcedureError { package: String, message: String },
}

impl UpdateOutcome {
    pub fn ignored(package: impl Into<String>, reason: IgnoreReason) -> Self {
        UpdateOutcome::Ignored {
            package: package.into(),
            reason,
        }
    }

    pub fn no_change(package: impl Into<String>) -> Self {
        UpdateOutcome::NoChange {
            package: package.into(),
        }
    }

    pub fn procedure_error(package: impl Into<String>, message: impl Into<String>) -> Self {
        UpdateOutcome::ProcedureError {
            package: package.into(),
            message: message.into(),
        }
    }

    /// Returns the flat status
    pub fn status(&self) -> OutcomeStatus {
        match self {
            UpdateOutcome::Ignored { .. } => OutcomeStatus::Ignored,
            UpdateOutcome::NoChange { .. } => OutcomeStatus::NoChange,
            UpdateOutcome::Updated(_) => OutcomeStatus::Updated,
            UpdateOutcome::ProcedureError { .. } => OutcomeStatus::ProcedureError,
        }
    }

    /// Returns the package name
    pub fn package_name(&self) -> &str {
        match self {
            UpdateOutcome::Ignored { package, .. }
            | UpdateOutcome::NoChange { package }
            | UpdateOutcome::ProcedureError { package, .. } => package,
            UpdateOutcome::Updated(updated) => &updated.name,
        }
    }

    /// Returns the terminal state for outcomes that end processing
    pub fn terminal_state(&self) -> Option<PackageState> {
        match self {
            UpdateOutcome::Ignored { .. } => Some(PackageState::Ignored),
            UpdateOutcome::NoChange { .. } => Some(PackageState::NoChange),
            UpdateOutcome::ProcedureError { .. } => Some(PackageState::ProcedureError),
            UpdateOutcome::Updated(_) => None,
        }
    }
}

/// Terminal state of a package within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    Ignored,
    NoChange,
    ProcedureError,
    PublishFailed,
    /// Foreign package: publishing withheld
    Withheld,
    TagFailed,
    Tagged,
}

impl PackageState {
    /// Returns true for states that count against the run's exit status
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PackageState::ProcedureError | PackageState::PublishFailed | PackageState::TagFailed
        )
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PackageState::Ignored => "ignored",
            PackageState::NoChange => "no change",
            PackageState::ProcedureError => "procedure error",
            PackageState::PublishFailed => "publish failed",
            PackageState::Withheld => "withheld",
            PackageState::TagFailed => "tag failed",
            PackageState::Tagged => "tagged",
        };
        write!(f, "{}", label)
    }
}
