//! Core domain models for autoupdate
//!
//! This module contains the fundamental types used throughout the application:
//! - Package directories and artifact lookup
//! - Diagnostic events relayed from update procedures
//! - Update outcomes and terminal package states
//! - The run summary accumulator

mod diagnostic;
mod outcome;
mod package;
mod summary;

pub use diagnostic::{DiagnosticEvent, Level};
pub use outcome::{IgnoreReason, OutcomeStatus, PackageState, UpdateOutcome, UpdatedPackage};
pub use package::{is_artifact, list_artifacts, PackageDirectory, ARTIFACT_EXTENSION};
pub use summary::{PackageReport, RunSummary, RunSummaryRow};
