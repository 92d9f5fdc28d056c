//! Run summary types
//!
//! Provides the accumulator threaded through the run loop and consumed by the
//! reporters at the end of the run.

use super::PackageState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tagged package in the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummaryRow {
    pub package_name: String,
    pub tag_name: String,
}

/// Terminal state of one processed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReport {
    pub name: String,
    pub state: PackageState,
}

/// Overall result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of tagged packages; always equals `rows.len()`
    pub updated_count: usize,
    /// Tagged packages, in processing order
    pub rows: Vec<RunSummaryRow>,
    /// Every package that reached a terminal state
    pub packages: Vec<PackageReport>,
    /// Packages published to the feed without a matching tag
    pub untagged: Vec<String>,
    /// Whether the loop stopped early on cancellation
    pub cancelled: bool,
    /// Whether publishing ran in dry-run mode
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
}

impl RunSummary {
    /// Creates an empty summary
    pub fn new(dry_run: bool) -> Self {
        Self {
            updated_count: 0,
            rows: Vec::new(),
            packages: Vec::new(),
            untagged: Vec::new(),
            cancelled: false,
            dry_run,
            started_at: Utc::now(),
        }
    }

    /// Records a package's terminal state
    pub fn record(&mut self, name: impl Into<String>, state: PackageState) {
        self.packages.push(PackageReport {
            name: name.into(),
            state,
        });
    }

    /// Records a successfully tagged package
    pub fn record_tagged(&mut self, name: impl Into<String>, tag_name: impl Into<String>) {
        let name = name.into();
        self.rows.push(RunSummaryRow {
            package_name: name.clone(),
            tag_name: tag_name.into(),
        });
        self.updated_count = self.rows.len();
        self.record(name, PackageState::Tagged);
    }

    /// Records a package that was published but whose tag could not be created
    pub fn record_untagged(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.untagged.push(name.clone());
        self.record(name, PackageState::TagFailed);
    }

    /// Returns true if any package reached the Tagged state
    pub fn has_updates(&self) -> bool {
        self.updated_count > 0
    }

    /// Returns the number of processed packages
    pub fn packages_processed(&self) -> usize {
        self.packages.len()
    }

    /// Returns the number of packages in the given state
    pub fn count(&self, state: PackageState) -> usize {
        self.packages.iter().filter(|p| p.state == state).count()
    }

    /// Returns true if any package ended in a failure state
    pub fn has_failures(&self) -> bool {
        self.packages.iter().any(|p| p.state.is_failure())
    }

    /// Human-readable line stating how many packages were updated
    pub fn headline(&self) -> String {
        match self.updated_count {
            0 => "No packages were updated".to_string(),
            1 => "1 package was updated:".to_string(),
            n => format!("{} packages were updated:", n),
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_new() {
        let summary = RunSummary::new(true);
        assert_eq!(summary.updated_count, 0);
        assert!(summary.rows.is_empty());
        assert!(summary.dry_run);
        assert!(!summary.cancelled);
        assert!(!summary.has_updates());
    }

    #[test]
    fn test_record_tagged_keeps_count_in_sync() {
        let mut summary = RunSummary::default();
        summary.record_tagged("beta", "beta-2.1.0");
        summary.record_tagged("delta", "delta-1.0");

        assert_eq!(summary.updated_count, 2);
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.rows[0].tag_name, "beta-2.1.0");
        assert_eq!(summary.count(PackageState::Tagged), 2);
        assert!(summary.has_updates());
    }

    #[test]
    fn test_record_untagged_is_not_counted() {
        let mut summary = RunSummary::default();
        summary.record_untagged("epsilon");

        assert_eq!(summary.updated_count, 0);
        assert_eq!(summary.untagged, vec!["epsilon".to_string()]);
        assert_eq!(summary.count(PackageState::TagFailed), 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_record_other_states() {
        let mut summary = RunSummary::default();
        summary.record("alpha", PackageState::NoChange);
        summary.record("gamma", PackageState::ProcedureError);

        assert_eq!(summary.packages_processed(), 2);
        assert_eq!(summary.updated_count, 0);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_headline() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.headline(), "No packages were updated");

        summary.record_tagged("beta", "beta-2.1.0");
        assert_eq!(summary.headline(), "1 package was updated:");

        summary.record_tagged("delta", "delta-1.0");
        assert_eq!(summary.headline(), "2 packages were updated:");
    }

    #[test]
    fn test_serde_run_summary() {
        let mut summary = RunSummary::new(true);
        summary.record_tagged("beta", "beta-2.1.0");

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"dry_run\":true"));
        assert!(json.contains("\"updated_count\":1"));
        let parsed: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}
