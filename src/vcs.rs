//! Version control integration
//!
//! This module provides:
//! - Staging a package directory after its update was published
//! - An annotated tag per published update (`{name}-{version}`)
//! - The single commit that records every tagged update of a run
//!
//! Publishing and tagging are not transactional: a package whose tag fails
//! stays published, and the caller reports it as untagged.

use crate::output::Reporter;
use crate::process::{run_logged, ProcessInvocation, ProcessRunner};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

const STAGE_TIMEOUT: Duration = Duration::from_secs(30);
const TAG_TIMEOUT: Duration = Duration::from_secs(10);
const COMMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default first line prefix of the run commit
pub const DEFAULT_COMMIT_PREFIX: &str = "AU-dotnet";

// Characters git refuses anywhere in a ref name
static FORBIDDEN_REF_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x20\x7f~^:?*\[\\]|\.\.|@\{|//").unwrap());

/// What to do when a tag with the same name already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagPolicy {
    /// Leave the existing tag alone; the package ends untagged
    #[default]
    FailIfExists,
    /// Move the existing tag to the new update
    Force,
}

impl fmt::Display for TagPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagPolicy::FailIfExists => write!(f, "fail-if-exists"),
            TagPolicy::Force => write!(f, "force"),
        }
    }
}

/// Returns true if `tag` is a name git accepts for a tag
pub fn is_valid_tag_name(tag: &str) -> bool {
    !tag.is_empty()
        && tag != "@"
        && !tag.starts_with('-')
        && !tag.starts_with('.')
        && !tag.starts_with('/')
        && !tag.ends_with('.')
        && !tag.ends_with('/')
        && !tag.ends_with(".lock")
        && !tag.contains("/.")
        && !FORBIDDEN_REF_CHARS.is_match(tag)
}

/// Builds the run commit message
pub fn commit_message(prefix: &str, count: usize) -> String {
    format!("{}: {} updated\n[skip ci]", prefix, count)
}

/// Settings for the version control steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsSettings {
    /// VCS client executable
    pub program: String,
    pub tag_policy: TagPolicy,
    pub commit_prefix: String,
}

impl Default for VcsSettings {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            tag_policy: TagPolicy::default(),
            commit_prefix: DEFAULT_COMMIT_PREFIX.to_string(),
        }
    }
}

/// Git client driven through a process runner
pub struct Vcs {
    runner: Arc<dyn ProcessRunner>,
    settings: VcsSettings,
}

impl Vcs {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: VcsSettings) -> Self {
        Self { runner, settings }
    }

    /// Stages every change in the package directory. Failures are warnings.
    pub async fn stage(&self, dir: &Path, package: &str, reporter: &dyn Reporter) -> bool {
        let invocation = ProcessInvocation::new(&self.settings.program, dir)
            .args(["add", "."])
            .timeout(STAGE_TIMEOUT)
            .errors_as_warnings(true);
        run_logged(self.runner.as_ref(), reporter, package, &invocation).await
    }

    /// Creates an annotated tag. Invalid names fail without calling git.
    pub async fn tag(&self, dir: &Path, tag: &str, package: &str, reporter: &dyn Reporter) -> bool {
        if !is_valid_tag_name(tag) {
            reporter.error(package, &format!("'{}' is not a valid tag name", tag));
            return false;
        }

        let mut invocation = ProcessInvocation::new(&self.settings.program, dir).arg("tag");
        if self.settings.tag_policy == TagPolicy::Force {
            invocation = invocation.arg("-f");
        }
        let invocation = invocation
            .args(["-a", tag, "-m", tag])
            .timeout(TAG_TIMEOUT);

        let tagged = run_logged(self.runner.as_ref(), reporter, package, &invocation).await;
        if tagged {
            reporter.info(package, &format!("Tagged {}", tag));
        }
        tagged
    }

    /// Commits everything staged during the run. Failures are warnings.
    pub async fn commit(&self, root: &Path, count: usize, reporter: &dyn Reporter) -> bool {
        let invocation = ProcessInvocation::new(&self.settings.program, root)
            .args(["commit", "-m"])
            .arg(commit_message(&self.settings.commit_prefix, count))
            .timeout(COMMIT_TIMEOUT)
            .errors_as_warnings(true);
        run_logged(self.runner.as_ref(), reporter, "", &invocation).await
    }
}
