//! Malware scan submission
//!
//! Every artifact an update produced is submitted to the scanning service
//! once. Scanning never changes a package's state: every problem is a warning.

use crate::output::Reporter;
use crate::process::{run_logged, ProcessInvocation, ProcessRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Largest file the scanning service accepts (650 MiB)
pub const DEFAULT_SCAN_MAX_SIZE: u64 = 650 * 1024 * 1024;

const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Settings for the scan step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    /// Scanner executable
    pub program: String,
    /// Scanning service credential; `None` disables submission
    pub api_key: Option<String>,
    pub max_size_bytes: u64,
    pub min_size_bytes: u64,
    pub timeout: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            program: "vt".to_string(),
            api_key: None,
            max_size_bytes: DEFAULT_SCAN_MAX_SIZE,
            min_size_bytes: 0,
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

/// Submits artifacts to the malware scanning service
pub struct ScanSubmitter {
    runner: Arc<dyn ProcessRunner>,
    settings: ScanSettings,
}

impl ScanSubmitter {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: ScanSettings) -> Self {
        Self { runner, settings }
    }

    /// Builds the scan command for one file
    pub fn scan_invocation(&self, path: &Path, api_key: &str) -> ProcessInvocation {
        let working_dir = path.parent().unwrap_or_else(|| Path::new("."));
        ProcessInvocation::new(&self.settings.program, working_dir)
            .args(["scan", "file"])
            .arg(path.display().to_string())
            .args(["--apikey", api_key])
            .timeout(self.settings.timeout)
            .errors_as_warnings(true)
            .masking(api_key)
    }

    /// Submits each distinct artifact still on disk.
    ///
    /// Returns the number of files actually submitted.
    pub async fn submit(&self, package: &str, artifacts: &[PathBuf], reporter: &dyn Reporter) -> usize {
        let mut seen: Vec<&PathBuf> = Vec::new();
        let mut submitted = 0;

        for path in artifacts {
            if seen.contains(&path) {
                continue;
            }
            seen.push(path);

            let Ok(metadata) = std::fs::metadata(path) else {
                reporter.debug(package, &format!("{} no longer exists; not scanned", path.display()));
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let api_key = match self.settings.api_key.as_deref() {
                Some(key) if !key.is_empty() => key,
                _ => {
                    reporter.warning(
                        package,
                        &format!("No scan API key configured; {} not scanned", path.display()),
                    );
                    continue;
                }
            };

            let size = metadata.len();
            if size > self.settings.max_size_bytes {
                reporter.warning(
                    package,
                    &format!(
                        "{} is {} bytes, over the scan limit of {} bytes; not scanned",
                        path.display(),
                        size,
                        self.settings.max_size_bytes
                    ),
                );
                continue;
            }
            if size < self.settings.min_size_bytes {
                reporter.debug(
                    package,
                    &format!("{} is below the scan minimum size; not scanned", path.display()),
                );
                continue;
            }

            let invocation = self.scan_invocation(path, api_key);
            if run_logged(self.runner.as_ref(), reporter, package, &invocation).await {
                reporter.info(package, &format!("Submitted {} for scanning", path.display()));
                submitted += 1;
            } else {
                reporter.warning(package, &format!("Scan submission failed for {}", path.display()));
            }
        }

        submitted
    }
}
