//! Run configuration
//!
//! Settings are resolved once, before the first package is touched, in three
//! layers: built-in defaults, an optional `autoupdate.toml`, then environment
//! variables and command-line flags. The result is immutable for the run.
//!
//! ```toml
//! skip_existing_artifacts = false
//!
//! [procedure]
//! file = "update.ps1"
//! host = "powershell"        # or "command"
//! program = "pwsh"
//! timeout_secs = 1800
//!
//! [publish]
//! feed_url = "https://push.chocolatey.org/"
//! foreign_packages = ["dotnet-sdk"]
//!
//! [vcs]
//! tag_policy = "fail-if-exists"   # or "force"
//! commit_prefix = "AU-dotnet"
//!
//! [scan]
//! max_size_bytes = 681574400
//! ```

use crate::cli::{CliArgs, FormatArg};
use crate::discovery::DEFAULT_PROCEDURE_FILE;
use crate::error::ConfigError;
use crate::output::{ReportFormat, ReporterConfig, Verbosity};
use crate::procedure::{ProcedureHost, DEFAULT_PROCEDURE_TIMEOUT};
use crate::publish::{PublishSettings, ScanSettings};
use crate::vcs::{TagPolicy, VcsSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Configuration file looked up in the packages root
pub const CONFIG_FILE_NAME: &str = "autoupdate.toml";

/// Packages root used when none is given
pub fn default_packages_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"c:\dev\git\au-packages")
    } else {
        PathBuf::from(".")
    }
}

/// Package name filter from `--only` / `--exclude`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFilter {
    pub only: Vec<String>,
    pub exclude: Vec<String>,
}

impl PackageFilter {
    /// Check if a package should be processed based on filters
    pub fn should_process_package(&self, name: &str) -> bool {
        // If --only is specified, only process those packages
        if !self.only.is_empty() {
            return self.only.iter().any(|p| p.eq_ignore_ascii_case(name));
        }
        // If --exclude is specified, skip those packages
        !self.exclude.iter().any(|p| p.eq_ignore_ascii_case(name))
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub packages_root: PathBuf,
    /// File name that marks a directory as a package
    pub procedure_file: String,
    pub procedure_host: ProcedureHost,
    pub procedure_timeout: Duration,
    pub publish: PublishSettings,
    pub vcs: VcsSettings,
    pub scan: ScanSettings,
    /// Skip packages that already hold an artifact before their procedure runs
    pub skip_existing_artifacts: bool,
    pub filter: PackageFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            packages_root: default_packages_root(),
            procedure_file: DEFAULT_PROCEDURE_FILE.to_string(),
            procedure_host: ProcedureHost::default(),
            procedure_timeout: DEFAULT_PROCEDURE_TIMEOUT,
            publish: PublishSettings::default(),
            vcs: VcsSettings::default(),
            scan: ScanSettings::default(),
            skip_existing_artifacts: false,
            filter: PackageFilter::default(),
        }
    }
}

impl Settings {
    /// Returns true if pushes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.publish.is_dry_run()
    }

    /// Resolves settings from the command line, reading the config file it names
    /// or the one in the packages root
    pub fn resolve(args: &CliArgs) -> Result<Self, ConfigError> {
        let packages_root = args.packages_root().unwrap_or_else(default_packages_root);

        let file = match &args.config {
            Some(path) => Some(load_config_file(path)?),
            None => {
                let candidate = packages_root.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Some(load_config_file(&candidate)?)
                } else {
                    None
                }
            }
        };

        Self::from_layers(packages_root, file.unwrap_or_default(), args)
    }

    /// Applies the config file and then the command line over the defaults
    pub fn from_layers(
        packages_root: PathBuf,
        file: ConfigFile,
        args: &CliArgs,
    ) -> Result<Self, ConfigError> {
        let mut settings = Settings {
            packages_root,
            ..Settings::default()
        };

        file.apply(&mut settings)?;

        settings.publish.api_key = if args.dry_run {
            None
        } else {
            non_empty(args.api_key.clone())
        };
        settings.scan.api_key = non_empty(args.scan_api_key.clone());
        if args.force_tags {
            settings.vcs.tag_policy = TagPolicy::Force;
        }
        if args.skip_existing {
            settings.skip_existing_artifacts = true;
        }
        if let Some(timeout) = args.procedure_timeout {
            settings.procedure_timeout = timeout;
        }
        settings.filter = args.package_filter();

        debug!(
            root = %settings.packages_root.display(),
            dry_run = settings.is_dry_run(),
            tag_policy = %settings.vcs.tag_policy,
            "settings resolved"
        );
        Ok(settings)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reads and parses a configuration file
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
    toml::from_str(&contents).map_err(|e| ConfigError::parse_error(path, e.to_string()))
}

/// How the procedure host is chosen in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Powershell,
    Command,
}

/// `autoupdate.toml` contents; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub skip_existing_artifacts: Option<bool>,
    pub procedure: ProcedureSection,
    pub publish: PublishSection,
    pub vcs: VcsSection,
    pub scan: ScanSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcedureSection {
    pub file: Option<String>,
    pub host: Option<HostKind>,
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishSection {
    pub program: Option<String>,
    pub feed_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub foreign_packages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VcsSection {
    pub program: Option<String>,
    pub tag_policy: Option<TagPolicy>,
    pub commit_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSection {
    pub program: Option<String>,
    pub max_size_bytes: Option<u64>,
    pub min_size_bytes: Option<u64>,
    pub timeout_secs: Option<u64>,
}

fn timeout(key: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::invalid_value(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn program(key: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid_value(key, "must not be empty"));
    }
    Ok(value)
}

impl ConfigFile {
    /// Overlays the file's values onto `settings`, validating each one
    pub fn apply(self, settings: &mut Settings) -> Result<(), ConfigError> {
        if let Some(skip) = self.skip_existing_artifacts {
            settings.skip_existing_artifacts = skip;
        }

        let procedure = self.procedure;
        if let Some(file) = procedure.file {
            if file.trim().is_empty() || file.contains(['/', '\\']) {
                return Err(ConfigError::invalid_value(
                    "procedure.file",
                    "must be a plain file name",
                ));
            }
            settings.procedure_file = file;
        }
        settings.procedure_host = match procedure.host.unwrap_or(HostKind::Powershell) {
            HostKind::Powershell => ProcedureHost::PowerShell {
                program: match procedure.program {
                    Some(p) => program("procedure.program", p)?,
                    None => "pwsh".to_string(),
                },
            },
            HostKind::Command => ProcedureHost::Command {
                program: match procedure.program {
                    Some(p) => program("procedure.program", p)?,
                    None => {
                        return Err(ConfigError::invalid_value(
                            "procedure.program",
                            "required when procedure.host is \"command\"",
                        ))
                    }
                },
                args: procedure.args.unwrap_or_default(),
            },
        };
        if let Some(secs) = procedure.timeout_secs {
            settings.procedure_timeout = timeout("procedure.timeout_secs", secs)?;
        }

        let publish = self.publish;
        if let Some(p) = publish.program {
            settings.publish.program = program("publish.program", p)?;
        }
        if let Some(url) = publish.feed_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::invalid_value(
                    "publish.feed_url",
                    format!("'{}' is not an http(s) URL", url),
                ));
            }
            settings.publish.feed_url = url;
        }
        if let Some(secs) = publish.timeout_secs {
            settings.publish.timeout = timeout("publish.timeout_secs", secs)?;
        }
        if let Some(foreign) = publish.foreign_packages {
            settings.publish.foreign_packages = foreign;
        }

        let vcs = self.vcs;
        if let Some(p) = vcs.program {
            settings.vcs.program = program("vcs.program", p)?;
        }
        if let Some(policy) = vcs.tag_policy {
            settings.vcs.tag_policy = policy;
        }
        if let Some(prefix) = vcs.commit_prefix {
            if prefix.contains('\n') {
                return Err(ConfigError::invalid_value(
                    "vcs.commit_prefix",
                    "must be a single line",
                ));
            }
            settings.vcs.commit_prefix = prefix;
        }

        let scan = self.scan;
        if let Some(p) = scan.program {
            settings.scan.program = program("scan.program", p)?;
        }
        if let Some(max) = scan.max_size_bytes {
            settings.scan.max_size_bytes = max;
        }
        if let Some(min) = scan.min_size_bytes {
            settings.scan.min_size_bytes = min;
        }
        if settings.scan.min_size_bytes > settings.scan.max_size_bytes {
            return Err(ConfigError::invalid_value(
                "scan.min_size_bytes",
                "must not exceed scan.max_size_bytes",
            ));
        }
        if let Some(secs) = scan.timeout_secs {
            settings.scan.timeout = timeout("scan.timeout_secs", secs)?;
        }

        Ok(())
    }
}

/// Environment facts that influence reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportEnvironment {
    /// `GITHUB_ACTIONS=true`
    pub github_actions: bool,
    /// `GITHUB_STEP_SUMMARY`
    pub step_summary: Option<PathBuf>,
    /// Whether stdout is a terminal
    pub terminal: bool,
}

impl ReportEnvironment {
    /// Reads the reporting environment of the current process
    pub fn detect() -> Self {
        use std::io::IsTerminal;

        Self {
            github_actions: std::env::var("GITHUB_ACTIONS")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            step_summary: std::env::var_os("GITHUB_STEP_SUMMARY")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            terminal: std::io::stdout().is_terminal(),
        }
    }
}

/// Chooses the reporter from the command line and environment
pub fn reporter_config(args: &CliArgs, env: &ReportEnvironment) -> ReporterConfig {
    let format = match args.format {
        FormatArg::Actions => ReportFormat::Actions,
        FormatArg::Console => ReportFormat::Text,
        FormatArg::Auto if env.github_actions => ReportFormat::Actions,
        FormatArg::Auto => ReportFormat::Text,
    };

    let verbosity = if args.quiet {
        Verbosity::Quiet
    } else if args.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };

    ReporterConfig {
        format,
        verbosity,
        json: args.json,
        color: env.terminal && format == ReportFormat::Text && !args.json,
        summary_path: env.step_summary.clone(),
    }
}
