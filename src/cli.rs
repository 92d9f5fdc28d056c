//! CLI argument parsing module for autoupdate

use crate::config::PackageFilter;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Parse duration string in format: Ns (seconds), Nm (minutes), Nh (hours)
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_str, unit) = if let Some(n) = s.strip_suffix('s') {
        (n, 's')
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 'm')
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 'h')
    } else {
        return Err(format!("invalid duration format: {}", s));
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", num_str))?;
    if num == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    let seconds = match unit {
        's' => num,
        'm' => num * 60,
        'h' => num * 60 * 60,
        _ => unreachable!(),
    };

    Ok(Duration::from_secs(seconds))
}

/// Live output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    /// GitHub Actions when `GITHUB_ACTIONS=true`, console otherwise
    #[default]
    Auto,
    /// GitHub Actions workflow commands
    Actions,
    /// Human-readable console output
    Console,
}

/// Unattended runner for AU package updates
#[derive(Parser, Debug, Clone)]
#[command(
    name = "autoupdate",
    version,
    about = "Runs AU update procedures, publishes new packages and tags them"
)]
pub struct CliArgs {
    /// Packages repository root; takes precedence over --packages-repo
    pub path: Option<PathBuf>,

    /// Packages repository root
    #[arg(long, env = "PACKAGES_REPO")]
    pub packages_repo: Option<PathBuf>,

    /// Feed API key; without one every push is a dry run
    #[arg(long, env = "api_key", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Malware scanning service API key; without one scans are skipped
    #[arg(long, env = "VT_APIKEY", hide_env_values = true)]
    pub scan_api_key: Option<String>,

    /// Configuration file (default: autoupdate.toml in the packages root)
    #[arg(long)]
    pub config: Option<PathBuf>,

    // Run options
    /// Dry run mode - log pushes instead of running them, even with an API key
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Move existing tags instead of failing
    #[arg(long)]
    pub force_tags: bool,

    /// Skip packages whose directory already holds a package archive
    #[arg(long)]
    pub skip_existing: bool,

    /// Limit for a single update procedure (e.g., 90s, 30m, 1h)
    #[arg(long, value_parser = parse_duration)]
    pub procedure_timeout: Option<Duration>,

    // Package filters
    /// Exclude specific packages (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Process only specific packages (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub only: Vec<String>,

    // Output options
    /// Live output format
    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    pub format: FormatArg,

    /// Write the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable quiet mode - warnings, errors and the summary only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CliArgs {
    /// Returns the packages root given on the command line or in the environment
    pub fn packages_root(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| self.packages_repo.clone())
    }

    /// Returns the --only/--exclude package filter
    pub fn package_filter(&self) -> PackageFilter {
        PackageFilter {
            only: self.only.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_args() {
        let args = CliArgs::parse_from(["autoupdate"]);
        assert!(args.path.is_none());
        assert!(!args.dry_run);
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert!(!args.force_tags);
        assert!(!args.skip_existing);
        assert!(args.exclude.is_empty());
        assert!(args.only.is_empty());
        assert!(args.procedure_timeout.is_none());
        assert_eq!(args.format, FormatArg::Auto);
        assert!(!args.json);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_path_argument() {
        let args = CliArgs::parse_from(["autoupdate", "/some/path"]);
        assert_eq!(args.packages_root(), Some(PathBuf::from("/some/path")));
    }

    #[test]
    fn test_packages_repo_option() {
        let args = CliArgs::parse_from(["autoupdate", "--packages-repo", "/repo"]);
        assert_eq!(args.packages_root(), Some(PathBuf::from("/repo")));
    }

    #[test]
    fn test_path_wins_over_packages_repo() {
        let args = CliArgs::parse_from(["autoupdate", "/a", "--packages-repo", "/b"]);
        assert_eq!(args.packages_root(), Some(PathBuf::from("/a")));
    }

    #[test]
    fn test_dry_run_short_flag() {
        let args = CliArgs::parse_from(["autoupdate", "-n"]);
        assert!(args.dry_run);
    }

    #[test]
    fn test_dry_run_long_flag() {
        let args = CliArgs::parse_from(["autoupdate", "--dry-run"]);
        assert!(args.dry_run);
    }

    #[test]
    fn test_quiet_flags() {
        let args = CliArgs::parse_from(["autoupdate", "-q"]);
        assert!(args.quiet);

        let args = CliArgs::parse_from(["autoupdate", "--quiet"]);
        assert!(args.quiet);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["autoupdate", "-q", "--verbose"]).is_err());
    }

    #[test]
    fn test_credentials() {
        let args = CliArgs::parse_from([
            "autoupdate",
            "--api-key",
            "feed-key",
            "--scan-api-key",
            "scan-key",
        ]);
        assert_eq!(args.api_key.as_deref(), Some("feed-key"));
        assert_eq!(args.scan_api_key.as_deref(), Some("scan-key"));
    }

    #[test]
    fn test_format_values() {
        let args = CliArgs::parse_from(["autoupdate", "--format", "actions"]);
        assert_eq!(args.format, FormatArg::Actions);

        let args = CliArgs::parse_from(["autoupdate", "--format", "console"]);
        assert_eq!(args.format, FormatArg::Console);

        assert!(CliArgs::try_parse_from(["autoupdate", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_exclude_multiple() {
        let args = CliArgs::parse_from(["autoupdate", "--exclude", "foo", "--exclude", "bar"]);
        assert_eq!(args.exclude, vec!["foo", "bar"]);
    }

    #[test]
    fn test_only_multiple() {
        let args = CliArgs::parse_from(["autoupdate", "--only", "foo", "--only", "bar"]);
        assert_eq!(args.only, vec!["foo", "bar"]);
    }

    #[test]
    fn test_should_process_package() {
        let filter = CliArgs::parse_from(["autoupdate"]).package_filter();
        assert!(filter.should_process_package("any-package"));

        let filter = CliArgs::parse_from(["autoupdate", "--exclude", "foo"]).package_filter();
        assert!(!filter.should_process_package("foo"));
        assert!(!filter.should_process_package("FOO"));
        assert!(filter.should_process_package("bar"));

        let filter = CliArgs::parse_from(["autoupdate", "--only", "foo"]).package_filter();
        assert!(filter.should_process_package("foo"));
        assert!(!filter.should_process_package("bar"));
    }

    #[test]
    fn test_procedure_timeout() {
        let args = CliArgs::parse_from(["autoupdate", "--procedure-timeout", "45m"]);
        assert_eq!(args.procedure_timeout, Some(Duration::from_secs(45 * 60)));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("0m").is_err());
    }

    #[test]
    fn test_combined_flags() {
        let args = CliArgs::parse_from([
            "autoupdate",
            "/path/to/au-packages",
            "-n",
            "--verbose",
            "--force-tags",
            "--skip-existing",
            "--exclude",
            "firefox",
            "--json",
        ]);
        assert_eq!(args.path, Some(PathBuf::from("/path/to/au-packages")));
        assert!(args.dry_run);
        assert!(args.verbose);
        assert!(args.force_tags);
        assert!(args.skip_existing);
        assert_eq!(args.exclude, vec!["firefox"]);
        assert!(args.json);
    }
}
