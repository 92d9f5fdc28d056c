//! End-to-end tests for the autoupdate CLI
//!
//! These tests verify:
//! - Help and argument handling
//! - Console and JSON summaries for real runs
//! - Exit codes for fatal configuration and discovery errors
//! - A full run driving a shell procedure host (unix only)

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// The binary with every environment input that changes its behaviour cleared
fn autoupdate() -> Command {
    let mut cmd = Command::cargo_bin("autoupdate").expect("binary should be built");
    cmd.env_remove("api_key")
        .env_remove("VT_APIKEY")
        .env_remove("PACKAGES_REPO")
        .env_remove("GITHUB_ACTIONS")
        .env_remove("GITHUB_STEP_SUMMARY")
        .env_remove("RUST_LOG");
    cmd
}

fn create_empty_repo() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("temp path should be UTF-8")
}

#[test]
fn test_help() {
    autoupdate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--packages-repo"));
}

#[test]
fn test_version() {
    autoupdate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("autoupdate"));
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    autoupdate()
        .args(["--quiet", "--verbose", "."])
        .assert()
        .failure();
}

#[test]
fn test_empty_repository_console() {
    let repo = create_empty_repo();

    autoupdate()
        .args([arg(repo.path()), "--format", "console"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("No packages were updated"));
}

#[test]
fn test_packages_repo_from_environment() {
    let repo = create_empty_repo();

    autoupdate()
        .env("PACKAGES_REPO", repo.path())
        .args(["--format", "console"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("No packages were updated"));
}

#[test]
fn test_empty_repository_json() {
    let repo = create_empty_repo();

    let output = autoupdate()
        .args([arg(repo.path()), "--json"])
        .output()
        .expect("Failed to run autoupdate");

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be a JSON document");
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["cancelled"], false);
    assert_eq!(json["summary"]["updated"], 0);
    assert_eq!(json["summary"]["processed"], 0);
    assert!(json["packages"].as_array().unwrap().is_empty());
    assert!(json.get("untagged").is_none());
}

#[test]
fn test_actions_format_writes_job_summary() {
    let repo = create_empty_repo();
    let summary_file = repo.path().join("summary.md");

    autoupdate()
        .env("GITHUB_STEP_SUMMARY", &summary_file)
        .args([arg(repo.path()), "--format", "actions"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("No packages were updated"));

    let markdown = fs::read_to_string(&summary_file).unwrap();
    assert_eq!(markdown, "No packages were updated\n");
}

#[test]
fn test_missing_root_fails() {
    let repo = create_empty_repo();
    let missing = repo.path().join("does-not-exist");

    autoupdate()
        .arg(arg(&missing))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("packages root not found"));
}

#[test]
fn test_invalid_config_fails() {
    let repo = create_empty_repo();
    fs::write(
        repo.path().join("autoupdate.toml"),
        "[publish]\nfeed_url = \"ftp://example.invalid\"\n",
    )
    .unwrap();

    autoupdate()
        .arg(arg(repo.path()))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("feed_url"));
}

#[test]
fn test_unknown_config_key_fails() {
    let repo = create_empty_repo();
    fs::write(repo.path().join("autoupdate.toml"), "[publish]\napi_key = \"x\"\n").unwrap();

    autoupdate()
        .arg(arg(repo.path()))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to parse config file"));
}

#[test]
fn test_invalid_procedure_timeout() {
    autoupdate()
        .args([".", "--procedure-timeout", "0s"])
        .assert()
        .failure();
}

#[cfg(unix)]
mod shell_host {
    use super::*;

    /// Repository whose packages are driven by `sh update.sh`
    fn create_shell_repo() -> TempDir {
        let repo = create_empty_repo();
        fs::write(
            repo.path().join("autoupdate.toml"),
            r#"[procedure]
file = "update.sh"
host = "command"
program = "sh"
timeout_secs = 30
"#,
        )
        .unwrap();
        repo
    }

    fn add_package(repo: &Path, name: &str, script: &str) {
        let dir = repo.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("update.sh"), script).unwrap();
    }

    #[test]
    fn test_ignored_and_failing_packages() {
        let repo = create_shell_repo();
        fs::create_dir_all(repo.path().join("alpha")).unwrap();
        add_package(
            repo.path(),
            "beta",
            "echo '{\"kind\":\"info\",\"message\":\"checking beta\"}'\n\
             echo '{\"kind\":\"output\",\"value\":\"Ignore\"}'\n",
        );
        add_package(
            repo.path(),
            "gamma",
            "echo '{\"kind\":\"exception\",\"message\":\"upstream unreachable\"}'\nexit 1\n",
        );
        add_package(repo.path(), "delta", "echo 'nothing new'\n");

        let output = autoupdate()
            .args([arg(repo.path()), "--json"])
            .output()
            .expect("Failed to run autoupdate");

        // gamma's failure makes the run a partial success
        assert_eq!(output.status.code(), Some(2));

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("checking beta"));
        assert!(stderr.contains("upstream unreachable"));

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["summary"]["updated"], 0);
        assert_eq!(json["summary"]["processed"], 3);
        assert_eq!(json["summary"]["failed"], 1);

        let packages = json["packages"].as_array().unwrap();
        let states: Vec<(&str, &str)> = packages
            .iter()
            .map(|p| (p["name"].as_str().unwrap(), p["state"].as_str().unwrap()))
            .collect();
        assert_eq!(
            states,
            vec![
                ("beta", "ignored"),
                ("delta", "no_change"),
                ("gamma", "procedure_error"),
            ]
        );
    }

    #[test]
    fn test_exclude_filter() {
        let repo = create_shell_repo();
        add_package(
            repo.path(),
            "gamma",
            "echo '{\"kind\":\"exception\",\"message\":\"boom\"}'\n",
        );
        add_package(repo.path(), "delta", "true\n");

        let output = autoupdate()
            .args([arg(repo.path()), "--json", "--exclude", "gamma"])
            .output()
            .expect("Failed to run autoupdate");

        assert_eq!(output.status.code(), Some(0));
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["summary"]["processed"], 1);
        assert_eq!(json["packages"][0]["name"], "delta");
    }

    #[test]
    fn test_relative_packages_root() {
        let repo = create_shell_repo();
        add_package(
            repo.path(),
            "beta",
            "test -f update.sh || exit 3\n\
             echo '{\"kind\":\"output\",\"value\":\"Ignore\"}'\n",
        );

        // no root argument: the default root is the working directory
        let output = autoupdate()
            .current_dir(repo.path())
            .arg("--json")
            .output()
            .expect("Failed to run autoupdate");

        assert_eq!(output.status.code(), Some(0));
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["packages"][0]["name"], "beta");
        assert_eq!(json["packages"][0]["state"], "ignored");
    }

    #[test]
    fn test_relative_packages_repo_variable() {
        let repo = create_shell_repo();
        add_package(repo.path(), "delta", "echo 'nothing new'\n");
        let parent = repo.path().parent().unwrap();
        let name = repo.path().file_name().unwrap();

        let output = autoupdate()
            .current_dir(parent)
            .env("PACKAGES_REPO", name)
            .arg("--json")
            .output()
            .expect("Failed to run autoupdate");

        assert_eq!(output.status.code(), Some(0));
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["packages"][0]["state"], "no_change");
    }
}
