//! autoupdate - Unattended runner for AU package updates
//!
//! This library provides the core functionality for keeping a repository of
//! Chocolatey packages current:
//! - Discovery of package directories with an `update.ps1` procedure
//! - Isolated execution of each procedure and interpretation of its result
//! - Publishing new package archives to the feed (dry run without an API key)
//! - Tagging each published update and one commit per run
//! - Malware scan submission of produced archives
//! - Run reports for GitHub Actions, the console and JSON consumers

pub mod cli;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod procedure;
pub mod process;
pub mod progress;
pub mod publish;
pub mod vcs;
