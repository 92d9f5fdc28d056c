//! autoupdate - Unattended runner for AU package updates
//!
//! For every package directory with an `update.ps1` this tool:
//! - runs the update procedure in its own host process
//! - publishes new package archives (dry run without an API key)
//! - tags the update and commits all tags once at the end
//! - submits archives for malware scanning

use autoupdate::cli::CliArgs;
use autoupdate::config::{reporter_config, ReportEnvironment, Settings};
use autoupdate::logging::init_tracing;
use autoupdate::orchestrator::{CancellationFlag, Orchestrator};
use autoupdate::output::{create_reporter, ReportFormat};
use clap::Parser;
use std::process::ExitCode;
use tracing::warn;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    // Run the main logic and handle errors
    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    let settings = Settings::resolve(&args)?;

    let env = ReportEnvironment::detect();
    let output_config = reporter_config(&args, &env);
    let show_progress = env.terminal
        && output_config.format == ReportFormat::Text
        && !output_config.json
        && !args.quiet;
    let reporter = create_reporter(output_config);

    let cancellation = CancellationFlag::new();
    {
        let flag = cancellation.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            flag.cancel();
        });
    }

    let orchestrator =
        Orchestrator::new(settings, reporter, cancellation).with_progress(show_progress);
    let result = orchestrator.run().await?;

    Ok(ExitCode::from(result.exit_code()))
}
