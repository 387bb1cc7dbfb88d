use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use collector_harness::batch::BatchCoordinator;
use collector_harness::builder::LocalProcessRunner;
use collector_harness::cli::{Args, Commands, ProcessOpts, RunOpts};
use collector_harness::config::{HarnessConfig, RemoteCredentials};
use collector_harness::pipeline;
use collector_harness::remote::Ssh2Channel;

fn main() -> Result<()> {
    let args = Args::parse();
    initialize_logging(args.verbose)?;

    let config = HarnessConfig::load(args.config.as_deref())?;
    match &args.command {
        Commands::Run(opts) => handle_run(&config, opts),
        Commands::Process(opts) => handle_process(opts),
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

fn handle_run(config: &HarnessConfig, opts: &RunOpts) -> Result<()> {
    let artifacts = opts.artifact_list();
    if artifacts.is_empty() {
        return Err(anyhow!("No artifacts requested"));
    }

    let credentials = RemoteCredentials::from_env()?;
    info!(
        "Targeting {}@{} with {} artifact(s)",
        credentials.username,
        credentials.host,
        artifacts.len()
    );

    let channel = Ssh2Channel::new(credentials);
    let runner = LocalProcessRunner;
    let coordinator = BatchCoordinator::new(config, &runner, &channel, &channel);

    let report = if opts.combined {
        coordinator.run_combined(&artifacts)?
    } else {
        coordinator.run_batch(&artifacts)?
    };

    let stats = &report.stats;
    info!(
        "Run complete: {}/{} artifact(s) succeeded, average {:.2}s per artifact",
        stats.successful.len(),
        stats.total(),
        stats.average_time()
    );
    for outcome in &stats.failed {
        info!("Failed: {} (after {:.2}s)", outcome.name, outcome.execution_time);
    }

    if report.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "Run finished with failures: {} artifact(s) failed, {} bundle(s) unprocessed, {} validation issue(s)",
            stats.failed.len(),
            report.pipeline.failed.len(),
            report
                .pipeline
                .processed
                .iter()
                .map(|r| r.validation.issues.len())
                .sum::<usize>()
        ))
    }
}

fn handle_process(opts: &ProcessOpts) -> Result<()> {
    let bundles = find_bundles(&opts.input_dir)?;
    if bundles.is_empty() {
        info!("No bundles found in {}", opts.input_dir.display());
        return Ok(());
    }
    info!(
        "Processing {} bundle(s) from {}",
        bundles.len(),
        opts.input_dir.display()
    );

    let summary = pipeline::process_bundles(&bundles, &opts.output_dir);
    for report in &summary.processed {
        info!(
            "{}: {} rename(s), {} file(s) enriched, {} issue(s)",
            report.bundle.display(),
            report.renamed,
            report.enriched,
            report.validation.issues.len()
        );
        for issue in &report.validation.issues {
            info!("  {}:{}: {}", issue.file, issue.line, issue.detail);
        }
    }

    if summary.all_clean() {
        Ok(())
    } else {
        Err(anyhow!(
            "Processing finished with {} failed bundle(s) and validation issues",
            summary.failed.len()
        ))
    }
}

/// Zip bundles in a directory, sorted for a stable processing order.
fn find_bundles(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .context(format!("Failed to read bundle directory {}", dir.display()))?;
    let mut bundles: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("zip"))
                .unwrap_or(false)
        })
        .collect();
    bundles.sort();
    Ok(bundles)
}
