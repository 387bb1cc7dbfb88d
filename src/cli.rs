use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the collector harness.
#[derive(Parser, Debug)]
#[clap(
    name = "collector-harness",
    about = "Remote artifact collection and result normalization harness"
)]
pub struct Args {
    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the harness.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build, push and execute collectors on the remote host, then pull
    /// and normalize the results
    Run(RunOpts),

    /// Normalize and validate already-pulled bundles without touching the
    /// remote host
    Process(ProcessOpts),
}

/// Options for the run subcommand.
#[derive(ClapArgs, Debug)]
pub struct RunOpts {
    /// Artifact names to collect (comma-separated)
    #[clap(short, long)]
    pub artifacts: String,

    /// Build one combined collector covering every artifact instead of one
    /// collector per artifact
    #[clap(long)]
    pub combined: bool,
}

impl RunOpts {
    /// Requested artifact names, trimmed, empty entries dropped.
    pub fn artifact_list(&self) -> Vec<String> {
        self.artifacts
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Options for the process subcommand.
#[derive(ClapArgs, Debug)]
pub struct ProcessOpts {
    /// Directory containing pulled collection bundles
    #[clap(short, long, default_value = "runtime")]
    pub input_dir: PathBuf,

    /// Directory extracted bundle trees are written to
    #[clap(short, long, default_value = "runtime_zip")]
    pub output_dir: PathBuf,
}
