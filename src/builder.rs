//! Collector build step.
//!
//! The build tool is an opaque external binary invoked as
//! `<builder> --config <serverConfig> collector [--datastore <path>] <spec>`.
//! Its exit code alone is not trusted: on success the tool must also have
//! written its output artifact to a fixed, tool-defined location, which the
//! builder relocates into the collectors directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};

use crate::config::BuilderConfig;
use crate::utils::fs::ensure_dir;

/// Captured output of a finished external process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Seam for spawning local processes, so tests never invoke real binaries.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput>;
}

/// Runs commands as ordinary local child processes.
pub struct LocalProcessRunner;

impl CommandRunner for LocalProcessRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .context(format!("Failed to execute {}", program.display()))?;
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Builds collector executables from spec files via the external tool.
pub struct CollectorBuilder<'a> {
    config: &'a BuilderConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> CollectorBuilder<'a> {
    pub fn new(config: &'a BuilderConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Build a collector for `artifact_name` from `spec_path` and relocate
    /// it into the collectors directory under a sanitized name.
    pub fn build(&self, artifact_name: &str, spec_path: &Path) -> Result<PathBuf> {
        // Fail fast before invoking a missing tool.
        if !self.config.binary_path.exists() {
            return Err(anyhow!(
                "Build binary not found: {}",
                self.config.binary_path.display()
            ));
        }
        if !self.config.server_config.exists() {
            return Err(anyhow!(
                "Build server config not found: {}",
                self.config.server_config.display()
            ));
        }
        if !spec_path.exists() {
            return Err(anyhow!("Spec file not found: {}", spec_path.display()));
        }

        ensure_dir(&self.config.collectors_dir)?;

        let mut args = vec![
            "--config".to_string(),
            self.config.server_config.to_string_lossy().to_string(),
            "collector".to_string(),
        ];
        if let Some(datastore) = &self.config.datastore {
            args.push("--datastore".to_string());
            args.push(datastore.to_string_lossy().to_string());
        }
        args.push(spec_path.to_string_lossy().to_string());

        info!(
            "Running build command: {} {}",
            self.config.binary_path.display(),
            args.join(" ")
        );
        let output = self.runner.run(&self.config.binary_path, &args)?;

        if !output.stderr.is_empty() {
            error!("Build tool stderr: {}", output.stderr);
        }
        if !output.stdout.is_empty() {
            debug!("Build tool stdout: {}", output.stdout);
        }

        if !output.success() {
            return Err(anyhow!(
                "Collector build failed with exit code {:?}{}",
                output.exit_code,
                if output.stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {}", output.stderr.trim())
                }
            ));
        }

        // Exit code alone is not trusted; the tool-defined output must exist.
        let source = &self.config.built_collector_path;
        if !source.exists() {
            return Err(anyhow!(
                "Build command succeeded but collector not found at {}",
                source.display()
            ));
        }

        let target = self
            .config
            .collectors_dir
            .join(format!("collector_{}.exe", sanitize_name(artifact_name)));
        fs::copy(source, &target).context(format!(
            "Failed to copy collector from {} to {}",
            source.display(),
            target.display()
        ))?;

        let size = fs::metadata(&target)?.len();
        info!(
            "Copied collector to {} ({:.2} KB)",
            target.display(),
            size as f64 / 1024.0
        );
        Ok(target)
    }
}

/// Replace characters unsafe in a collector filename.
fn sanitize_name(name: &str) -> String {
    name.replace(' ', "_").replace('.', "_")
}
