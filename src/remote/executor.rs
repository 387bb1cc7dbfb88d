//! Remote collector execution.
//!
//! The collector runs under a shell wrapper that redirects combined output
//! to a remote log file and prints a literal success token only when the
//! process's own exit code was zero. Completion is confirmed by one
//! fixed-delay check for the log file, not a backoff loop. A separate local
//! step re-opens the pulled log and looks for the collector's clean-shutdown
//! message; its absence is a verification failure, not a transport failure.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};

use crate::constants::{EXEC_EXITING_TOKEN, EXEC_SUCCESS_TOKEN, POST_EXEC_PAUSE_SECS};
use crate::remote::{remote_basename, FileTransfer, RemoteShell};

pub struct RemoteExecutor<'a> {
    shell: &'a dyn RemoteShell,
    transfer: &'a dyn FileTransfer,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(shell: &'a dyn RemoteShell, transfer: &'a dyn FileTransfer) -> Self {
        Self { shell, transfer }
    }

    /// Run the pushed collector, capturing its output to `remote_log`.
    ///
    /// Fails on a non-zero remote status, a missing success token, or a log
    /// file that never appears after the fixed pause.
    pub fn run_collector(&self, remote_exe: &str, remote_log: &str) -> Result<()> {
        let script = execution_script(remote_exe, remote_log);
        debug!("Executing collector {}", remote_exe);
        let output = self.shell.execute(&script)?;

        if !output.success() || !output.stdout.contains(EXEC_SUCCESS_TOKEN) {
            return Err(anyhow!(
                "Collector execution failed: {}",
                output.error_text().trim()
            ));
        }
        info!("Collector execution completed on remote host");

        // One fixed pause for remote file operations to settle, then a
        // single existence check.
        self.shell
            .execute(&format!("\"Start-Sleep -Seconds {}\"", POST_EXEC_PAUSE_SECS))?;

        let check = self
            .shell
            .execute(&format!("\"Test-Path '{}'\"", remote_log))?;
        if check.stdout.trim().to_lowercase() != "true" {
            return Err(anyhow!(
                "Log file {} not found after execution",
                remote_log
            ));
        }
        debug!("Log file present on remote host: {}", remote_log);
        Ok(())
    }

    /// Retrieve the execution log into `local_dir`.
    pub fn pull_log(&self, remote_log: &str, local_dir: &Path) -> Result<PathBuf> {
        let local_path = local_dir.join(remote_basename(remote_log));
        self.transfer.get(remote_log, &local_path)?;
        Ok(local_path)
    }
}

/// Check the pulled log for the collector's clean-shutdown token.
pub fn verify_log_output(log_path: &Path) -> Result<()> {
    let content = fs::read_to_string(log_path)
        .context(format!("Failed to read log file {}", log_path.display()))?;
    if content.contains(EXEC_EXITING_TOKEN) {
        info!(
            "Execution verification passed: found '{}' in {}",
            EXEC_EXITING_TOKEN,
            log_path.display()
        );
        Ok(())
    } else {
        Err(anyhow!(
            "Execution verification failed: '{}' not found in {}",
            EXEC_EXITING_TOKEN,
            log_path.display()
        ))
    }
}

/// Wrapper script: run the collector, capture all output to the log, and
/// print the success token only when the exit code was zero.
fn execution_script(remote_exe: &str, remote_log: &str) -> String {
    format!(
        "\"$ErrorActionPreference = 'Stop'; \
         try {{ \
         Set-Location (Split-Path -Parent '{exe}'); \
         $output = & '{exe}' 2>&1; \
         $output | Out-File -FilePath '{log}' -Encoding UTF8; \
         if ($LASTEXITCODE -ne $null -and $LASTEXITCODE -ne 0) {{ throw \\\"Process exited with code $LASTEXITCODE\\\" }}; \
         '{token}' \
         }} catch {{ Write-Error \\\"Failed to execute: $_\\\"; throw }}\"",
        exe = remote_exe,
        log = remote_log,
        token = EXEC_SUCCESS_TOKEN,
    )
}
