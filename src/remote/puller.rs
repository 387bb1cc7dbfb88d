//! Bundle retrieval and remote cleanup.
//!
//! The puller lists collection bundles by glob on the remote host and
//! copies them into a local directory that is wiped first, so each batch
//! sees only its own files. A failure pulling one bundle skips that bundle
//! and continues; an empty listing is a valid outcome.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{info, warn};

use crate::constants::{REMOTE_BUNDLE_PATTERN, REMOTE_CLEANUP_PATTERNS};
use crate::remote::{remote_basename, FileTransfer, RemoteShell};
use crate::utils::fs::recreate_dir;

pub struct BundlePuller<'a> {
    shell: &'a dyn RemoteShell,
    transfer: &'a dyn FileTransfer,
}

impl<'a> BundlePuller<'a> {
    pub fn new(shell: &'a dyn RemoteShell, transfer: &'a dyn FileTransfer) -> Self {
        Self { shell, transfer }
    }

    /// List remote files matching `pattern`, one absolute path per line.
    pub fn list_remote(&self, pattern: &str) -> Result<Vec<String>> {
        let output = self.shell.execute(&format!(
            "\"Get-ChildItem -Path '{}' | Select-Object -ExpandProperty FullName\"",
            pattern
        ))?;
        if !output.success() {
            return Err(anyhow!(
                "Failed to list remote files matching {}: {}",
                pattern,
                output.error_text().trim()
            ));
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Pull all collection bundles into `local_dir`.
    ///
    /// The directory is cleared first. Returns the local paths of the
    /// bundles that arrived; bundles that fail to transfer are logged and
    /// skipped rather than aborting the pull.
    pub fn pull_bundles(&self, local_dir: &Path) -> Result<Vec<PathBuf>> {
        recreate_dir(local_dir)?;

        let remote_paths = self.list_remote(REMOTE_BUNDLE_PATTERN)?;
        if remote_paths.is_empty() {
            info!("No collection bundles found on remote host");
            return Ok(Vec::new());
        }

        let mut pulled = Vec::new();
        for remote_path in &remote_paths {
            let local_path = local_dir.join(remote_basename(remote_path));
            match self.transfer.get(remote_path, &local_path) {
                Ok(()) => pulled.push(local_path),
                Err(e) => warn!("Failed to pull {}: {:#}", remote_path, e),
            }
        }

        info!(
            "Pulled {} of {} collection bundle(s)",
            pulled.len(),
            remote_paths.len()
        );
        Ok(pulled)
    }

    /// Remove harness artifacts from the remote temp directory.
    ///
    /// Best effort: individual failures are logged and never propagated.
    pub fn cleanup_remote(&self) {
        for pattern in REMOTE_CLEANUP_PATTERNS {
            let command = format!(
                "\"Remove-Item -Path '{}' -Force -ErrorAction SilentlyContinue\"",
                pattern
            );
            match self.shell.execute(&command) {
                Ok(output) if output.success() => {
                    info!("Cleaned up remote files matching {}", pattern)
                }
                Ok(output) => warn!(
                    "Remote cleanup of {} reported: {}",
                    pattern,
                    output.error_text().trim()
                ),
                Err(e) => warn!("Remote cleanup of {} failed: {:#}", pattern, e),
            }
        }
    }
}
