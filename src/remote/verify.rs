//! Transfer verification: a push only counts when the remote copy's size
//! and SHA-256 both match the local file. Size or hash alone is not
//! trusted.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{error, info};

use crate::models::TransferRecord;
use crate::remote::{FileTransfer, RemoteShell};
use crate::utils::hash::sha256_file;

/// Push a file and verify it, in one step.
///
/// Any mismatch fails the push; the caller treats the artifact as failed.
pub fn push_and_verify(
    transfer: &dyn FileTransfer,
    shell: &dyn RemoteShell,
    local: &Path,
    remote: &str,
) -> Result<TransferRecord> {
    if !local.exists() {
        return Err(anyhow!("Local file not found: {}", local.display()));
    }

    transfer.put(local, remote)?;

    let record = verify_transfer(shell, local, remote)?;
    if !record.verified() {
        error!(
            "Transfer verification failed for {}: local {} bytes / {}, remote {} bytes / {}",
            remote,
            record.local_size,
            record.local_sha256,
            record.remote_size,
            record.remote_sha256
        );
        return Err(anyhow!(
            "Transfer verification failed for {} (size or hash mismatch)",
            remote
        ));
    }

    info!(
        "Transfer verified for {} (SHA256: {})",
        remote, record.local_sha256
    );
    Ok(record)
}

/// Compare local size/hash against values computed on the remote host.
pub fn verify_transfer(
    shell: &dyn RemoteShell,
    local: &Path,
    remote: &str,
) -> Result<TransferRecord> {
    let local_size = std::fs::metadata(local)
        .context(format!("Failed to stat {}", local.display()))?
        .len();
    let local_sha256 = sha256_file(local)?;

    let size_output = shell.execute(&format!("\"(Get-Item '{}').Length\"", remote))?;
    if !size_output.success() {
        return Err(anyhow!(
            "Failed to get remote file size for {}: {}",
            remote,
            size_output.error_text().trim()
        ));
    }
    let remote_size: u64 = size_output
        .stdout
        .trim()
        .parse()
        .context(format!("Unparseable remote size for {}", remote))?;

    let hash_output = shell.execute(&format!(
        "\"(Get-FileHash -Path '{}' -Algorithm SHA256).Hash.ToLower()\"",
        remote
    ))?;
    if !hash_output.success() {
        return Err(anyhow!(
            "Failed to get remote file hash for {}: {}",
            remote,
            hash_output.error_text().trim()
        ));
    }
    let remote_sha256 = hash_output.stdout.trim().to_string();
    if remote_sha256.is_empty() {
        return Err(anyhow!("Empty remote hash for {}", remote));
    }

    Ok(TransferRecord {
        local_path: local.to_path_buf(),
        remote_path: remote.to_string(),
        local_size,
        remote_size,
        local_sha256,
        remote_sha256,
    })
}
