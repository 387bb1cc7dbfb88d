//! Remote capabilities for the target host.
//!
//! Two narrow traits cover everything the orchestrator needs: a command
//! shell and a file-transfer session. The production implementation rides
//! SSH ([`ssh::Ssh2Channel`]); tests substitute fakes so no network is
//! touched.

use anyhow::Result;

/// SSH-backed implementation of both capabilities
pub mod ssh;

/// Size/hash verification of pushed files
pub mod verify;

/// Remote collector execution and log verification
pub mod executor;

/// Pattern-based bundle retrieval and remote cleanup
pub mod puller;

pub use executor::RemoteExecutor;
pub use puller::BundlePuller;
pub use ssh::Ssh2Channel;
pub use verify::push_and_verify;

/// Result of one remote command invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stderr when present, stdout otherwise; for error reporting.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Authenticated remote command execution.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteShell {
    /// Run a command on the target and capture status and output streams.
    fn execute(&self, command: &str) -> Result<ExecOutput>;
}

/// Authenticated file transfer to and from the target.
#[cfg_attr(test, mockall::automock)]
pub trait FileTransfer {
    fn put(&self, local: &std::path::Path, remote: &str) -> Result<()>;
    fn get(&self, remote: &str, local: &std::path::Path) -> Result<()>;
}

/// Final component of a remote path, tolerant of either separator.
pub fn remote_basename(remote_path: &str) -> &str {
    remote_path
        .rsplit(|c| c == '\\' || c == '/')
        .next()
        .unwrap_or(remote_path)
}
