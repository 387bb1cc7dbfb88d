//! SSH implementation of the remote capabilities.
//!
//! Commands run through `powershell -Command` since the remote contract
//! surface (temp paths, globbing, hashing) is expressed in PowerShell.
//! A fresh session is created per operation; the harness performs few,
//! long-lived operations, so connection reuse buys nothing and a stale
//! session can't poison a later step.

use std::fs::File;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use ssh2::Session;

use crate::config::RemoteCredentials;
use crate::remote::{ExecOutput, FileTransfer, RemoteShell};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TRANSFER_CHUNK_SIZE: usize = 512 * 1024;

/// Remote channel carrying both capabilities over SSH to one target host.
pub struct Ssh2Channel {
    credentials: RemoteCredentials,
}

impl Ssh2Channel {
    pub fn new(credentials: RemoteCredentials) -> Self {
        Self { credentials }
    }

    fn create_session(&self, port: u16) -> Result<Session> {
        let address = format!("{}:{}", self.credentials.host, port);
        let tcp = TcpStream::connect(&address)
            .context(format!("Failed to connect to {}", address))?;
        tcp.set_read_timeout(Some(Duration::from_secs(CONNECT_TIMEOUT_SECS)))
            .context("Failed to set read timeout")?;
        tcp.set_write_timeout(Some(Duration::from_secs(CONNECT_TIMEOUT_SECS)))
            .context("Failed to set write timeout")?;

        let mut session = Session::new().context("Failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .context("Failed to perform SSH handshake")?;
        session
            .userauth_password(&self.credentials.username, &self.credentials.password)
            .context(format!(
                "Password authentication failed for {}@{}",
                self.credentials.username, self.credentials.host
            ))?;
        if !session.authenticated() {
            return Err(anyhow!("Authentication failed"));
        }

        debug!("SSH session established to {}", address);
        Ok(session)
    }
}

impl RemoteShell for Ssh2Channel {
    fn execute(&self, command: &str) -> Result<ExecOutput> {
        let session = self.create_session(self.credentials.shell_port)?;
        let mut channel = session
            .channel_session()
            .context("Failed to open SSH channel")?;

        let wrapped = format!("powershell -NoProfile -NonInteractive -Command {}", command);
        channel
            .exec(&wrapped)
            .context("Failed to execute remote command")?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .context("Failed to read remote stdout")?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .context("Failed to read remote stderr")?;

        channel.wait_close().context("Failed to close SSH channel")?;
        let status = channel
            .exit_status()
            .context("Failed to read remote exit status")?;

        Ok(ExecOutput {
            status,
            stdout,
            stderr,
        })
    }
}

impl FileTransfer for Ssh2Channel {
    fn put(&self, local: &Path, remote: &str) -> Result<()> {
        let session = self.create_session(self.credentials.transfer_port)?;
        let sftp = session.sftp().context("Failed to create SFTP subsystem")?;

        let mut local_file = File::open(local)
            .context(format!("Failed to open local file {}", local.display()))?;
        let size = local_file.metadata()?.len();
        let mut remote_file = sftp
            .create(Path::new(remote))
            .context(format!("Failed to create remote file {}", remote))?;

        let mut buffer = vec![0u8; TRANSFER_CHUNK_SIZE];
        loop {
            let bytes_read = local_file
                .read(&mut buffer)
                .context(format!("Failed to read {}", local.display()))?;
            if bytes_read == 0 {
                break;
            }
            remote_file
                .write_all(&buffer[..bytes_read])
                .context(format!("Failed to write to remote file {}", remote))?;
        }

        info!(
            "Pushed {} ({:.2} MB) to {}",
            local.display(),
            size as f64 / (1024.0 * 1024.0),
            remote
        );
        Ok(())
    }

    fn get(&self, remote: &str, local: &Path) -> Result<()> {
        let session = self.create_session(self.credentials.transfer_port)?;
        let sftp = session.sftp().context("Failed to create SFTP subsystem")?;

        let mut remote_file = sftp
            .open(Path::new(remote))
            .context(format!("Failed to open remote file {}", remote))?;
        let mut local_file = File::create(local)
            .context(format!("Failed to create local file {}", local.display()))?;

        let mut buffer = vec![0u8; TRANSFER_CHUNK_SIZE];
        loop {
            let bytes_read = remote_file
                .read(&mut buffer)
                .context(format!("Failed to read remote file {}", remote))?;
            if bytes_read == 0 {
                break;
            }
            local_file
                .write_all(&buffer[..bytes_read])
                .context(format!("Failed to write {}", local.display()))?;
        }

        info!("Pulled {} to {}", remote, local.display());
        Ok(())
    }
}
