//! Harness configuration.
//!
//! Paths and directories come from an optional YAML file with defaults
//! matching the conventional repo layout; remote credentials come from the
//! environment, are loaded once per run, never persisted, and are redacted
//! in debug output.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Environment variable names for remote credentials.
const ENV_HOST: &str = "REMOTE_HOST";
const ENV_USERNAME: &str = "REMOTE_USERNAME";
const ENV_PASSWORD: &str = "REMOTE_PASSWORD";
const ENV_SHELL_PORT: &str = "REMOTE_SHELL_PORT";
const ENV_TRANSFER_PORT: &str = "REMOTE_TRANSFER_PORT";

/// External build tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Path to the build tool binary.
    pub binary_path: PathBuf,
    /// Server config file passed to the tool via `--config`.
    pub server_config: PathBuf,
    /// Optional datastore directory passed via `--datastore`.
    pub datastore: Option<PathBuf>,
    /// Where the tool writes its output artifact. The tool defines this
    /// location; the harness only checks and relocates.
    pub built_collector_path: PathBuf,
    /// Directory built collectors are relocated into.
    pub collectors_dir: PathBuf,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("binaries/velociraptor-v0.72.4-windows-amd64.exe"),
            server_config: PathBuf::from("datastore/server.config.yaml"),
            datastore: Some(PathBuf::from("datastore")),
            built_collector_path: PathBuf::from(
                "datastore/Collector_velociraptor-v0.72.4-windows-amd64.exe",
            ),
            collectors_dir: PathBuf::from("collectors"),
        }
    }
}

/// Top-level harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Spec template document.
    pub template_path: PathBuf,
    /// Generated spec files.
    pub specs_dir: PathBuf,
    /// Pulled remote files (logs, bundles).
    pub runtime_dir: PathBuf,
    /// Extracted bundle trees.
    pub extracted_dir: PathBuf,
    pub builder: BuilderConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("specs/test.yaml"),
            specs_dir: PathBuf::from("testing_specs"),
            runtime_dir: PathBuf::from("runtime"),
            extracted_dir: PathBuf::from("runtime_zip"),
            builder: BuilderConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file, or defaults when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .context(format!("Failed to read config file {}", path.display()))?;
                let config: HarnessConfig = serde_yaml::from_str(&content)
                    .context(format!("Failed to parse config file {}", path.display()))?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => Ok(HarnessConfig::default()),
        }
    }

    /// All working directories the batch owns.
    pub fn working_dirs(&self) -> Vec<&Path> {
        vec![
            &self.specs_dir,
            &self.builder.collectors_dir,
            &self.runtime_dir,
            &self.extracted_dir,
        ]
    }
}

/// Credentials for the remote target host.
///
/// `Debug` is implemented by hand so the password can never leak into logs.
#[derive(Clone)]
pub struct RemoteCredentials {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Port for the command-execution capability.
    pub shell_port: u16,
    /// Port for the file-transfer capability.
    pub transfer_port: u16,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("shell_port", &self.shell_port)
            .field("transfer_port", &self.transfer_port)
            .finish()
    }
}

impl RemoteCredentials {
    /// Load credentials from the environment, failing on any missing
    /// required variable before a remote action is attempted.
    pub fn from_env() -> Result<Self> {
        let host = env::var(ENV_HOST).unwrap_or_default();
        let username = env::var(ENV_USERNAME).unwrap_or_default();
        let password = env::var(ENV_PASSWORD).unwrap_or_default();

        let mut missing = Vec::new();
        if host.is_empty() {
            missing.push(ENV_HOST);
        }
        if username.is_empty() {
            missing.push(ENV_USERNAME);
        }
        if password.is_empty() {
            missing.push(ENV_PASSWORD);
        }
        if !missing.is_empty() {
            return Err(anyhow!(
                "Missing required credentials: {}",
                missing.join(", ")
            ));
        }

        Ok(Self {
            host,
            username,
            password,
            shell_port: parse_port(ENV_SHELL_PORT, 22)?,
            transfer_port: parse_port(ENV_TRANSFER_PORT, 22)?,
        })
    }
}

fn parse_port(var: &str, default: u16) -> Result<u16> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u16>()
            .context(format!("Invalid port in {}: {}", var, value)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_layout() {
        let config = HarnessConfig::default();
        assert_eq!(config.specs_dir, PathBuf::from("testing_specs"));
        assert_eq!(config.runtime_dir, PathBuf::from("runtime"));
        assert_eq!(config.extracted_dir, PathBuf::from("runtime_zip"));
        assert_eq!(config.builder.collectors_dir, PathBuf::from("collectors"));
        assert_eq!(config.working_dirs().len(), 4);
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harness.yaml");
        fs::write(
            &path,
            "template_path: custom/template.yaml\nbuilder:\n  datastore: null\n",
        )
        .unwrap();

        let config = HarnessConfig::load(Some(&path)).unwrap();
        assert_eq!(config.template_path, PathBuf::from("custom/template.yaml"));
        assert!(config.builder.datastore.is_none());
        // Untouched fields fall back to defaults.
        assert_eq!(config.runtime_dir, PathBuf::from("runtime"));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(HarnessConfig::load(Some(Path::new("/no/such/file.yaml"))).is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = RemoteCredentials {
            host: "host1".to_string(),
            username: "admin".to_string(),
            password: "hunter2".to_string(),
            shell_port: 22,
            transfer_port: 22,
        };
        let output = format!("{:?}", creds);
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("hunter2"));
    }
}
