//! Batch orchestration tests driven through hand-written remote fakes, so
//! a full run (spec, build, push, execute, verify, pull, normalize) works
//! end to end without a network or an external build tool.

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

use collector_harness::batch::BatchCoordinator;
use collector_harness::builder::{CommandRunner, ProcessOutput};
use collector_harness::config::{BuilderConfig, HarnessConfig};
use collector_harness::models::ArtifactState;
use collector_harness::remote::{ExecOutput, FileTransfer, RemoteShell};
use collector_harness::utils::hash::sha256_file;

const TEMPLATE: &str = "autoexec:\n\
     # The list of artifacts and their args.\n\
     Artifacts:\n\
     # Can be ZIP or other formats\n\
     target: output\n";

const BASIC_INFO: &str = concat!(
    r#"{"Hostname":"host1","OS":"windows","Platform":"Windows Server 2022","#,
    r#""PlatformVersion":"10.0.20348","Fqdn":"host1.example.com","MACAddresses":["aa:bb"]}"#,
);

fn harness_config(dir: &TempDir) -> HarnessConfig {
    let base = dir.path();
    fs::write(base.join("template.yaml"), TEMPLATE).unwrap();
    fs::write(base.join("velociraptor.exe"), b"tool").unwrap();
    fs::write(base.join("server.config.yaml"), b"cfg").unwrap();
    fs::create_dir_all(base.join("datastore")).unwrap();

    HarnessConfig {
        template_path: base.join("template.yaml"),
        specs_dir: base.join("specs"),
        runtime_dir: base.join("runtime"),
        extracted_dir: base.join("extracted"),
        builder: BuilderConfig {
            binary_path: base.join("velociraptor.exe"),
            server_config: base.join("server.config.yaml"),
            datastore: None,
            built_collector_path: base.join("datastore").join("built.exe"),
            collectors_dir: base.join("collectors"),
        },
    }
}

/// Build tool fake: always exits zero and drops the output artifact where
/// the real tool would.
struct FakeRunner {
    output: PathBuf,
}

impl CommandRunner for FakeRunner {
    fn run(&self, _program: &Path, _args: &[String]) -> Result<ProcessOutput> {
        fs::write(&self.output, b"collector bytes")?;
        Ok(ProcessOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Remote host fake. Verification commands answer with the size and hash
/// of the locally built collector, except for names listed in
/// `corrupted`, which report a wrong hash.
struct FakeShell {
    collectors_dir: PathBuf,
    corrupted: Vec<&'static str>,
    bundle_names: Vec<&'static str>,
}

impl FakeShell {
    fn local_exe_for(&self, cmd: &str) -> PathBuf {
        let name = cmd
            .split('\'')
            .nth(1)
            .and_then(|p| p.rsplit('\\').next())
            .unwrap_or_default();
        self.collectors_dir.join(name)
    }
}

impl RemoteShell for FakeShell {
    fn execute(&self, cmd: &str) -> Result<ExecOutput> {
        let ok = |stdout: String| {
            Ok(ExecOutput {
                status: 0,
                stdout,
                stderr: String::new(),
            })
        };
        if cmd.contains("Get-FileHash") {
            if self.corrupted.iter().any(|name| cmd.contains(name)) {
                return ok("deadbeef".to_string());
            }
            return ok(sha256_file(&self.local_exe_for(cmd))?);
        }
        if cmd.contains("Get-Item") {
            return ok(fs::metadata(self.local_exe_for(cmd))?.len().to_string());
        }
        if cmd.contains("$ErrorActionPreference") {
            return ok("Success".to_string());
        }
        if cmd.contains("Test-Path") {
            return ok("True".to_string());
        }
        if cmd.contains("Get-ChildItem") {
            let listing = self
                .bundle_names
                .iter()
                .map(|name| format!("C:\\Windows\\Temp\\{}", name))
                .collect::<Vec<_>>()
                .join("\r\n");
            return ok(listing);
        }
        // Start-Sleep, Remove-Item cleanup
        ok(String::new())
    }
}

/// Transfer fake: pushes succeed silently; pulled logs end cleanly and
/// pulled bundles are real zip archives.
struct FakeTransfer {
    bundle_bytes: Vec<u8>,
}

impl FileTransfer for FakeTransfer {
    fn put(&self, _local: &Path, _remote: &str) -> Result<()> {
        Ok(())
    }

    fn get(&self, remote: &str, local: &Path) -> Result<()> {
        if remote.ends_with(".log") {
            fs::write(local, b"collecting artifacts\nExiting\n")?;
        } else {
            fs::write(local, &self.bundle_bytes)?;
        }
        Ok(())
    }
}

fn bundle_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut cursor);
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

#[test]
fn full_run_collects_pulls_and_normalizes() {
    let dir = TempDir::new().unwrap();
    let config = harness_config(&dir);
    let runner = FakeRunner {
        output: config.builder.built_collector_path.clone(),
    };
    let shell = FakeShell {
        collectors_dir: config.builder.collectors_dir.clone(),
        corrupted: vec![],
        bundle_names: vec!["Collection--host1.example.com--20240102.zip"],
    };
    let transfer = FakeTransfer {
        bundle_bytes: bundle_bytes(&[
            (
                "results/Generic.Client.Info.BasicInformation.json",
                &format!("{}\n", BASIC_INFO),
            ),
            (
                "results/Windows%2FSys%2FInfo.json",
                "{\"CreatedTime\":\"2024-01-02T03:04:05Z\"}\n",
            ),
        ]),
    };

    let coordinator = BatchCoordinator::new(&config, &runner, &shell, &transfer);
    let report = coordinator
        .run_batch(&["Windows.Sys.Info".to_string()])
        .unwrap();

    assert!(report.success(), "failed: {:?}", report);
    assert_eq!(report.stats.successful.len(), 1);
    assert_eq!(report.pipeline.processed.len(), 1);

    let tree = &report.pipeline.processed[0].extracted_to;
    let result = fs::read_to_string(tree.join("results/Windows.Sys.Info.json")).unwrap();
    assert!(result.contains("\"source_type\":\"Info\""));
    assert!(result.contains("\"Hostname\":\"host1\""));
    assert!(result.contains("\"CreatedTime_epoch\":1704164645"));
}

#[test]
fn corrupted_push_fails_artifact_but_not_batch() {
    let dir = TempDir::new().unwrap();
    let config = harness_config(&dir);
    let runner = FakeRunner {
        output: config.builder.built_collector_path.clone(),
    };
    let shell = FakeShell {
        collectors_dir: config.builder.collectors_dir.clone(),
        corrupted: vec!["collector_B_Bad.exe"],
        bundle_names: vec![],
    };
    let transfer = FakeTransfer {
        bundle_bytes: Vec::new(),
    };

    let coordinator = BatchCoordinator::new(&config, &runner, &shell, &transfer);
    let artifacts = vec![
        "A.Good".to_string(),
        "B.Bad".to_string(),
        "C.Good".to_string(),
    ];
    let report = coordinator.run_batch(&artifacts).unwrap();

    assert_eq!(report.stats.successful.len(), 2);
    assert_eq!(report.stats.failed.len(), 1);
    assert_eq!(report.stats.failed[0].name, "B.Bad");
    assert!(!report.success());

    let states = coordinator.status().snapshot().states;
    assert_eq!(states["A.Good"], ArtifactState::Done);
    assert_eq!(states["B.Bad"], ArtifactState::Failed);
    assert_eq!(states["C.Good"], ArtifactState::Done);

    // No bundles on the remote host is not an error.
    assert!(report.pipeline.processed.is_empty());
    assert!(report.pipeline.failed.is_empty());
}

#[test]
fn status_stream_carries_the_whole_run() {
    let dir = TempDir::new().unwrap();
    let config = harness_config(&dir);
    let runner = FakeRunner {
        output: config.builder.built_collector_path.clone(),
    };
    let shell = FakeShell {
        collectors_dir: config.builder.collectors_dir.clone(),
        corrupted: vec![],
        bundle_names: vec![],
    };
    let transfer = FakeTransfer {
        bundle_bytes: Vec::new(),
    };

    let coordinator = BatchCoordinator::new(&config, &runner, &shell, &transfer);
    let board = coordinator.status();
    coordinator.run_batch(&["A.One".to_string()]).unwrap();

    let events = board.drain_pending();
    assert!(!events.is_empty());
    assert!(events
        .iter()
        .any(|e| e.message.contains("Processing artifact A.One")));
    assert!(events.iter().all(|e| !e.is_error()));
    // Permanent log retains everything after the drain.
    assert_eq!(board.snapshot().events.len(), events.len());
    assert!(board.drain_pending().is_empty());
}
