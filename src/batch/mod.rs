//! Batch orchestration.
//!
//! The coordinator drives each artifact through the full sequence (spec,
//! build, push, execute, verify) strictly in order, then pulls and
//! normalizes the collected bundles in one pass at the end. Artifacts are
//! independent: a failure marks that artifact failed and moves on. A
//! cooperative stop flag is checked between artifacts only, so no step is
//! ever interrupted midway.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{error, info, warn};

use crate::builder::{CollectorBuilder, CommandRunner};
use crate::config::HarnessConfig;
use crate::constants::REMOTE_TEMP_DIR;
use crate::models::{ArtifactOutcome, ArtifactState, BatchStats, Severity, StatusEvent};
use crate::pipeline::{self, PipelineSummary};
use crate::remote::executor::verify_log_output;
use crate::remote::{push_and_verify, BundlePuller, FileTransfer, RemoteExecutor, RemoteShell};
use crate::spec::SpecAssembler;
use crate::utils::fs::recreate_dir;

/// Mutable run state behind the status board.
#[derive(Debug, Default)]
struct RunStatus {
    events: Vec<StatusEvent>,
    states: HashMap<String, ArtifactState>,
    stats: BatchStats,
    last_event_at: Option<Instant>,
}

/// Point-in-time copy of the run state, safe to hold across steps.
#[derive(Debug, Clone, Default)]
pub struct RunSnapshot {
    pub events: Vec<StatusEvent>,
    pub states: HashMap<String, ArtifactState>,
    pub stats: BatchStats,
}

/// Shared, cloneable view of a running batch.
///
/// Events are appended to the permanent log and mirrored into a pending
/// queue that consumers drain incrementally.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<Mutex<RunStatus>>,
    pending_tx: Sender<StatusEvent>,
    pending_rx: Receiver<StatusEvent>,
    stop: Arc<AtomicBool>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (pending_tx, pending_rx) = unbounded();
        Self {
            inner: Arc::new(Mutex::new(RunStatus::default())),
            pending_tx,
            pending_rx,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunStatus> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append a status event, stamping local time and elapsed-since-last.
    pub fn push(&self, message: impl Into<String>, severity: Severity) {
        let now = Instant::now();
        let mut status = self.lock();
        let elapsed = match status.last_event_at {
            Some(previous) => format!("(took {:.2}s)", (now - previous).as_secs_f64()),
            None => String::new(),
        };
        status.last_event_at = Some(now);

        let event = StatusEvent {
            message: message.into(),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            severity,
            elapsed,
        };
        status.events.push(event.clone());
        // Receiver is held by self, so the channel cannot be disconnected.
        let _ = self.pending_tx.send(event);
    }

    pub fn set_state(&self, artifact: &str, state: ArtifactState) {
        self.lock().states.insert(artifact.to_string(), state);
    }

    pub fn record_outcome(&self, outcome: ArtifactOutcome, success: bool) {
        self.lock().stats.record(outcome, success);
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let status = self.lock();
        RunSnapshot {
            events: status.events.clone(),
            states: status.states.clone(),
            stats: status.stats.clone(),
        }
    }

    /// Take all events queued since the last drain. The permanent event log
    /// is unaffected.
    pub fn drain_pending(&self) -> Vec<StatusEvent> {
        self.pending_rx.try_iter().collect()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Final result of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub stats: BatchStats,
    pub pipeline: PipelineSummary,
    /// True when the run ended early on a stop request.
    pub stopped: bool,
}

impl BatchReport {
    /// Every artifact completed and every pulled record validated.
    pub fn success(&self) -> bool {
        !self.stopped && self.stats.failed.is_empty() && self.pipeline.all_clean()
    }
}

pub struct BatchCoordinator<'a> {
    config: &'a HarnessConfig,
    runner: &'a dyn CommandRunner,
    shell: &'a dyn RemoteShell,
    transfer: &'a dyn FileTransfer,
    status: StatusBoard,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        runner: &'a dyn CommandRunner,
        shell: &'a dyn RemoteShell,
        transfer: &'a dyn FileTransfer,
    ) -> Self {
        Self {
            config,
            runner,
            shell,
            transfer,
            status: StatusBoard::new(),
        }
    }

    /// Handle for observing and stopping this run from another thread.
    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Run each artifact independently, then pull and normalize bundles.
    pub fn run_batch(&self, artifacts: &[String]) -> Result<BatchReport> {
        self.prepare(artifacts.len())?;

        let mut stopped = false;
        for artifact in artifacts {
            if self.status.stop_requested() {
                self.status
                    .push("Stop requested, aborting remaining artifacts", Severity::Info);
                stopped = true;
                break;
            }
            self.run_one(artifact);
        }

        self.finish(stopped)
    }

    /// Run every artifact through one combined spec and a single collector.
    pub fn run_combined(&self, artifacts: &[String]) -> Result<BatchReport> {
        self.prepare(artifacts.len())?;

        let name = format!("profile_artifacts_{}", Local::now().format("%Y%m%d_%H%M%S"));
        let started = Instant::now();
        let success = match self.run_combined_inner(artifacts, &name) {
            Ok(()) => true,
            Err(e) => {
                error!("Combined run {} failed: {:#}", name, e);
                self.status
                    .push(format!("Combined run failed: {:#}", e), Severity::Error);
                self.status.set_state(&name, ArtifactState::Failed);
                false
            }
        };
        self.status.record_outcome(
            ArtifactOutcome {
                name,
                execution_time: started.elapsed().as_secs_f64(),
                completed_at: Local::now().format("%H:%M:%S").to_string(),
            },
            success,
        );

        self.finish(false)
    }

    fn prepare(&self, count: usize) -> Result<()> {
        self.status
            .push(format!("Starting batch of {} artifact(s)", count), Severity::Info);
        for dir in self.config.working_dirs() {
            recreate_dir(dir)?;
        }
        // Leftovers from an earlier run would be pulled as this run's output.
        BundlePuller::new(self.shell, self.transfer).cleanup_remote();
        Ok(())
    }

    fn run_one(&self, artifact: &str) {
        let started = Instant::now();
        self.status
            .push(format!("Processing artifact {}", artifact), Severity::Info);

        let success = match self.run_steps(artifact) {
            Ok(()) => {
                self.status.set_state(artifact, ArtifactState::Done);
                self.status
                    .push(format!("Artifact {} completed", artifact), Severity::Info);
                true
            }
            Err(e) => {
                error!("Artifact {} failed: {:#}", artifact, e);
                self.status.set_state(artifact, ArtifactState::Failed);
                self.status
                    .push(format!("Artifact {} failed: {:#}", artifact, e), Severity::Error);
                false
            }
        };

        self.status.record_outcome(
            ArtifactOutcome {
                name: artifact.to_string(),
                execution_time: started.elapsed().as_secs_f64(),
                completed_at: Local::now().format("%H:%M:%S").to_string(),
            },
            success,
        );
    }

    fn run_steps(&self, artifact: &str) -> Result<()> {
        let assembler = SpecAssembler::new(&self.config.template_path, &self.config.specs_dir);
        let spec_path = assembler.create_spec(artifact)?;
        self.status.set_state(artifact, ArtifactState::SpecCreated);

        let exe_path = self.build_collector(artifact, &spec_path)?;
        self.status.set_state(artifact, ArtifactState::Built);

        self.push_execute_verify(artifact, &exe_path)
    }

    fn run_combined_inner(&self, artifacts: &[String], name: &str) -> Result<()> {
        let assembler = SpecAssembler::new(&self.config.template_path, &self.config.specs_dir);
        let spec_path = assembler.create_combined_spec(artifacts, name)?;
        self.status.set_state(name, ArtifactState::SpecCreated);

        let exe_path = self.build_collector(name, &spec_path)?;
        self.status.set_state(name, ArtifactState::Built);

        self.push_execute_verify(name, &exe_path)
    }

    fn build_collector(&self, name: &str, spec_path: &Path) -> Result<std::path::PathBuf> {
        CollectorBuilder::new(&self.config.builder, self.runner).build(name, spec_path)
    }

    fn push_execute_verify(&self, name: &str, exe_path: &Path) -> Result<()> {
        let exe_name = exe_path
            .file_name()
            .and_then(|n| n.to_str())
            .context("Collector path has no filename")?;
        let remote_exe = format!("{}\\{}", REMOTE_TEMP_DIR, exe_name);
        let remote_log = format!(
            "{}\\{}",
            REMOTE_TEMP_DIR,
            exe_name.replace(".exe", ".log")
        );

        push_and_verify(self.transfer, self.shell, exe_path, &remote_exe)?;
        self.status.set_state(name, ArtifactState::Pushed);

        let executor = RemoteExecutor::new(self.shell, self.transfer);
        executor.run_collector(&remote_exe, &remote_log)?;
        self.status.set_state(name, ArtifactState::Executed);

        let log_path = executor.pull_log(&remote_log, &self.config.runtime_dir)?;
        verify_log_output(&log_path)?;
        self.status.set_state(name, ArtifactState::Verified);
        Ok(())
    }

    /// Pull bundles, run the normalization pipeline, and clean the remote
    /// temp directory.
    fn finish(&self, stopped: bool) -> Result<BatchReport> {
        let puller = BundlePuller::new(self.shell, self.transfer);

        let pipeline = if stopped {
            PipelineSummary::default()
        } else {
            let bundles = match puller.pull_bundles(&self.config.runtime_dir) {
                Ok(bundles) => bundles,
                Err(e) => {
                    warn!("Bundle pull failed: {:#}", e);
                    self.status
                        .push(format!("Bundle pull failed: {:#}", e), Severity::Error);
                    Vec::new()
                }
            };
            self.status
                .push(format!("Pulled {} bundle(s)", bundles.len()), Severity::Info);
            pipeline::process_bundles(&bundles, &self.config.extracted_dir)
        };

        puller.cleanup_remote();

        let stats = self.status.snapshot().stats;
        info!(
            "Batch finished: {}/{} artifact(s) succeeded ({:.0}% in {:.2}s)",
            stats.successful.len(),
            stats.total(),
            stats.success_rate() * 100.0,
            stats.total_time()
        );
        self.status.push(
            format!(
                "Batch finished: {}/{} succeeded",
                stats.successful.len(),
                stats.total()
            ),
            if stats.failed.is_empty() {
                Severity::Info
            } else {
                Severity::Error
            },
        );

        Ok(BatchReport {
            stats,
            pipeline,
            stopped,
        })
    }
}
