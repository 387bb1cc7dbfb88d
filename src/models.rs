use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Per-artifact progress through the orchestration steps.
///
/// `Failed` is absorbing: once an artifact fails a step it is never retried
/// and no earlier step is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactState {
    SpecCreated,
    Built,
    Pushed,
    Executed,
    Verified,
    Done,
    Failed,
}

/// Outcome of one artifact run, kept for batch statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactOutcome {
    pub name: String,
    /// Wall-clock seconds from spec creation to the terminal state.
    pub execution_time: f64,
    /// Local completion time, `HH:MM:SS`.
    pub completed_at: String,
}

/// Aggregated statistics for a finished batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub successful: Vec<ArtifactOutcome>,
    pub failed: Vec<ArtifactOutcome>,
}

impl BatchStats {
    pub fn record(&mut self, outcome: ArtifactOutcome, success: bool) {
        if success {
            self.successful.push(outcome);
        } else {
            self.failed.push(outcome);
        }
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Fraction of artifacts that completed, 0.0 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.successful.len() as f64 / self.total() as f64
    }

    pub fn total_time(&self) -> f64 {
        self.successful
            .iter()
            .chain(self.failed.iter())
            .map(|o| o.execution_time)
            .sum()
    }

    pub fn average_time(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.total_time() / self.total() as f64
    }
}

/// Severity of a status event, so consumers can filter failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Error,
}

/// One entry in the coordinator's append-only status stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub message: String,
    /// Local time the event was recorded, `HH:MM:SS`.
    pub timestamp: String,
    pub severity: Severity,
    /// Elapsed time since the previous event, e.g. `"(took 1.42s)"`; empty
    /// for the first event of a run.
    pub elapsed: String,
}

impl StatusEvent {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Record of one file push, valid only when both hashes match.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub local_size: u64,
    pub remote_size: u64,
    pub local_sha256: String,
    pub remote_sha256: String,
}

impl TransferRecord {
    /// Both size and hash must agree; anything else means the push failed.
    pub fn verified(&self) -> bool {
        self.local_size == self.remote_size
            && self.local_sha256.eq_ignore_ascii_case(&self.remote_sha256)
    }
}

/// Metadata parsed from a bundle filename, best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMeta {
    pub fqdn: Option<String>,
    pub timestamp: Option<String>,
}

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    InvalidJson,
    SourceTypeMismatch,
    MissingKeys,
    EmptyRequiredValue,
}

/// One diagnostic produced by the result validator.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub file: String,
    pub line: usize,
    pub kind: IssueKind,
    pub detail: String,
}
