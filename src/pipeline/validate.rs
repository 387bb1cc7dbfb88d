//! Result validation.
//!
//! The validator is strictly read-only: it walks an extracted tree after
//! enrichment, checks every record line, and reports findings without
//! touching a byte. The basic-information file is out of scope.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::Value;
use walkdir::WalkDir;

use crate::constants::{BASIC_INFO_FILENAME, REQUIRED_RECORD_KEYS};
use crate::models::{IssueKind, ValidationIssue};
use crate::pipeline::enrich::source_type_for;

/// Outcome of validating one extracted tree.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub files_checked: usize,
    pub records_checked: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn clean(&self) -> bool {
        self.issues.is_empty()
    }
}

pub struct ResultValidator;

impl ResultValidator {
    /// Validate every enriched result file under `root`.
    pub fn validate_tree(root: &Path) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        for entry in WalkDir::new(root) {
            let entry = entry.context(format!("Failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.ends_with(".json") || name == BASIC_INFO_FILENAME {
                continue;
            }
            Self::validate_file(entry.path(), &mut report)?;
        }

        if report.clean() {
            info!(
                "Validation passed: {} record(s) in {} file(s)",
                report.records_checked, report.files_checked
            );
        } else {
            warn!(
                "Validation found {} issue(s) across {} file(s)",
                report.issues.len(),
                report.files_checked
            );
        }
        Ok(report)
    }

    fn validate_file(path: &Path, report: &mut ValidationReport) -> Result<()> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read {}", path.display()))?;
        report.files_checked += 1;

        let expected_source_type = source_type_for(path);
        let file = path.display().to_string();

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_number = index + 1;
            report.records_checked += 1;

            let record = match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(record)) => record,
                Ok(_) | Err(_) => {
                    report.issues.push(ValidationIssue {
                        file: file.clone(),
                        line: line_number,
                        kind: IssueKind::InvalidJson,
                        detail: "line is not a JSON object".to_string(),
                    });
                    continue;
                }
            };

            if let Some(actual) = record.get("source_type").and_then(Value::as_str) {
                if actual != expected_source_type {
                    report.issues.push(ValidationIssue {
                        file: file.clone(),
                        line: line_number,
                        kind: IssueKind::SourceTypeMismatch,
                        detail: format!(
                            "source_type is '{}', expected '{}'",
                            actual, expected_source_type
                        ),
                    });
                }
            }

            let missing: Vec<&str> = REQUIRED_RECORD_KEYS
                .iter()
                .copied()
                .filter(|key| !record.contains_key(*key))
                .collect();
            if !missing.is_empty() {
                report.issues.push(ValidationIssue {
                    file: file.clone(),
                    line: line_number,
                    kind: IssueKind::MissingKeys,
                    detail: format!("missing required key(s): {}", missing.join(", ")),
                });
            }

            for key in REQUIRED_RECORD_KEYS {
                if let Some(value) = record.get(*key) {
                    if is_empty_value(value) {
                        report.issues.push(ValidationIssue {
                            file: file.clone(),
                            line: line_number,
                            kind: IssueKind::EmptyRequiredValue,
                            detail: format!("required key '{}' has an empty value", key),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

// Only null and the empty string count as empty. An empty array is a
// legitimate value (a host can have no MAC addresses).
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
