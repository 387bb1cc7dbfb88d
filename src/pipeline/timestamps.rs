//! Timestamp canonicalization.
//!
//! Two passes over each record: known timestamp keys first, then a
//! heuristic sweep over any key whose name suggests it carries a time.
//! A convertible value gets an integer `<key>_epoch` sibling; the original
//! string is kept. Files are rewritten only when at least one conversion
//! happened, so a second run is a no-op.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::info;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::constants::{
    BASIC_INFO_FILENAME, EPOCH_SUFFIX, ISO_TIMESTAMP_FORMAT, KNOWN_TIMESTAMP_KEYS,
    TIME_INDICATOR_WORDS,
};

/// Parse a UTC `YYYY-MM-DDTHH:MM:SSZ` string into epoch seconds.
fn parse_iso_timestamp(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value, ISO_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Whether a key name suggests a timestamp value.
fn looks_like_timestamp_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    TIME_INDICATOR_WORDS.iter().any(|word| lower.contains(word))
}

/// Add epoch siblings to one record. Returns true when anything was added.
fn canonicalize_record(record: &mut Map<String, Value>) -> bool {
    let mut additions: Vec<(String, i64)> = Vec::new();

    for (key, value) in record.iter() {
        if key.ends_with(EPOCH_SUFFIX) {
            continue;
        }
        let epoch_key = format!("{}{}", key, EPOCH_SUFFIX);
        if record.contains_key(&epoch_key) {
            continue;
        }
        let text = match value.as_str() {
            Some(text) => text,
            None => continue,
        };
        let eligible =
            KNOWN_TIMESTAMP_KEYS.contains(&key.as_str()) || looks_like_timestamp_key(key);
        if !eligible {
            continue;
        }
        if let Some(epoch) = parse_iso_timestamp(text) {
            additions.push((epoch_key, epoch));
        }
    }

    let changed = !additions.is_empty();
    for (key, epoch) in additions {
        record.insert(key, Value::from(epoch));
    }
    changed
}

/// Canonicalize one NDJSON file in place. Returns true when rewritten.
pub fn canonicalize_file(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read {}", path.display()))?;

    let mut changed = false;
    let mut output_lines = Vec::new();
    for line in content.lines() {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(mut record)) => {
                if canonicalize_record(&mut record) {
                    changed = true;
                    output_lines.push(serde_json::to_string(&Value::Object(record))?);
                } else {
                    output_lines.push(line.to_string());
                }
            }
            _ => output_lines.push(line.to_string()),
        }
    }

    if changed {
        let mut output = output_lines.join("\n");
        output.push('\n');
        fs::write(path, output)
            .context(format!("Failed to write {}", path.display()))?;
    }
    Ok(changed)
}

/// Canonicalize every result file under `root`. Returns the number of
/// files rewritten.
pub fn canonicalize_tree(root: &Path) -> Result<usize> {
    let mut rewritten = 0;
    for entry in WalkDir::new(root) {
        let entry = entry.context(format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".json") || name == BASIC_INFO_FILENAME {
            continue;
        }
        if canonicalize_file(entry.path())? {
            rewritten += 1;
        }
    }
    info!(
        "Canonicalized timestamps in {} file(s) under {}",
        rewritten,
        root.display()
    );
    Ok(rewritten)
}
