//! Record enrichment.
//!
//! Every result record gets a `source_type` derived from its filename and
//! the host-identity fields found in the bundle's basic-information file.
//! Result files are newline-delimited JSON; lines that do not parse as
//! objects pass through untouched. The basic-information file itself is
//! never enriched.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::constants::{
    BASIC_INFO_FILENAME, ESCAPED_SLASH, SYSTEM_INFO_KEYS, UNKNOWN_SOURCE_TYPE,
};

/// Host-identity fields harvested from the basic-information file.
pub type SystemInfo = Map<String, Value>;

/// Locate the basic-information file under `root` and harvest the
/// host-identity keys from it.
///
/// A missing or unreadable file yields an empty map with a warning; the
/// validator reports the resulting gaps per record.
pub fn load_system_info(root: &Path) -> SystemInfo {
    let path = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == BASIC_INFO_FILENAME)
        .map(|e| e.path().to_path_buf());

    let path = match path {
        Some(path) => path,
        None => {
            warn!("No {} found under {}", BASIC_INFO_FILENAME, root.display());
            return SystemInfo::new();
        }
    };

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return SystemInfo::new();
        }
    };

    let mut info = SystemInfo::new();
    for line in content.lines() {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => continue,
        };
        for key in SYSTEM_INFO_KEYS {
            if !info.contains_key(*key) {
                if let Some(found) = find_key(&value, key) {
                    info.insert((*key).to_string(), found.clone());
                }
            }
        }
    }

    debug!(
        "Harvested {} host-identity field(s) from {}",
        info.len(),
        path.display()
    );
    info
}

/// First occurrence of `key` anywhere in `value`, depth-first.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                return Some(found);
            }
            map.values().find_map(|v| find_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// Derive a record source type from a result filename.
///
/// `Windows.System.PowerShell.json` yields `PowerShell`; names without a
/// usable dotted segment yield `Unknown`. Escaped separators still count
/// as dots, so a file whose desanitization rename was skipped derives the
/// same source type as its renamed form.
pub fn source_type_for(path: &Path) -> String {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.replace(ESCAPED_SLASH, "."),
        None => return UNKNOWN_SOURCE_TYPE.to_string(),
    };
    let stem = name.strip_suffix(".json").unwrap_or(&name);
    match stem.rsplit('.').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => UNKNOWN_SOURCE_TYPE.to_string(),
    }
}

/// Enrich one NDJSON result file in place. Returns true when any line was
/// rewritten.
pub fn enrich_file(path: &Path, system_info: &SystemInfo) -> Result<bool> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read {}", path.display()))?;
    let source_type = source_type_for(path);

    let mut changed = false;
    let mut output_lines = Vec::new();
    for line in content.lines() {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(mut record)) => {
                record.insert("source_type".to_string(), Value::String(source_type.clone()));
                for (key, value) in system_info {
                    record.insert(key.clone(), value.clone());
                }
                let rewritten = serde_json::to_string(&Value::Object(record))?;
                if rewritten != line {
                    changed = true;
                }
                output_lines.push(rewritten);
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

/// Enrich every result file under `root`. Returns the number of files
/// rewritten.
pub fn enrich_tree(root: &Path, system_info: &SystemInfo) -> Result<usize> {
    let mut enriched = 0;
    for entry in WalkDir::new(root) {
        let entry = entry.context(format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".json") || name == BASIC_INFO_FILENAME {
            continue;
        }
        if enrich_file(entry.path(), system_info)? {
            enriched += 1;
        }
    }
    info!("Enriched {} result file(s) under {}", enriched, root.display());
    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_source_type_for() {
        assert_eq!(
            source_type_for(Path::new("Windows.System.PowerShell.json")),
            "PowerShell"
        );
        assert_eq!(source_type_for(Path::new("simple.json")), "simple");
        assert_eq!(source_type_for(Path::new(".json")), "Unknown");
    }

    #[test]
    fn test_source_type_for_escaped_name() {
        // A file left with escaped separators (rename skipped because the
        // target already existed) still derives the dotted source type.
        assert_eq!(
            source_type_for(Path::new("Windows%2FSystem%2FPowerShell.json")),
            "PowerShell"
        );
    }

    #[test]
    fn test_load_system_info_nested() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(BASIC_INFO_FILENAME),
            r#"{"Name":"BasicInformation","Data":{"Hostname":"host1","OS":"windows","Platform":"Windows Server","PlatformVersion":"10.0","Fqdn":"host1.example.com","MACAddresses":["aa:bb"]}}"#,
        )
        .unwrap();

        let info = load_system_info(dir.path());
        assert_eq!(info.get("Hostname"), Some(&json!("host1")));
        assert_eq!(info.get("MACAddresses"), Some(&json!(["aa:bb"])));
        assert_eq!(info.len(), 6);
    }

    #[test]
    fn test_load_system_info_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_system_info(dir.path()).is_empty());
    }

    #[test]
    fn test_enrich_file_sets_source_type_and_identity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.B.C.json");
        fs::write(&path, "{\"x\":1}\n").unwrap();

        let mut info = SystemInfo::new();
        info.insert("Hostname".to_string(), json!("host1"));

        assert!(enrich_file(&path, &info).unwrap());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "{\"x\":1,\"source_type\":\"C\",\"Hostname\":\"host1\"}\n"
        );
    }

    #[test]
    fn test_enrich_overwrites_existing_identity_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.json");
        fs::write(&path, "{\"Hostname\":\"stale\"}\n").unwrap();

        let mut info = SystemInfo::new();
        info.insert("Hostname".to_string(), json!("fresh"));

        enrich_file(&path, &info).unwrap();
        let record: Value =
            serde_json::from_str(fs::read_to_string(&path).unwrap().lines().next().unwrap())
                .unwrap();
        assert_eq!(record["Hostname"], json!("fresh"));
    }

    #[test]
    fn test_enrich_passes_through_non_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.json");
        fs::write(&path, "not json\n{\"x\":1}\n").unwrap();

        enrich_file(&path, &SystemInfo::new()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("not json"));
        assert!(lines.next().unwrap().contains("source_type"));
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.B.json");
        fs::write(&path, "{\"x\":1}\n").unwrap();

        let mut info = SystemInfo::new();
        info.insert("Hostname".to_string(), json!("host1"));

        assert!(enrich_file(&path, &info).unwrap());
        let first = fs::read_to_string(&path).unwrap();
        assert!(!enrich_file(&path, &info).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_enrich_tree_skips_basic_info() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(BASIC_INFO_FILENAME),
            "{\"Hostname\":\"host1\"}\n",
        )
        .unwrap();
        fs::write(dir.path().join("A.B.json"), "{\"x\":1}\n").unwrap();

        let info = load_system_info(dir.path());
        let enriched = enrich_tree(dir.path(), &info).unwrap();
        assert_eq!(enriched, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join(BASIC_INFO_FILENAME)).unwrap(),
            "{\"Hostname\":\"host1\"}\n"
        );
    }
}
