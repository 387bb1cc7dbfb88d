//! Bundle extraction and filename metadata.
//!
//! Collection bundles are zip archives named
//! `Collection--<fqdn>--<timestamp>.zip`. Each extracts into its own
//! directory named after the archive stem, so two bundles never share a
//! tree.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use zip::ZipArchive;

use crate::models::BundleMeta;

lazy_static! {
    static ref BUNDLE_NAME_RE: Regex =
        Regex::new(r"^Collection--(.+)--(.+)\.zip$").unwrap();
}

/// Parse host and timestamp out of a bundle filename.
///
/// Non-conforming names produce empty metadata rather than an error; the
/// pipeline still processes such bundles.
pub fn parse_bundle_meta(bundle_path: &Path) -> BundleMeta {
    let name = bundle_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    match BUNDLE_NAME_RE.captures(name) {
        Some(caps) => BundleMeta {
            fqdn: Some(caps[1].to_string()),
            timestamp: Some(caps[2].to_string()),
        },
        None => BundleMeta {
            fqdn: None,
            timestamp: None,
        },
    }
}

/// Extract a bundle into `<output_dir>/<archive stem>/`.
///
/// Returns the extraction root. Entries with unsafe paths (absolute or
/// escaping the root) fail the extraction.
pub fn extract_bundle(bundle_path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let stem = bundle_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Invalid bundle filename: {}", bundle_path.display()))?;
    let target = output_dir.join(stem);
    fs::create_dir_all(&target)
        .context(format!("Failed to create {}", target.display()))?;

    let file = File::open(bundle_path)
        .context(format!("Failed to open bundle {}", bundle_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .context(format!("Failed to read bundle {}", bundle_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .context(format!("Failed to read entry {} in {}", i, bundle_path.display()))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| {
                anyhow!(
                    "Unsafe path {:?} in bundle {}",
                    entry.name(),
                    bundle_path.display()
                )
            })?
            .to_path_buf();
        let out_path = target.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .context(format!("Failed to create {}", out_path.display()))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create {}", parent.display()))?;
            }
            let mut out_file = File::create(&out_path)
                .context(format!("Failed to create {}", out_path.display()))?;
            io::copy(&mut entry, &mut out_file)
                .context(format!("Failed to extract {}", out_path.display()))?;
        }
        debug!("Extracted {}", out_path.display());
    }

    info!(
        "Extracted {} ({} entries) to {}",
        bundle_path.display(),
        archive.len(),
        target.display()
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn make_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, FileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_parse_bundle_meta() {
        let meta = parse_bundle_meta(Path::new("Collection--host1.example.com--2024-01-02T03_04_05Z.zip"));
        assert_eq!(meta.fqdn.as_deref(), Some("host1.example.com"));
        assert_eq!(meta.timestamp.as_deref(), Some("2024-01-02T03_04_05Z"));
    }

    #[test]
    fn test_parse_bundle_meta_nonconforming() {
        let meta = parse_bundle_meta(Path::new("whatever.zip"));
        assert!(meta.fqdn.is_none());
        assert!(meta.timestamp.is_none());
    }

    #[test]
    fn test_extract_into_stem_directory() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("Collection--h--t.zip");
        make_zip(
            &bundle,
            &[
                ("results/A.B.C.json", "{\"x\":1}\n"),
                ("uploads/readme.txt", "hello"),
            ],
        );

        let root = extract_bundle(&bundle, dir.path()).unwrap();
        assert_eq!(root, dir.path().join("Collection--h--t"));
        assert_eq!(
            fs::read_to_string(root.join("results/A.B.C.json")).unwrap(),
            "{\"x\":1}\n"
        );
        assert_eq!(
            fs::read_to_string(root.join("uploads/readme.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_extract_two_bundles_dont_collide() {
        let dir = TempDir::new().unwrap();
        let b1 = dir.path().join("Collection--h--t1.zip");
        let b2 = dir.path().join("Collection--h--t2.zip");
        make_zip(&b1, &[("f.json", "1")]);
        make_zip(&b2, &[("f.json", "2")]);

        let r1 = extract_bundle(&b1, dir.path()).unwrap();
        let r2 = extract_bundle(&b2, dir.path()).unwrap();
        assert_ne!(r1, r2);
        assert_eq!(fs::read_to_string(r1.join("f.json")).unwrap(), "1");
        assert_eq!(fs::read_to_string(r2.join("f.json")).unwrap(), "2");
    }

    #[test]
    fn test_extract_missing_bundle_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(extract_bundle(&dir.path().join("missing.zip"), dir.path()).is_err());
    }
}
