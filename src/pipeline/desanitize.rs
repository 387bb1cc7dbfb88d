//! Filename desanitization.
//!
//! The collector flattens artifact paths into filenames by escaping path
//! separators as `%2F`. This pass restores dotted names by renaming every
//! file and directory containing the token. Files go first, then
//! directories deepest-first, so a parent rename never invalidates a child
//! path already queued.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use walkdir::WalkDir;

use crate::constants::ESCAPED_SLASH;

/// Rename all `%2F`-bearing entries under `root`. Returns the number of
/// renames performed.
pub fn desanitize_tree(root: &Path) -> Result<usize> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut dirs: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.context(format!("Failed to walk {}", root.display()))?;
        let name = entry.file_name().to_string_lossy();
        if !name.contains(ESCAPED_SLASH) {
            continue;
        }
        if entry.file_type().is_dir() {
            dirs.push(entry.path().to_path_buf());
        } else {
            files.push(entry.path().to_path_buf());
        }
    }

    // Deepest directories first so each rename only touches a leaf.
    dirs.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

    let mut renamed = 0;
    for path in files.into_iter().chain(dirs) {
        if rename_entry(&path)? {
            renamed += 1;
        }
    }
    Ok(renamed)
}

fn rename_entry(path: &Path) -> Result<bool> {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return Ok(false),
    };
    let new_name = name.replace(ESCAPED_SLASH, ".");
    let target = match path.parent() {
        Some(parent) => parent.join(&new_name),
        None => PathBuf::from(&new_name),
    };

    if target.exists() {
        warn!(
            "Skipping rename of {}: {} already exists",
            path.display(),
            target.display()
        );
        return Ok(false);
    }

    fs::rename(path, &target).context(format!(
        "Failed to rename {} to {}",
        path.display(),
        target.display()
    ))?;
    debug!("Renamed {} to {}", path.display(), target.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_rename() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("Windows%2FSystem%2FPowerShell.json");
        fs::write(&original, b"{}").unwrap();

        let renamed = desanitize_tree(dir.path()).unwrap();
        assert_eq!(renamed, 1);
        assert!(!original.exists());
        assert!(dir.path().join("Windows.System.PowerShell.json").exists());
    }

    #[test]
    fn test_nested_dirs_and_files() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("outer%2Fdir").join("inner%2Fdir");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("data%2Ffile.json"), b"{}").unwrap();

        let renamed = desanitize_tree(dir.path()).unwrap();
        assert_eq!(renamed, 3);
        assert!(dir
            .path()
            .join("outer.dir")
            .join("inner.dir")
            .join("data.file.json")
            .exists());
    }

    #[test]
    fn test_existing_target_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a%2Fb.json"), b"new").unwrap();
        fs::write(dir.path().join("a.b.json"), b"old").unwrap();

        let renamed = desanitize_tree(dir.path()).unwrap();
        assert_eq!(renamed, 0);
        assert!(dir.path().join("a%2Fb.json").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("a.b.json")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_idempotent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a%2Fb.json"), b"{}").unwrap();

        assert_eq!(desanitize_tree(dir.path()).unwrap(), 1);
        assert_eq!(desanitize_tree(dir.path()).unwrap(), 0);
    }

    #[test]
    fn test_clean_tree_untouched() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("plain.json"), b"{}").unwrap();
        assert_eq!(desanitize_tree(dir.path()).unwrap(), 0);
    }
}
