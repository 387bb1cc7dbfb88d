use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

/// Remove a directory tree if present and recreate it empty.
///
/// Working directories (specs, collectors, runtime, extracted) are
/// single-writer per batch, so a fresh directory at batch start is the
/// stale-state boundary.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .context(format!("Failed to remove directory {}", dir.display()))?;
        debug!("Removed existing directory: {}", dir.display());
    }
    fs::create_dir_all(dir)
        .context(format!("Failed to create directory {}", dir.display()))?;
    debug!("Created fresh directory: {}", dir.display());
    Ok(())
}

/// Create a directory if it does not exist, leaving contents alone.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .context(format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recreate_dir_wipes_contents() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("runtime");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("stale.zip"), b"old").unwrap();

        recreate_dir(&dir).unwrap();

        assert!(dir.exists());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_recreate_dir_creates_missing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a/b/c");
        recreate_dir(&dir).unwrap();
        assert!(dir.exists());
    }

    #[test]
    fn test_ensure_dir_preserves_contents() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("specs");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("keep.yaml"), b"x").unwrap();

        ensure_dir(&dir).unwrap();
        assert!(dir.join("keep.yaml").exists());
    }
}
