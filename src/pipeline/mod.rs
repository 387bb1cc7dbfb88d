//! Bundle normalization pipeline.
//!
//! Each pulled bundle goes through a fixed sequence: extract, desanitize
//! filenames, enrich records with host identity and source type, add epoch
//! timestamps, drop collector index files, then validate. One bad bundle
//! is reported and skipped; the rest of the batch still runs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error, info};
use walkdir::WalkDir;

/// Zip extraction and bundle filename metadata
pub mod extract;

/// `%2F` filename restoration
pub mod desanitize;

/// Source type and host-identity enrichment
pub mod enrich;

/// Epoch sibling timestamps
pub mod timestamps;

/// Read-only record validation
pub mod validate;

pub use validate::{ResultValidator, ValidationReport};

use crate::models::BundleMeta;

/// What happened to one bundle.
#[derive(Debug)]
pub struct BundleReport {
    pub bundle: PathBuf,
    pub meta: BundleMeta,
    pub extracted_to: PathBuf,
    pub renamed: usize,
    pub enriched: usize,
    pub canonicalized: usize,
    pub validation: ValidationReport,
}

/// Outcome of processing a batch of bundles.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub processed: Vec<BundleReport>,
    /// Bundles that failed before validation, with the failure reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl PipelineSummary {
    /// True when every bundle processed and validated without findings.
    pub fn all_clean(&self) -> bool {
        self.failed.is_empty() && self.processed.iter().all(|r| r.validation.clean())
    }
}

/// Run the full pipeline over one bundle.
pub fn process_bundle(bundle: &Path, output_dir: &Path) -> Result<BundleReport> {
    let meta = extract::parse_bundle_meta(bundle);
    if let (Some(fqdn), Some(timestamp)) = (&meta.fqdn, &meta.timestamp) {
        info!("Processing bundle from {} collected at {}", fqdn, timestamp);
    }

    let extracted_to = extract::extract_bundle(bundle, output_dir)?;
    let renamed = desanitize::desanitize_tree(&extracted_to)?;

    let system_info = enrich::load_system_info(&extracted_to);
    let enriched = enrich::enrich_tree(&extracted_to, &system_info)?;
    let canonicalized = timestamps::canonicalize_tree(&extracted_to)?;

    remove_index_files(&extracted_to)?;

    let validation = ResultValidator::validate_tree(&extracted_to)?;
    Ok(BundleReport {
        bundle: bundle.to_path_buf(),
        meta,
        extracted_to,
        renamed,
        enriched,
        canonicalized,
        validation,
    })
}

/// Run the pipeline over every bundle, continuing past failures.
pub fn process_bundles(bundles: &[PathBuf], output_dir: &Path) -> PipelineSummary {
    let mut summary = PipelineSummary::default();
    for bundle in bundles {
        match process_bundle(bundle, output_dir) {
            Ok(report) => summary.processed.push(report),
            Err(e) => {
                error!("Failed to process {}: {:#}", bundle.display(), e);
                summary.failed.push((bundle.clone(), format!("{:#}", e)));
            }
        }
    }
    info!(
        "Processed {} bundle(s), {} failed",
        summary.processed.len(),
        summary.failed.len()
    );
    summary
}

/// Delete collector `.index` files, which carry no record data.
pub fn remove_index_files(root: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(root) {
        let entry = entry.context(format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(".index") {
            fs::remove_file(entry.path())
                .context(format!("Failed to remove {}", entry.path().display()))?;
            debug!("Removed index file {}", entry.path().display());
            removed += 1;
        }
    }
    Ok(removed)
}
