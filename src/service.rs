//! Request-level entry points: parse a document, run every file patch, and
//! summarize the outcome.

use crate::config::MatchDefaults;
use crate::executor::PatchExecutor;
use crate::patch::{FilePatchResult, ParseError, PatchMetadata, PatchParser, PatchStatus};
use crate::safety::SafetyError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Call-level failure. Per-file problems never surface here.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Base directory does not exist: {0}")]
    BaseDirMissing(PathBuf),

    #[error("Invalid base directory: {0}")]
    BaseDir(#[from] SafetyError),

    #[error("Failed to parse patch: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    pub success: usize,
    pub skipped: usize,
    /// Includes `file_not_found`.
    pub failed: usize,
}

impl ApplyStats {
    pub fn from_results(results: &[FilePatchResult]) -> Self {
        results.iter().fold(Self::default(), |mut stats, result| {
            match result.status {
                PatchStatus::Success => stats.success += 1,
                PatchStatus::Skipped => stats.skipped += 1,
                PatchStatus::Failed | PatchStatus::FileNotFound => stats.failed += 1,
            }
            stats
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub metadata: PatchMetadata,
    pub dry_run: bool,
    pub results: Vec<FilePatchResult>,
    pub stats: ApplyStats,
}

impl ApplyReport {
    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PatchMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Options shared by every request.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub dry_run: bool,
    pub defaults: MatchDefaults,
}

/// Parse `document` and execute its file patches in order under `base_dir`.
pub fn apply(
    document: &str,
    base_dir: &Path,
    options: &ApplyOptions,
) -> Result<ApplyReport, ApplyError> {
    if !base_dir.is_dir() {
        return Err(ApplyError::BaseDirMissing(base_dir.to_path_buf()));
    }
    let parsed = PatchParser::with_defaults(options.defaults.clone()).parse(document)?;
    let mut executor = PatchExecutor::new(base_dir, options.dry_run)?;

    let results: Vec<FilePatchResult> = parsed
        .files
        .iter()
        .map(|file| executor.execute(file))
        .collect();
    let stats = ApplyStats::from_results(&results);

    info!(
        patch = %parsed.metadata.name,
        success = stats.success,
        skipped = stats.skipped,
        failed = stats.failed,
        dry_run = options.dry_run,
        "patch applied"
    );

    Ok(ApplyReport {
        metadata: parsed.metadata,
        dry_run: options.dry_run,
        results,
        stats,
    })
}

/// Parse only: no matching, no I/O.
pub fn validate(document: &str, defaults: &MatchDefaults) -> ValidateReport {
    match PatchParser::with_defaults(defaults.clone()).parse(document) {
        Ok(parsed) => ValidateReport {
            valid: true,
            file_count: Some(parsed.files.len()),
            metadata: Some(parsed.metadata),
            error: None,
        },
        Err(e) => ValidateReport {
            valid: false,
            metadata: None,
            file_count: None,
            error: Some(e.to_string()),
        },
    }
}
