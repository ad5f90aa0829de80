//! Directory-level transcodes and sidecar cleanup.
//!
//! Files are processed strictly one after another, in file-name order. After
//! the last file, checksum sidecars (`*.crc`) that ended up in the output
//! directory are removed; failures there are reported, never fatal.

use std::path::{Path, PathBuf};

use log::{info, warn};
use snafu::prelude::*;

use super::error::{NotFoundSnafu, StorageSnafu};
use super::{
    FileSummary, Operation, RecordCount, SidecarCleanupError, TranscodeError, transcode_file,
};
use crate::config::{FailurePolicy, TranscodeOptions};
use crate::storage::{self, PathKind};

/// Suffix of checksum sidecar files.
pub const SIDECAR_SUFFIX: &str = ".crc";

/// Whether `path` names a checksum sidecar.
pub fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(SIDECAR_SUFFIX))
}

/// Result of one file within a batch.
#[derive(Debug)]
pub struct FileOutcome {
    /// Input file.
    pub input: PathBuf,
    /// Output file the input maps to.
    pub output: PathBuf,
    /// Summary on success, the file's error otherwise.
    pub result: Result<FileSummary, TranscodeError>,
}

/// Everything a batch did.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Per-file outcomes in processing order.
    pub files: Vec<FileOutcome>,
    /// Sidecars removed from the output directory.
    pub removed_sidecars: Vec<PathBuf>,
    /// Sidecars that could not be removed.
    pub sidecar_failures: Vec<SidecarCleanupError>,
    /// Whether the batch stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl BatchReport {
    /// Record counts of the successful files, in processing order.
    pub fn counts(&self) -> Vec<RecordCount> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().ok().map(|s| s.records))
            .collect()
    }

    /// Total records written across successful files.
    pub fn total_records(&self) -> RecordCount {
        self.counts().iter().sum()
    }

    /// Outcomes of the files that failed.
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.result.is_err())
    }

    /// Whether every attempted file succeeded.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Transcode every file directly inside `input_dir` into `output_dir`.
///
/// Subdirectories and `.crc` sidecars in the input are skipped; each output
/// keeps its input's file name. `output_dir` is created when missing.
pub async fn transcode_directory(
    input_dir: &Path,
    output_dir: &Path,
    options: &TranscodeOptions,
) -> Result<BatchReport, TranscodeError> {
    match input_kind(input_dir).await? {
        PathKind::Directory => {}
        PathKind::File => {
            return Err(TranscodeError::Storage {
                path: input_dir.display().to_string(),
                operation: Operation::Read,
                source: storage::StorageError::WrongKind {
                    path: input_dir.display().to_string(),
                    expected: "directory",
                },
            });
        }
    }

    let inputs = storage::list_files(input_dir)
        .await
        .context(StorageSnafu {
            path: input_dir.display().to_string(),
            operation: Operation::Read,
        })?;
    run_batch(inputs, output_dir, options).await
}

/// Transcode `input` into `output_dir`, whether it is one file or a
/// directory of files.
pub async fn transcode_path(
    input: &Path,
    output_dir: &Path,
    options: &TranscodeOptions,
) -> Result<BatchReport, TranscodeError> {
    match input_kind(input).await? {
        PathKind::Directory => transcode_directory(input, output_dir, options).await,
        PathKind::File => run_batch(vec![input.to_path_buf()], output_dir, options).await,
    }
}

async fn input_kind(path: &Path) -> Result<PathKind, TranscodeError> {
    match storage::path_kind(path).await {
        Ok(kind) => Ok(kind),
        Err(e) if e.is_not_found() => NotFoundSnafu {
            path: path.display().to_string(),
        }
        .fail(),
        Err(source) => Err(TranscodeError::Storage {
            path: path.display().to_string(),
            operation: Operation::Read,
            source,
        }),
    }
}

async fn run_batch(
    inputs: Vec<PathBuf>,
    output_dir: &Path,
    options: &TranscodeOptions,
) -> Result<BatchReport, TranscodeError> {
    storage::create_dir_all(output_dir)
        .await
        .context(StorageSnafu {
            path: output_dir.display().to_string(),
            operation: Operation::Publish,
        })?;

    let mut report = BatchReport::default();

    for input in inputs.into_iter().filter(|p| !is_sidecar(p)) {
        if options.is_cancelled() {
            info!("Cancellation requested; stopping before {}", input.display());
            report.cancelled = true;
            break;
        }

        let Some(name) = input.file_name() else {
            continue;
        };
        let output = output_dir.join(name);

        let result = transcode_file(&input, &output, options).await;
        if let Err(e) = &result {
            warn!("{e}");
        }
        match result {
            Err(e) if options.failure_policy == FailurePolicy::Abort => return Err(e),
            result => report.files.push(FileOutcome {
                input,
                output,
                result,
            }),
        }
    }

    remove_sidecars(output_dir, &mut report).await;
    Ok(report)
}

async fn remove_sidecars(output_dir: &Path, report: &mut BatchReport) {
    let entries = match storage::list_files(output_dir).await {
        Ok(entries) => entries,
        Err(source) => {
            warn!(
                "Could not list {} for sidecar cleanup: {source}",
                output_dir.display()
            );
            report.sidecar_failures.push(SidecarCleanupError {
                path: output_dir.display().to_string(),
                source,
            });
            return;
        }
    };

    for sidecar in entries.into_iter().filter(|p| is_sidecar(p)) {
        match storage::remove_file(&sidecar).await {
            Ok(()) => report.removed_sidecars.push(sidecar),
            Err(source) => {
                warn!("Failed to remove sidecar {}: {source}", sidecar.display());
                report.sidecar_failures.push(SidecarCleanupError {
                    path: sidecar.display().to_string(),
                    source,
                });
            }
        }
    }
}
