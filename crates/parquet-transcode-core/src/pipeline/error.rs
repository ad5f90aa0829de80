//! Error types for the transcode pipeline.

use std::{error::Error, fmt};

use snafu::prelude::*;

use crate::storage::StorageError;

/// Boxed error from a [`super::RecordSource`] or [`super::RecordSink`]
/// implementation.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Stage of a file transcode at which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Reading the input bytes or opening the source.
    Read,
    /// Pulling records from the source.
    Decode,
    /// Opening the sink or writing records to it.
    Write,
    /// Finalizing the sink.
    Close,
    /// Publishing the finished output file.
    Publish,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Read => "read",
            Operation::Decode => "decode",
            Operation::Write => "write",
            Operation::Close => "close",
            Operation::Publish => "publish",
        })
    }
}

/// Errors that abort the transcode of one file (or, under
/// [`crate::config::FailurePolicy::Abort`], a whole batch).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TranscodeError {
    /// Filesystem access failed.
    #[snafu(display("Failed to {operation} {path}: {source}"))]
    Storage {
        /// File or directory involved.
        path: String,
        /// Stage that failed.
        operation: Operation,
        /// Underlying storage error.
        source: StorageError,
    },

    /// The record source or sink failed.
    #[snafu(display("Failed to {operation} records of {path}: {source}"))]
    Format {
        /// Input file being transcoded.
        path: String,
        /// Stage that failed.
        operation: Operation,
        /// Error raised by the source or sink implementation.
        source: BoxError,
    },

    /// The input has no records and exposes no file-level schema.
    #[snafu(display(
        "Cannot determine a schema for {path}: no records and no file-level schema"
    ))]
    EmptyInputSchema {
        /// Input file being transcoded.
        path: String,
    },

    /// Writing failed and finalizing the sink failed as well.
    #[snafu(display(
        "Failed to write records of {path}: {write}; closing the output also failed: {close}"
    ))]
    WriteAndClose {
        /// Input file being transcoded.
        path: String,
        /// The original write error.
        write: BoxError,
        /// The error raised while closing the sink afterwards.
        close: BoxError,
    },

    /// The input path does not exist.
    #[snafu(display("Input path not found: {path}"))]
    NotFound {
        /// Missing path.
        path: String,
    },
}

impl TranscodeError {
    /// Wrap a source or sink error with file and stage context.
    pub(crate) fn format<E>(path: &str, operation: Operation, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        TranscodeError::Format {
            path: path.to_string(),
            operation,
            source: Box::new(source),
        }
    }

    /// Stage that failed, when the error is tied to one.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            TranscodeError::Storage { operation, .. }
            | TranscodeError::Format { operation, .. } => Some(*operation),
            TranscodeError::WriteAndClose { .. } => Some(Operation::Write),
            TranscodeError::EmptyInputSchema { .. } | TranscodeError::NotFound { .. } => None,
        }
    }
}

/// A sidecar checksum file that could not be removed after a batch.
///
/// Collected in [`super::batch::BatchReport`]; never aborts the batch.
#[derive(Debug, Snafu)]
#[snafu(display("Failed to remove sidecar {path}: {source}"))]
pub struct SidecarCleanupError {
    /// Sidecar (or directory) that could not be handled.
    pub path: String,
    /// Underlying storage error.
    pub source: StorageError,
}
