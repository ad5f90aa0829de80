//! Read-buffer-write transcode of single files.
//!
//! A transcode pulls every record from a [`RecordSource`], takes the schema
//! from the first record (or from the file footer when there are none),
//! optionally inspects the buffered records, then writes them in order to a
//! [`RecordSink`] opened with that schema. Output is published atomically so
//! a failed file never leaves a partial result behind.

pub mod batch;
pub mod error;
pub mod inspect;

use std::{error::Error, fmt, path::Path};

use bytes::Bytes;
use log::{debug, info};
use snafu::prelude::*;

use crate::config::TranscodeOptions;
use crate::formats::parquet::{ParquetRecordSink, ParquetRecordSource};
use crate::record::GenericRecord;
use crate::schema::SchemaRef;
use crate::storage;

pub use error::{BoxError, Operation, SidecarCleanupError, TranscodeError};
use error::{EmptyInputSchemaSnafu, StorageSnafu};
pub use inspect::{InspectOptions, InspectStats};

/// Number of records transcoded for one file.
pub type RecordCount = u64;

/// An ordered, finite, non-restartable sequence of records.
pub trait RecordSource {
    /// Error raised while reading.
    type Error: Error + Send + Sync + 'static;

    /// Schema declared by the file itself, independent of any record.
    fn file_schema(&self) -> Option<SchemaRef>;

    /// Next record, or `Ok(None)` once the source is exhausted.
    fn next_record(&mut self) -> Result<Option<GenericRecord>, Self::Error>;
}

/// Destination for records of a single schema.
pub trait RecordSink: Sized {
    /// Finished output produced by [`RecordSink::close`].
    type Output;
    /// Error raised while writing or closing.
    type Error: Error + Send + Sync + 'static;

    /// Append one record.
    fn write(&mut self, record: &GenericRecord) -> Result<(), Self::Error>;

    /// Finalize the output. Must be called exactly once, also after a failed
    /// write.
    fn close(self) -> Result<Self::Output, Self::Error>;
}

/// Lifecycle of one file transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Nothing read yet.
    Unopened,
    /// Pulling records until the schema is known.
    ReadingSchema,
    /// All records buffered.
    Buffering(usize),
    /// Sink open, records being written.
    Writing,
    /// Sink closed successfully.
    Closed,
    /// The transcode failed.
    Failed,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::Unopened => f.write_str("unopened"),
            FileState::ReadingSchema => f.write_str("reading-schema"),
            FileState::Buffering(n) => write!(f, "buffering({n})"),
            FileState::Writing => f.write_str("writing"),
            FileState::Closed => f.write_str("closed"),
            FileState::Failed => f.write_str("failed"),
        }
    }
}

struct Progress<'a> {
    label: &'a str,
    state: FileState,
}

impl<'a> Progress<'a> {
    fn new(label: &'a str) -> Self {
        Self {
            label,
            state: FileState::Unopened,
        }
    }

    fn advance(&mut self, next: FileState) {
        debug!("{}: {} -> {}", self.label, self.state, next);
        self.state = next;
    }
}

/// Result of [`transcode_records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodedRecords<O> {
    /// Records written.
    pub records: RecordCount,
    /// Inspection counters (zero when inspection is off).
    pub inspection: InspectStats,
    /// Output returned by the sink.
    pub output: O,
}

/// Summary of one successfully transcoded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// Input file.
    pub input: std::path::PathBuf,
    /// Published output file.
    pub output: std::path::PathBuf,
    /// Records written.
    pub records: RecordCount,
    /// Annotated values decoded during inspection.
    pub decoded: u64,
    /// Annotated values that failed to decode during inspection.
    pub decode_failures: u64,
}

/// Transcode every record of `source` into a sink built by `open_sink`.
///
/// `label` names the file in errors and logs. No I/O happens here beyond
/// what the source and sink do themselves.
pub fn transcode_records<S, K, F>(
    label: &str,
    source: S,
    open_sink: F,
    inspect: Option<&InspectOptions>,
) -> Result<TranscodedRecords<K::Output>, TranscodeError>
where
    S: RecordSource,
    K: RecordSink,
    F: FnOnce(SchemaRef) -> Result<K, K::Error>,
{
    let mut progress = Progress::new(label);
    let result = run_records(&mut progress, source, open_sink, inspect);
    if result.is_err() {
        progress.advance(FileState::Failed);
    }
    result
}

fn run_records<S, K, F>(
    progress: &mut Progress<'_>,
    mut source: S,
    open_sink: F,
    inspect: Option<&InspectOptions>,
) -> Result<TranscodedRecords<K::Output>, TranscodeError>
where
    S: RecordSource,
    K: RecordSink,
    F: FnOnce(SchemaRef) -> Result<K, K::Error>,
{
    let label = progress.label;
    progress.advance(FileState::ReadingSchema);

    let mut records = Vec::new();
    while let Some(record) = source
        .next_record()
        .map_err(|e| TranscodeError::format(label, Operation::Decode, e))?
    {
        records.push(record);
    }

    let schema = match records.first() {
        Some(first) => first.schema().clone(),
        None => {
            debug!("{label}: no records, using the file-level schema");
            source
                .file_schema()
                .context(EmptyInputSchemaSnafu { path: label })?
        }
    };
    progress.advance(FileState::Buffering(records.len()));

    let inspection = inspect
        .map(|options| inspect::inspect_records(label, &records, options))
        .unwrap_or_default();

    progress.advance(FileState::Writing);
    let mut sink =
        open_sink(schema).map_err(|e| TranscodeError::format(label, Operation::Write, e))?;

    let written = records.iter().try_for_each(|record| sink.write(record));
    let closed = sink.close();
    let output = match (written, closed) {
        (Ok(()), Ok(output)) => output,
        (Err(write), Ok(_)) => return Err(TranscodeError::format(label, Operation::Write, write)),
        (Ok(()), Err(close)) => return Err(TranscodeError::format(label, Operation::Close, close)),
        (Err(write), Err(close)) => {
            return Err(TranscodeError::WriteAndClose {
                path: label.to_string(),
                write: Box::new(write),
                close: Box::new(close),
            });
        }
    };
    progress.advance(FileState::Closed);

    Ok(TranscodedRecords {
        records: records.len() as RecordCount,
        inspection,
        output,
    })
}

/// Transcode the Parquet file at `input` into `output`.
///
/// The output is replaced atomically; on any failure no output file is
/// created and an existing one is left untouched.
pub async fn transcode_file(
    input: &Path,
    output: &Path,
    options: &TranscodeOptions,
) -> Result<FileSummary, TranscodeError> {
    let label = input.display().to_string();
    info!("Reading {label}");

    let bytes = storage::read_all_bytes(input).await.context(StorageSnafu {
        path: label.as_str(),
        operation: Operation::Read,
    })?;

    let source = ParquetRecordSource::open(Bytes::from(bytes), &options.read)
        .map_err(|e| TranscodeError::format(&label, Operation::Read, e))?;

    let transcoded = transcode_records(
        &label,
        source,
        |schema| ParquetRecordSink::try_new(schema, &options.write),
        options.inspect.as_ref(),
    )?;

    info!(
        "Writing file {} with {} records",
        output.display(),
        transcoded.records
    );
    storage::write_atomic(output, &transcoded.output)
        .await
        .context(StorageSnafu {
            path: output.display().to_string(),
            operation: Operation::Publish,
        })?;

    Ok(FileSummary {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        records: transcoded.records,
        decoded: transcoded.inspection.decoded,
        decode_failures: transcoded.inspection.failures,
    })
}
