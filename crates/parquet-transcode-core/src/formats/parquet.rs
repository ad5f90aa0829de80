//! Parquet record source and sink.
//!
//! The `parquet` crate owns the container format (pages, compression,
//! footer). This module only maps its flat schemas onto [`crate::schema`],
//! reads column chunks into [`crate::record::GenericRecord`]s and writes them
//! back with the same schema.
//!
//! Only flat schemas are supported: every top-level field must be a
//! `REQUIRED` or `OPTIONAL` primitive column. Nested groups and repeated
//! fields are rejected with [`ParquetFormatError::UnsupportedSchema`].

mod schema;
mod sink;
mod source;

use std::string::FromUtf8Error;

use ::parquet::basic::Compression;
use ::parquet::errors::ParquetError;
use ::parquet::file::metadata::KeyValue;
use ::parquet::file::properties::WriterProperties;
use bytes::Bytes;
use snafu::{Backtrace, prelude::*};

use crate::pipeline::RecordSource;
use crate::record::{GenericRecord, RecordError};
use crate::schema::{SchemaError, SchemaRef};

pub use schema::{parquet_schema, schema_from_parquet};
pub use sink::ParquetRecordSink;
pub use source::ParquetRecordSource;

/// Errors raised by the Parquet adapter.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParquetFormatError {
    /// The `parquet` crate failed while reading the file.
    #[snafu(display("Parquet read error: {source}"))]
    ParquetRead {
        /// Underlying Parquet error.
        source: ParquetError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The `parquet` crate failed while encoding the output.
    #[snafu(display("Parquet write error: {source}"))]
    ParquetWrite {
        /// Underlying Parquet error.
        source: ParquetError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The file schema uses a layout this adapter cannot transcode.
    #[snafu(display("Unsupported schema at column '{column}': {detail}"))]
    UnsupportedSchema {
        /// Column (or group) name.
        column: String,
        /// Why the column is unsupported.
        detail: String,
    },

    /// The schema read from the footer violates the model's invariants.
    #[snafu(display("Invalid schema: {source}"))]
    InvalidSchema {
        /// Underlying schema validation error.
        source: SchemaError,
    },

    /// A string column holds bytes that are not UTF-8.
    #[snafu(display("Column '{column}' holds invalid UTF-8 at value {value_index}"))]
    InvalidUtf8 {
        /// Column name.
        column: String,
        /// Index of the offending non-null value within the row group.
        value_index: usize,
        /// Underlying conversion error.
        source: FromUtf8Error,
    },

    /// A column chunk returned fewer values than its row group declares.
    #[snafu(display("Column '{column}' yielded {actual} rows, expected {expected}"))]
    ShortColumn {
        /// Column name.
        column: String,
        /// Rows declared by the row group metadata.
        expected: usize,
        /// Rows actually decoded.
        actual: usize,
    },

    /// A record could not be built or did not fit the sink schema.
    #[snafu(display("Record error: {source}"))]
    Record {
        /// Underlying record invariant violation.
        source: RecordError,
    },
}

/// Result alias for the Parquet adapter.
pub type ParquetResult<T> = Result<T, ParquetFormatError>;

/// Options applied when opening a Parquet file for reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Surface INT96 columns as raw 12-byte fixed values. When `false`,
    /// INT96 columns are rejected as unsupported.
    pub int96_as_fixed: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            int96_as_fixed: true,
        }
    }
}

/// Rows buffered per row group unless configured otherwise.
pub const DEFAULT_ROW_GROUP_ROWS: usize = 1024 * 1024;

/// Options applied when writing a Parquet file.
///
/// Page size and row-group byte limits stay at the container defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Compression codec for every column.
    pub compression: Compression,
    /// Whether dictionary encoding is enabled.
    pub dictionary_enabled: bool,
    /// Maximum number of rows per row group.
    pub row_group_rows: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            dictionary_enabled: false,
            row_group_rows: DEFAULT_ROW_GROUP_ROWS,
        }
    }
}

impl WriteOptions {
    pub(crate) fn writer_properties(
        &self,
        metadata: &[(String, Option<String>)],
    ) -> WriterProperties {
        let key_value: Vec<KeyValue> = metadata
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect();

        WriterProperties::builder()
            .set_compression(self.compression)
            .set_dictionary_enabled(self.dictionary_enabled)
            .set_key_value_metadata((!key_value.is_empty()).then_some(key_value))
            .build()
    }
}

/// Read every record of an in-memory Parquet file.
///
/// Returns the footer schema together with the records in file order.
pub fn read_all_records(
    data: Bytes,
    options: &ReadOptions,
) -> ParquetResult<(SchemaRef, Vec<GenericRecord>)> {
    let mut source = ParquetRecordSource::open(data, options)?;
    let mut records = Vec::new();
    while let Some(record) = source.next_record()? {
        records.push(record);
    }
    Ok((source.schema().clone(), records))
}
