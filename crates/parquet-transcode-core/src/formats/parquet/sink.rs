//! Buffered record writer producing an in-memory Parquet file.

use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use parquet::column::writer::ColumnWriter;
use parquet::data_type::{ByteArray, FixedLenByteArray, Int96};
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use snafu::prelude::*;

use super::schema::parquet_schema;
use super::{ParquetFormatError, ParquetResult, ParquetWriteSnafu, RecordSnafu, WriteOptions};
use crate::pipeline::RecordSink;
use crate::record::{GenericRecord, RecordError, SchemaMismatchSnafu, TypeMismatchSnafu, Value};
use crate::schema::{FieldDescriptor, SchemaRef};

/// Writes records of one schema into a Parquet file held in memory.
///
/// Records are buffered and flushed as a row group every
/// [`WriteOptions::row_group_rows`] rows; [`RecordSink::close`] flushes the
/// remainder, writes the footer and hands back the finished file image.
pub struct ParquetRecordSink {
    schema: SchemaRef,
    writer: SerializedFileWriter<Vec<u8>>,
    pending: Vec<GenericRecord>,
    row_group_rows: usize,
    rows_written: u64,
}

impl std::fmt::Debug for ParquetRecordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetRecordSink")
            .field("schema", &self.schema)
            .field("pending", &self.pending.len())
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl ParquetRecordSink {
    /// Open a sink for records of `schema`.
    pub fn try_new(schema: SchemaRef, options: &WriteOptions) -> ParquetResult<Self> {
        let root = parquet_schema(&schema)?;
        let props = options.writer_properties(schema.metadata());
        let writer = SerializedFileWriter::new(Vec::new(), root, Arc::new(props))
            .context(ParquetWriteSnafu)?;

        Ok(Self {
            schema,
            writer,
            pending: Vec::new(),
            row_group_rows: options.row_group_rows.max(1),
            rows_written: 0,
        })
    }

    fn check_schema(&self, record: &GenericRecord) -> Result<(), RecordError> {
        ensure!(
            Arc::ptr_eq(record.schema(), &self.schema) || **record.schema() == *self.schema,
            SchemaMismatchSnafu
        );
        Ok(())
    }

    /// Rows flushed to row groups so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn flush_row_group(&mut self) -> ParquetResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.pending);
        debug!("flushing row group with {} rows", rows.len());

        let mut row_group_writer = self.writer.next_row_group().context(ParquetWriteSnafu)?;
        let mut index = 0;
        while let Some(mut col_writer) =
            row_group_writer.next_column().context(ParquetWriteSnafu)?
        {
            let field = self
                .schema
                .fields()
                .get(index)
                .context(SchemaMismatchSnafu)
                .context(RecordSnafu)?;
            write_column(&mut col_writer, field, index, &rows)?;
            col_writer.close().context(ParquetWriteSnafu)?;
            index += 1;
        }
        row_group_writer.close().context(ParquetWriteSnafu)?;

        self.rows_written += rows.len() as u64;
        Ok(())
    }
}

impl RecordSink for ParquetRecordSink {
    type Output = Bytes;
    type Error = ParquetFormatError;

    fn write(&mut self, record: &GenericRecord) -> ParquetResult<()> {
        self.check_schema(record).context(RecordSnafu)?;
        self.pending.push(record.clone());
        if self.pending.len() >= self.row_group_rows {
            self.flush_row_group()?;
        }
        Ok(())
    }

    fn close(mut self) -> ParquetResult<Bytes> {
        let flushed = self.flush_row_group();
        // The footer is still attempted so the writer is always finalized.
        let finished = self.writer.into_inner().context(ParquetWriteSnafu);
        flushed?;
        Ok(Bytes::from(finished?))
    }
}

fn bytes_to_int96(bytes: &[u8]) -> Int96 {
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Int96::from(words)
}

/// Collect the non-null cells of one column, checking each tag.
fn dense_values<T>(
    cells: &[&Value],
    field: &FieldDescriptor,
    extract: impl Fn(&Value) -> Option<T>,
) -> ParquetResult<Vec<T>> {
    cells
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| {
            extract(v)
                .context(TypeMismatchSnafu {
                    field: field.name.clone(),
                    expected: field.physical,
                    actual: v.type_name(),
                })
                .context(RecordSnafu)
        })
        .collect()
}

fn write_column(
    col_writer: &mut SerializedColumnWriter<'_>,
    field: &FieldDescriptor,
    index: usize,
    rows: &[GenericRecord],
) -> ParquetResult<()> {
    let cells: Vec<&Value> = rows
        .iter()
        .map(|r| r.value(index).unwrap_or(&Value::Null))
        .collect();
    let def_levels: Option<Vec<i16>> = field
        .nullable
        .then(|| cells.iter().map(|v| i16::from(!v.is_null())).collect());
    let defs = def_levels.as_deref();

    let written = match col_writer.untyped() {
        ColumnWriter::BoolColumnWriter(typed) => {
            let vals = dense_values(&cells, field, |v| match v {
                Value::Boolean(b) => Some(*b),
                _ => None,
            })?;
            typed.write_batch(&vals, defs, None)
        }
        ColumnWriter::Int32ColumnWriter(typed) => {
            let vals = dense_values(&cells, field, |v| match v {
                Value::Int32(i) => Some(*i),
                _ => None,
            })?;
            typed.write_batch(&vals, defs, None)
        }
        ColumnWriter::Int64ColumnWriter(typed) => {
            let vals = dense_values(&cells, field, |v| match v {
                Value::Int64(i) => Some(*i),
                _ => None,
            })?;
            typed.write_batch(&vals, defs, None)
        }
        ColumnWriter::Int96ColumnWriter(typed) => {
            let vals = dense_values(&cells, field, |v| match v {
                Value::FixedBytes(b) => Some(bytes_to_int96(b)),
                _ => None,
            })?;
            typed.write_batch(&vals, defs, None)
        }
        ColumnWriter::FloatColumnWriter(typed) => {
            let vals = dense_values(&cells, field, |v| match v {
                Value::Float(x) => Some(*x),
                _ => None,
            })?;
            typed.write_batch(&vals, defs, None)
        }
        ColumnWriter::DoubleColumnWriter(typed) => {
            let vals = dense_values(&cells, field, |v| match v {
                Value::Double(x) => Some(*x),
                _ => None,
            })?;
            typed.write_batch(&vals, defs, None)
        }
        ColumnWriter::ByteArrayColumnWriter(typed) => {
            let vals = dense_values(&cells, field, |v| match v {
                Value::Utf8(s) => Some(ByteArray::from(s.as_bytes().to_vec())),
                Value::Bytes(b) => Some(ByteArray::from(b.clone())),
                _ => None,
            })?;
            typed.write_batch(&vals, defs, None)
        }
        ColumnWriter::FixedLenByteArrayColumnWriter(typed) => {
            let vals = dense_values(&cells, field, |v| match v {
                Value::FixedBytes(b) => Some(FixedLenByteArray::from(b.clone())),
                _ => None,
            })?;
            typed.write_batch(&vals, defs, None)
        }
    };
    written.context(ParquetWriteSnafu)?;

    Ok(())
}
