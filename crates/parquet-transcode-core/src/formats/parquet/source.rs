//! Row-group-at-a-time record reader.
//!
//! Values are read through typed column readers rather than the row API so
//! every physical value (INT96 words, decimal bytes, float bit patterns)
//! reaches the record unchanged.

use std::sync::Arc;
use std::vec;

use bytes::Bytes;
use log::debug;
use parquet::column::reader::{ColumnReader, ColumnReaderImpl};
use parquet::data_type::{DataType, Int96};
use parquet::errors::ParquetError;
use parquet::file::reader::{FileReader, RowGroupReader, SerializedFileReader};
use snafu::prelude::*;

use super::schema::schema_from_parquet;
use super::{
    InvalidUtf8Snafu, ParquetFormatError, ParquetReadSnafu, ParquetResult, ReadOptions,
    RecordSnafu, ShortColumnSnafu,
};
use crate::pipeline::RecordSource;
use crate::record::{GenericRecord, Value};
use crate::schema::{FieldDescriptor, PhysicalType, SchemaRef};

/// Reads records from an in-memory Parquet file, one row group at a time.
pub struct ParquetRecordSource {
    reader: SerializedFileReader<Bytes>,
    schema: SchemaRef,
    next_row_group: usize,
    pending: vec::IntoIter<GenericRecord>,
}

impl std::fmt::Debug for ParquetRecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetRecordSource")
            .field("schema", &self.schema)
            .field("next_row_group", &self.next_row_group)
            .finish_non_exhaustive()
    }
}

impl ParquetRecordSource {
    /// Parse the footer of `data` and prepare to stream its records.
    pub fn open(data: Bytes, options: &ReadOptions) -> ParquetResult<Self> {
        let reader = SerializedFileReader::new(data).context(ParquetReadSnafu)?;
        let schema = schema_from_parquet(reader.metadata().file_metadata(), options)?;

        Ok(Self {
            reader,
            schema: Arc::new(schema),
            next_row_group: 0,
            pending: Vec::new().into_iter(),
        })
    }

    /// Schema declared by the file footer.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Total rows declared across all row groups.
    pub fn num_rows(&self) -> i64 {
        self.reader.metadata().file_metadata().num_rows()
    }

    fn read_row_group(&self, index: usize) -> ParquetResult<Vec<GenericRecord>> {
        let row_group = self.reader.get_row_group(index).context(ParquetReadSnafu)?;
        let rows = usize::try_from(row_group.metadata().num_rows()).unwrap_or(0);
        debug!("decoding row group {index} ({rows} rows)");

        let mut columns = Vec::with_capacity(self.schema.len());
        for (i, field) in self.schema.fields().iter().enumerate() {
            let reader = row_group.get_column_reader(i).context(ParquetReadSnafu)?;
            let values = read_column(reader, field, rows)?;
            ensure!(
                values.len() == rows,
                ShortColumnSnafu {
                    column: field.name.clone(),
                    expected: rows,
                    actual: values.len(),
                }
            );
            columns.push(values.into_iter());
        }

        (0..rows)
            .map(|_| {
                let values = columns
                    .iter_mut()
                    .map(|col| col.next().unwrap_or(Value::Null))
                    .collect();
                GenericRecord::try_new(self.schema.clone(), values).context(RecordSnafu)
            })
            .collect()
    }
}

impl RecordSource for ParquetRecordSource {
    type Error = ParquetFormatError;

    fn file_schema(&self) -> Option<SchemaRef> {
        Some(self.schema.clone())
    }

    fn next_record(&mut self) -> ParquetResult<Option<GenericRecord>> {
        loop {
            if let Some(record) = self.pending.next() {
                return Ok(Some(record));
            }
            if self.next_row_group >= self.reader.num_row_groups() {
                return Ok(None);
            }
            let index = self.next_row_group;
            self.next_row_group += 1;
            self.pending = self.read_row_group(index)?.into_iter();
        }
    }
}

/// Read `rows` records from one flat column.
///
/// Returns the non-null values plus, for optional columns, one definition
/// level per row.
fn read_typed<T: DataType>(
    reader: &mut ColumnReaderImpl<T>,
    rows: usize,
    nullable: bool,
) -> Result<(Vec<T::T>, Option<Vec<i16>>), ParquetError> {
    let mut values = Vec::with_capacity(rows);
    let mut def_levels = nullable.then(|| Vec::with_capacity(rows));
    let mut remaining = rows;

    while remaining > 0 {
        let (records, _, _) =
            reader.read_records(remaining, def_levels.as_mut(), None, &mut values)?;
        if records == 0 {
            break;
        }
        remaining = remaining.saturating_sub(records);
    }

    Ok((values, def_levels))
}

/// Interleave nulls back into the dense value stream.
fn assemble<T>(
    values: Vec<T>,
    def_levels: Option<Vec<i16>>,
    wrap: impl Fn(T) -> Value,
) -> Vec<Value> {
    match def_levels {
        None => values.into_iter().map(wrap).collect(),
        Some(levels) => {
            let mut values = values.into_iter();
            levels
                .iter()
                .map(|level| {
                    if *level > 0 {
                        values.next().map(&wrap).unwrap_or(Value::Null)
                    } else {
                        Value::Null
                    }
                })
                .collect()
        }
    }
}

/// Little-endian image of the three INT96 words, as stored on disk.
pub(crate) fn int96_to_bytes(v: &Int96) -> Vec<u8> {
    v.data().iter().flat_map(|word| word.to_le_bytes()).collect()
}

fn read_column(
    reader: ColumnReader,
    field: &FieldDescriptor,
    rows: usize,
) -> ParquetResult<Vec<Value>> {
    let nullable = field.nullable;
    let values = match reader {
        ColumnReader::BoolColumnReader(mut r) => {
            let (vals, defs) = read_typed(&mut r, rows, nullable).context(ParquetReadSnafu)?;
            assemble(vals, defs, Value::Boolean)
        }
        ColumnReader::Int32ColumnReader(mut r) => {
            let (vals, defs) = read_typed(&mut r, rows, nullable).context(ParquetReadSnafu)?;
            assemble(vals, defs, Value::Int32)
        }
        ColumnReader::Int64ColumnReader(mut r) => {
            let (vals, defs) = read_typed(&mut r, rows, nullable).context(ParquetReadSnafu)?;
            assemble(vals, defs, Value::Int64)
        }
        ColumnReader::Int96ColumnReader(mut r) => {
            let (vals, defs) = read_typed(&mut r, rows, nullable).context(ParquetReadSnafu)?;
            assemble(vals, defs, |v| Value::FixedBytes(int96_to_bytes(&v)))
        }
        ColumnReader::FloatColumnReader(mut r) => {
            let (vals, defs) = read_typed(&mut r, rows, nullable).context(ParquetReadSnafu)?;
            assemble(vals, defs, Value::Float)
        }
        ColumnReader::DoubleColumnReader(mut r) => {
            let (vals, defs) = read_typed(&mut r, rows, nullable).context(ParquetReadSnafu)?;
            assemble(vals, defs, Value::Double)
        }
        ColumnReader::ByteArrayColumnReader(mut r) => {
            let (vals, defs) = read_typed(&mut r, rows, nullable).context(ParquetReadSnafu)?;
            if field.physical == PhysicalType::Utf8 {
                let strings = vals
                    .into_iter()
                    .enumerate()
                    .map(|(value_index, v)| {
                        String::from_utf8(v.data().to_vec()).context(InvalidUtf8Snafu {
                            column: field.name.clone(),
                            value_index,
                        })
                    })
                    .collect::<ParquetResult<Vec<_>>>()?;
                assemble(strings, defs, Value::Utf8)
            } else {
                assemble(vals, defs, |v| Value::Bytes(v.data().to_vec()))
            }
        }
        ColumnReader::FixedLenByteArrayColumnReader(mut r) => {
            let (vals, defs) = read_typed(&mut r, rows, nullable).context(ParquetReadSnafu)?;
            assemble(vals, defs, |v| Value::FixedBytes(v.data().to_vec()))
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int96_bytes_are_little_endian_words() {
        let v = Int96::from(vec![0x0403_0201, 0x0807_0605, 0x0c0b_0a09]);
        assert_eq!(
            int96_to_bytes(&v),
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        );
    }

    #[test]
    fn assemble_interleaves_nulls() {
        let out = assemble(vec![1, 2], Some(vec![1, 0, 1, 0]), Value::Int32);
        assert_eq!(
            out,
            [Value::Int32(1), Value::Null, Value::Int32(2), Value::Null]
        );

        let dense = assemble(vec![true], None, Value::Boolean);
        assert_eq!(dense, [Value::Boolean(true)]);
    }

    #[test]
    fn open_rejects_garbage() {
        let err = ParquetRecordSource::open(
            Bytes::from_static(b"definitely not parquet"),
            &ReadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ParquetFormatError::ParquetRead { .. }));
    }
}
