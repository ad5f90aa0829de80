#![allow(dead_code)]

use std::{fs::File, path::Path, sync::Arc};

use arrow::array::{
    BinaryBuilder, BooleanBuilder, Decimal128Builder, Float32Builder, Float64Builder,
    Int32Builder, Int64Builder, StringBuilder, TimestampMillisecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::column::writer::ColumnWriter;
use parquet::data_type::Int96;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use parquet_transcode_core::formats::parquet::{ReadOptions, read_all_records};
use parquet_transcode_core::record::GenericRecord;
use parquet_transcode_core::schema::SchemaRef;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Julian day number of 1970-01-01.
pub const EPOCH_JULIAN_DAY: u32 = 2_440_588;

/// Write `rows` trade-like rows covering every primitive type, nullable
/// strings and decimals stored as INT64 and as fixed-length bytes.
pub fn write_trades(path: &Path, rows: usize) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut ts_builder = TimestampMillisecondBuilder::with_capacity(rows);
    let mut sym_builder = StringBuilder::new();
    let mut venue_builder = StringBuilder::new();
    let mut price_builder = Decimal128Builder::with_capacity(rows).with_precision_and_scale(18, 4)?;
    let mut notional_builder =
        Decimal128Builder::with_capacity(rows).with_precision_and_scale(30, 2)?;
    let mut qty_builder = Int32Builder::with_capacity(rows);
    let mut seq_builder = Int64Builder::with_capacity(rows);
    let mut ratio_builder = Float32Builder::with_capacity(rows);
    let mut score_builder = Float64Builder::with_capacity(rows);
    let mut trade_builder = BooleanBuilder::with_capacity(rows);
    let mut payload_builder = BinaryBuilder::new();

    let mut seed = 0xBAD_5EED_u64;
    let base_ts = 1_700_000_000_000i64;
    for i in 0..rows {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let rnd = seed;

        ts_builder.append_value(base_ts + (i as i64) * 1_000);
        sym_builder.append_value(format!("SYM{}", rnd % 3));
        if i % 4 == 0 {
            venue_builder.append_null();
        } else {
            venue_builder.append_value(format!("X{}", (rnd % 7) + 1));
        }
        price_builder.append_value(1_000_000 + (rnd % 10_000) as i128);
        if i % 3 == 0 {
            notional_builder.append_null();
        } else {
            notional_builder.append_value(-(10_i128.pow(25)) - (rnd % 1_000) as i128);
        }
        qty_builder.append_value((rnd % 500) as i32 - 250);
        seq_builder.append_value(i as i64);
        ratio_builder.append_value(if i % 5 == 0 { f32::NAN } else { i as f32 / 7.0 });
        score_builder.append_value(if i % 6 == 0 { -0.0 } else { rnd as f64 / 3.0 });
        trade_builder.append_value(i % 2 == 0);
        payload_builder.append_value([i as u8, (i.wrapping_mul(3)) as u8]);
    }

    let schema = Schema::new(vec![
        Field::new(
            "ts",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("venue", DataType::Utf8, true),
        Field::new("price", DataType::Decimal128(18, 4), false),
        Field::new("notional", DataType::Decimal128(30, 2), true),
        Field::new("qty", DataType::Int32, false),
        Field::new("seq", DataType::Int64, false),
        Field::new("ratio", DataType::Float32, false),
        Field::new("score", DataType::Float64, false),
        Field::new("is_trade", DataType::Boolean, false),
        Field::new("payload", DataType::Binary, false),
    ]);

    let batch = RecordBatch::try_new(
        Arc::new(schema.clone()),
        vec![
            Arc::new(ts_builder.finish()) as _,
            Arc::new(sym_builder.finish()),
            Arc::new(venue_builder.finish()),
            Arc::new(price_builder.finish()),
            Arc::new(notional_builder.finish()),
            Arc::new(qty_builder.finish()),
            Arc::new(seq_builder.finish()),
            Arc::new(ratio_builder.finish()),
            Arc::new(score_builder.finish()),
            Arc::new(trade_builder.finish()),
            Arc::new(payload_builder.finish()),
        ],
    )?;

    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, Arc::new(schema), Some(props))?;
    if rows > 0 {
        writer.write(&batch)?;
    }
    writer.close()?;

    Ok(())
}

/// INT96 value for `julian_day` plus `nanos` nanoseconds.
pub fn int96(julian_day: u32, nanos: u64) -> Int96 {
    Int96::from(vec![nanos as u32, (nanos >> 32) as u32, julian_day])
}

/// Write a Spark-style file with a required `id` and an optional INT96 `ts`.
pub fn write_int96_file(path: &Path, values: &[Option<Int96>]) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let schema = Arc::new(parse_message_type(
        "message spark_schema {
            required int64 id;
            optional int96 ts;
        }",
    )?);
    let ids: Vec<i64> = (0..values.len() as i64).collect();
    let present: Vec<Int96> = values.iter().flatten().cloned().collect();
    let defs: Vec<i16> = values.iter().map(|v| i16::from(v.is_some())).collect();

    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    let mut writer = SerializedFileWriter::new(file, schema, Arc::new(props))?;

    let mut row_group_writer = writer.next_row_group()?;
    while let Some(mut col_writer) = row_group_writer.next_column()? {
        match col_writer.untyped() {
            ColumnWriter::Int64ColumnWriter(typed) => {
                typed.write_batch(&ids, None, None)?;
            }
            ColumnWriter::Int96ColumnWriter(typed) => {
                typed.write_batch(&present, Some(&defs), None)?;
            }
            _ => return Err("unexpected column writer type".into()),
        }
        col_writer.close()?;
    }
    row_group_writer.close()?;
    writer.close()?;

    Ok(())
}

/// Read every record of the Parquet file at `path`.
pub fn read_records(path: &Path) -> TestResult<(SchemaRef, Vec<GenericRecord>)> {
    let bytes = std::fs::read(path)?;
    Ok(read_all_records(Bytes::from(bytes), &ReadOptions::default())?)
}

/// Assert two record lists are value-for-value bit-identical.
pub fn assert_records_identical(expected: &[GenericRecord], actual: &[GenericRecord]) {
    assert_eq!(expected.len(), actual.len(), "record counts differ");
    for (i, (a, b)) in expected.iter().zip(actual).enumerate() {
        assert!(a.bit_eq(b), "record {i} differs:\n  {a}\n  {b}");
    }
}
