#![allow(dead_code)]

use std::{path::Path, sync::Arc};

use arrow::array::{Decimal128Builder, Float64Builder, StringBuilder, TimestampMillisecondBuilder};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn write_parquet_rows(path: &Path, rows: usize) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut ts_builder = TimestampMillisecondBuilder::with_capacity(rows);
    let mut sym_builder = StringBuilder::new();
    let mut price_builder = Decimal128Builder::with_capacity(rows).with_precision_and_scale(12, 4)?;
    let mut score_builder = Float64Builder::with_capacity(rows);
    let mut venue_builder = StringBuilder::new();

    let base_ts = 1_700_000_000_000i64;
    for i in 0..rows {
        ts_builder.append_value(base_ts + (i as i64) * 1_000);
        sym_builder.append_value("SYM1");
        price_builder.append_value(1_000_000 + i as i128);
        score_builder.append_value(i as f64 / 3.0);
        if i % 5 == 0 {
            venue_builder.append_null();
        } else {
            venue_builder.append_value(format!("X{}", i % 7));
        }
    }

    let schema = Schema::new(vec![
        Field::new(
            "ts",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("price", DataType::Decimal128(12, 4), false),
        Field::new("score", DataType::Float64, false),
        Field::new("venue", DataType::Utf8, true),
    ]);

    let batch = RecordBatch::try_new(
        Arc::new(schema.clone()),
        vec![
            Arc::new(ts_builder.finish()) as _,
            Arc::new(sym_builder.finish()),
            Arc::new(price_builder.finish()),
            Arc::new(score_builder.finish()),
            Arc::new(venue_builder.finish()),
        ],
    )?;

    let file = std::fs::File::create(path)?;
    let props = parquet::file::properties::WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, Arc::new(schema), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

/// Row count of the Parquet file at `path`, from its footer.
pub fn parquet_row_count(path: &Path) -> TestResult<i64> {
    use parquet::file::reader::{FileReader, SerializedFileReader};

    let file = std::fs::File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    Ok(reader.metadata().file_metadata().num_rows())
}
