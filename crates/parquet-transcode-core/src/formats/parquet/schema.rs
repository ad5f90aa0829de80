//! Mapping between Parquet schemas and [`crate::schema::Schema`].

use std::sync::Arc;

use parquet::basic::{ConvertedType, LogicalType, Repetition, Type as ParquetPhysical};
use parquet::file::metadata::FileMetaData;
use parquet::schema::types::{ColumnDescPtr, Type as SchemaType, TypePtr};
use snafu::prelude::*;

use super::{
    InvalidSchemaSnafu, ParquetResult, ParquetWriteSnafu, ReadOptions, UnsupportedSchemaSnafu,
};
use crate::decode::INSTANT96_WIDTH;
use crate::schema::{FieldAnnotation, FieldDescriptor, PhysicalType, Schema};

fn decimal_params(col: &ColumnDescPtr, logical: Option<&LogicalType>) -> Option<(i32, i32)> {
    match logical {
        Some(LogicalType::Decimal { scale, precision }) => Some((*precision, *scale)),
        None if col.converted_type() == ConvertedType::DECIMAL => {
            Some((col.type_precision(), col.type_scale()))
        }
        _ => None,
    }
}

fn is_string(col: &ColumnDescPtr, logical: Option<&LogicalType>) -> bool {
    match logical {
        Some(LogicalType::String) => true,
        None => col.converted_type() == ConvertedType::UTF8,
        _ => false,
    }
}

fn field_from_column(
    col: &ColumnDescPtr,
    options: &ReadOptions,
) -> ParquetResult<FieldDescriptor> {
    let name = col.name().to_string();

    ensure!(
        col.max_rep_level() == 0 && col.path().parts().len() == 1,
        UnsupportedSchemaSnafu {
            column: col.path().string(),
            detail: "nested or repeated columns are not supported",
        }
    );

    let logical = col.logical_type_ref();
    let string = is_string(col, logical);
    let decimal = decimal_params(col, logical);

    let physical = match col.physical_type() {
        ParquetPhysical::BOOLEAN => PhysicalType::Boolean,
        ParquetPhysical::INT32 => PhysicalType::Int32,
        ParquetPhysical::INT64 => PhysicalType::Int64,
        ParquetPhysical::FLOAT => PhysicalType::Float,
        ParquetPhysical::DOUBLE => PhysicalType::Double,
        ParquetPhysical::BYTE_ARRAY if string => PhysicalType::Utf8,
        ParquetPhysical::BYTE_ARRAY => PhysicalType::Bytes,
        ParquetPhysical::FIXED_LEN_BYTE_ARRAY => {
            let width = usize::try_from(col.type_length())
                .ok()
                .filter(|w| *w > 0)
                .context(UnsupportedSchemaSnafu {
                    column: name.clone(),
                    detail: format!("invalid fixed length {}", col.type_length()),
                })?;
            PhysicalType::FixedBytes(width)
        }
        ParquetPhysical::INT96 => {
            ensure!(
                options.int96_as_fixed,
                UnsupportedSchemaSnafu {
                    column: name.clone(),
                    detail: "int96 columns require int96_as_fixed",
                }
            );
            PhysicalType::FixedBytes(INSTANT96_WIDTH)
        }
    };

    let annotation = if col.physical_type() == ParquetPhysical::INT96 {
        FieldAnnotation::Instant96
    } else if let Some((precision, scale)) = decimal {
        FieldAnnotation::Decimal { precision, scale }
    } else if string || (logical.is_none() && col.converted_type() == ConvertedType::NONE) {
        FieldAnnotation::None
    } else {
        FieldAnnotation::Passthrough {
            logical: logical.cloned(),
            converted: col.converted_type(),
        }
    };

    let nullable = col.self_type().get_basic_info().repetition() == Repetition::OPTIONAL;

    Ok(FieldDescriptor::new(name, physical, nullable).with_annotation(annotation))
}

/// Derive the record schema from a Parquet footer.
///
/// The root message name and the file's key/value metadata are carried on
/// the returned [`Schema`] so a writer can reproduce them.
pub fn schema_from_parquet(meta: &FileMetaData, options: &ReadOptions) -> ParquetResult<Schema> {
    let descr = meta.schema_descr();
    let root = descr.root_schema();

    for field in root.get_fields() {
        ensure!(
            field.is_primitive(),
            UnsupportedSchemaSnafu {
                column: field.name().to_string(),
                detail: "group fields are not supported",
            }
        );
    }

    let fields = descr
        .columns()
        .iter()
        .map(|col| field_from_column(col, options))
        .collect::<ParquetResult<Vec<_>>>()?;

    let metadata = meta
        .key_value_metadata()
        .map(|kvs| {
            kvs.iter()
                .map(|kv| (kv.key.clone(), kv.value.clone()))
                .collect()
        })
        .unwrap_or_default();

    Schema::try_new(root.name(), fields)
        .context(InvalidSchemaSnafu)
        .map(|schema| schema.with_metadata(metadata))
}

fn parquet_field(field: &FieldDescriptor) -> ParquetResult<SchemaType> {
    let repetition = if field.nullable {
        Repetition::OPTIONAL
    } else {
        Repetition::REQUIRED
    };

    let (physical, length) = match (field.physical, &field.annotation) {
        (PhysicalType::FixedBytes(INSTANT96_WIDTH), FieldAnnotation::Instant96) => {
            (ParquetPhysical::INT96, None)
        }
        (PhysicalType::Boolean, _) => (ParquetPhysical::BOOLEAN, None),
        (PhysicalType::Int32, _) => (ParquetPhysical::INT32, None),
        (PhysicalType::Int64, _) => (ParquetPhysical::INT64, None),
        (PhysicalType::Float, _) => (ParquetPhysical::FLOAT, None),
        (PhysicalType::Double, _) => (ParquetPhysical::DOUBLE, None),
        (PhysicalType::Utf8 | PhysicalType::Bytes, _) => (ParquetPhysical::BYTE_ARRAY, None),
        (PhysicalType::FixedBytes(width), _) => {
            let width = i32::try_from(width).ok().context(UnsupportedSchemaSnafu {
                column: field.name.clone(),
                detail: format!("fixed length {width} does not fit in i32"),
            })?;
            (ParquetPhysical::FIXED_LEN_BYTE_ARRAY, Some(width))
        }
    };

    let mut builder =
        SchemaType::primitive_type_builder(&field.name, physical).with_repetition(repetition);
    if let Some(length) = length {
        builder = builder.with_length(length);
    }

    // With a logical type present the builder derives the converted type.
    builder = match &field.annotation {
        FieldAnnotation::None if field.physical == PhysicalType::Utf8 => {
            builder.with_logical_type(Some(LogicalType::String))
        }
        FieldAnnotation::None | FieldAnnotation::Instant96 => builder,
        FieldAnnotation::Decimal { precision, scale } => builder
            .with_logical_type(Some(LogicalType::Decimal {
                scale: *scale,
                precision: *precision,
            }))
            .with_precision(*precision)
            .with_scale(*scale),
        FieldAnnotation::Passthrough {
            logical: Some(logical),
            ..
        } => builder.with_logical_type(Some(logical.clone())),
        FieldAnnotation::Passthrough {
            logical: None,
            converted,
        } => builder.with_converted_type(*converted),
    };

    builder.build().context(ParquetWriteSnafu)
}

/// Build the Parquet message type that stores records of `schema`.
pub fn parquet_schema(schema: &Schema) -> ParquetResult<TypePtr> {
    let fields = schema
        .fields()
        .iter()
        .map(|f| parquet_field(f).map(Arc::new))
        .collect::<ParquetResult<Vec<_>>>()?;

    let root = SchemaType::group_type_builder(schema.name())
        .with_fields(fields)
        .build()
        .context(ParquetWriteSnafu)?;

    Ok(Arc::new(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parquet::ParquetFormatError;
    use parquet::schema::parser::parse_message_type;
    use parquet::schema::types::SchemaDescriptor;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn file_meta(message: &str) -> Result<FileMetaData, Box<dyn std::error::Error>> {
        let root = Arc::new(parse_message_type(message)?);
        let descr = Arc::new(SchemaDescriptor::new(root));
        Ok(FileMetaData::new(1, 0, None, None, descr, None))
    }

    #[test]
    fn maps_flat_annotated_columns() -> TestResult {
        let meta = file_meta(
            "message trades {
                required int64 id;
                optional int96 ts;
                optional fixed_len_byte_array(8) price (DECIMAL(18, 4));
                optional binary name (UTF8);
                required int32 qty (DECIMAL(9, 2));
                optional int64 at (TIMESTAMP_MILLIS);
            }",
        )?;

        let schema = schema_from_parquet(&meta, &ReadOptions::default())?;
        assert_eq!(schema.name(), "trades");

        let fields = schema.fields();
        assert_eq!(fields[0], FieldDescriptor::new("id", PhysicalType::Int64, false));
        assert_eq!(fields[1].physical, PhysicalType::FixedBytes(12));
        assert_eq!(fields[1].annotation, FieldAnnotation::Instant96);
        assert!(fields[1].nullable);
        assert_eq!(
            fields[2].annotation,
            FieldAnnotation::Decimal {
                precision: 18,
                scale: 4
            }
        );
        assert_eq!(fields[3].physical, PhysicalType::Utf8);
        assert_eq!(fields[3].annotation, FieldAnnotation::None);
        assert_eq!(
            fields[4].annotation,
            FieldAnnotation::Decimal {
                precision: 9,
                scale: 2
            }
        );
        assert!(matches!(
            fields[5].annotation,
            FieldAnnotation::Passthrough { .. }
        ));
        Ok(())
    }

    #[test]
    fn rejects_nested_groups() -> TestResult {
        let meta = file_meta(
            "message m {
                required int32 a;
                optional group inner {
                    required int32 b;
                }
            }",
        )?;
        let err = schema_from_parquet(&meta, &ReadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ParquetFormatError::UnsupportedSchema { ref column, .. } if column == "inner"
        ));
        Ok(())
    }

    #[test]
    fn int96_rejected_when_not_surfaced_as_fixed() -> TestResult {
        let meta = file_meta("message m { optional int96 ts; }")?;
        let options = ReadOptions {
            int96_as_fixed: false,
        };
        assert!(schema_from_parquet(&meta, &options).is_err());
        Ok(())
    }

    #[test]
    fn parquet_schema_reproduces_column_types() -> TestResult {
        let meta = file_meta(
            "message trades {
                required int64 id;
                optional int96 ts;
                optional fixed_len_byte_array(16) big (DECIMAL(38, 10));
                optional binary name (UTF8);
                optional int32 day (DATE);
                optional binary raw;
            }",
        )?;
        let schema = schema_from_parquet(&meta, &ReadOptions::default())?;

        let descr = Arc::new(SchemaDescriptor::new(parquet_schema(&schema)?));
        assert_eq!(descr.column(1).physical_type(), ParquetPhysical::INT96);
        assert_eq!(descr.column(2).type_length(), 16);

        let again = schema_from_parquet(
            &FileMetaData::new(1, 0, None, None, descr, None),
            &ReadOptions::default(),
        )?;
        assert_eq!(again, schema);
        Ok(())
    }
}
