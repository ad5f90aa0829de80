//! Generic, schema-tagged records.
//!
//! A [`GenericRecord`] holds exactly one [`Value`] per schema field, in schema
//! order, and a shared handle to that schema.

use std::fmt;

use snafu::prelude::*;

use crate::schema::{FieldDescriptor, PhysicalType, SchemaRef};

/// A tagged physical value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null for a nullable field.
    Null,
    /// Boolean.
    Boolean(bool),
    /// 32-bit integer.
    Int32(i32),
    /// 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    Utf8(String),
    /// Variable-length bytes.
    Bytes(Vec<u8>),
    /// Fixed-length bytes.
    FixedBytes(Vec<u8>),
}

impl Value {
    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the value's tag, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Utf8(_) => "utf8",
            Value::Bytes(_) => "bytes",
            Value::FixedBytes(_) => "fixed",
        }
    }

    /// Whether a non-null value can be stored under `physical`.
    pub fn matches_physical(&self, physical: PhysicalType) -> bool {
        match (self, physical) {
            (Value::Boolean(_), PhysicalType::Boolean)
            | (Value::Int32(_), PhysicalType::Int32)
            | (Value::Int64(_), PhysicalType::Int64)
            | (Value::Float(_), PhysicalType::Float)
            | (Value::Double(_), PhysicalType::Double)
            | (Value::Utf8(_), PhysicalType::Utf8)
            | (Value::Bytes(_), PhysicalType::Bytes) => true,
            (Value::FixedBytes(b), PhysicalType::FixedBytes(n)) => b.len() == n,
            _ => false,
        }
    }

    /// Bit-level equality: floats compare by their IEEE bit patterns, so
    /// `NaN == NaN` and `0.0 != -0.0`.
    pub fn bit_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Utf8(v) => write!(f, "{v:?}"),
            Value::Bytes(v) | Value::FixedBytes(v) => {
                f.write_str("0x")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Violations of the record/schema invariant.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum RecordError {
    /// The record does not have one value per schema field.
    #[snafu(display("Record has {actual} values but schema has {expected} fields"))]
    Arity {
        /// Number of schema fields.
        expected: usize,
        /// Number of supplied values.
        actual: usize,
    },

    /// A value's tag does not match its field's physical type.
    #[snafu(display("Field '{field}' expects {expected} but got {actual}"))]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Declared physical type.
        expected: PhysicalType,
        /// Tag of the supplied value.
        actual: &'static str,
    },

    /// A null was supplied for a required field.
    #[snafu(display("Field '{field}' is required but the value is null"))]
    NullInRequired {
        /// Field name.
        field: String,
    },

    /// A record was handed to a sink that was opened with another schema.
    #[snafu(display("Record schema does not match the sink schema"))]
    SchemaMismatch,
}

/// One row of a file.
#[derive(Debug, Clone)]
pub struct GenericRecord {
    schema: SchemaRef,
    values: Vec<Value>,
}

fn check_value(field: &FieldDescriptor, value: &Value) -> Result<(), RecordError> {
    if value.is_null() {
        ensure!(
            field.nullable,
            NullInRequiredSnafu {
                field: field.name.clone(),
            }
        );
        return Ok(());
    }

    ensure!(
        value.matches_physical(field.physical),
        TypeMismatchSnafu {
            field: field.name.clone(),
            expected: field.physical,
            actual: value.type_name(),
        }
    );
    Ok(())
}

impl GenericRecord {
    /// Build a record, checking arity, tags and nullability against `schema`.
    pub fn try_new(schema: SchemaRef, values: Vec<Value>) -> Result<Self, RecordError> {
        ensure!(
            values.len() == schema.len(),
            AritySnafu {
                expected: schema.len(),
                actual: values.len(),
            }
        );
        for (field, value) in schema.fields().iter().zip(&values) {
            check_value(field, value)?;
        }
        Ok(Self { schema, values })
    }

    /// Schema shared by every record of the same file.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Values in schema order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at `index`.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the field called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Iterate `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.schema.fields().iter().zip(&self.values)
    }

    /// Value-for-value bit equality, including schema equality.
    pub fn bit_eq(&self, other: &GenericRecord) -> bool {
        (std::sync::Arc::ptr_eq(&self.schema, &other.schema) || self.schema == other.schema)
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.bit_eq(b))
    }
}

impl fmt::Display for GenericRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {value}", field.name)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::Schema;

    fn schema() -> SchemaRef {
        Arc::new(
            Schema::try_new(
                "m",
                vec![
                    FieldDescriptor::new("id", PhysicalType::Int64, false),
                    FieldDescriptor::new("name", PhysicalType::Utf8, true),
                    FieldDescriptor::new("tag", PhysicalType::FixedBytes(2), false),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn accepts_matching_values() {
        let rec = GenericRecord::try_new(
            schema(),
            vec![Value::Int64(7), Value::Null, Value::FixedBytes(vec![1, 2])],
        )
        .unwrap();
        assert_eq!(rec.get("id"), Some(&Value::Int64(7)));
        assert_eq!(rec.get("name"), Some(&Value::Null));
        assert_eq!(rec.to_string(), "{id: 7, name: null, tag: 0x0102}");
    }

    #[test]
    fn rejects_wrong_arity() {
        let err = GenericRecord::try_new(schema(), vec![Value::Int64(7)]).unwrap_err();
        assert_eq!(
            err,
            RecordError::Arity {
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn rejects_null_in_required_and_bad_width() {
        let err = GenericRecord::try_new(
            schema(),
            vec![Value::Null, Value::Null, Value::FixedBytes(vec![1, 2])],
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::NullInRequired { .. }));

        let err = GenericRecord::try_new(
            schema(),
            vec![Value::Int64(1), Value::Null, Value::FixedBytes(vec![1])],
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::TypeMismatch { .. }));
    }

    #[test]
    fn bit_eq_distinguishes_float_patterns() {
        assert!(Value::Double(f64::NAN).bit_eq(&Value::Double(f64::NAN)));
        assert!(!Value::Float(0.0).bit_eq(&Value::Float(-0.0)));
        assert!(Value::Utf8("x".into()).bit_eq(&Value::Utf8("x".into())));
    }
}
