//! In-memory schema model shared by every record of one file.
//!
//! A [`Schema`] is an ordered list of [`FieldDescriptor`]s with unique names.
//! Each field declares a [`PhysicalType`] tag plus a [`FieldAnnotation`] that
//! records the logical meaning the container attached to it, so the decoder
//! and the writer select behaviour by matching on tags.

use std::{collections::HashSet, fmt, sync::Arc};

use parquet::basic::{ConvertedType, LogicalType};
use snafu::prelude::*;

/// Shared, read-only handle to a schema. Records hold clones of this `Arc`.
pub type SchemaRef = Arc<Schema>;

/// Physical storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    /// Boolean.
    Boolean,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// UTF-8 string stored as variable-length bytes.
    Utf8,
    /// Variable-length bytes.
    Bytes,
    /// Fixed-length bytes of the given width.
    FixedBytes(usize),
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalType::Boolean => f.write_str("boolean"),
            PhysicalType::Int32 => f.write_str("int32"),
            PhysicalType::Int64 => f.write_str("int64"),
            PhysicalType::Float => f.write_str("float"),
            PhysicalType::Double => f.write_str("double"),
            PhysicalType::Utf8 => f.write_str("utf8"),
            PhysicalType::Bytes => f.write_str("bytes"),
            PhysicalType::FixedBytes(n) => write!(f, "fixed({n})"),
        }
    }
}

/// Logical meaning attached to a field by the container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldAnnotation {
    /// No annotation.
    #[default]
    None,
    /// A 96-bit Julian-day/nanos instant, surfaced as `FixedBytes(12)`.
    Instant96,
    /// Fixed-point decimal with the given precision and scale.
    Decimal {
        /// Maximum number of significant digits.
        precision: i32,
        /// Digits to the right of the decimal point.
        scale: i32,
    },
    /// Any other container annotation, carried opaquely so it can be
    /// written back unchanged.
    Passthrough {
        /// Logical type annotation, when present.
        logical: Option<LogicalType>,
        /// Legacy converted type annotation.
        converted: ConvertedType,
    },
}

impl FieldAnnotation {
    /// Short name of the encoding family this annotation selects.
    pub fn encoding_name(&self) -> &'static str {
        match self {
            FieldAnnotation::None => "plain",
            FieldAnnotation::Instant96 => "int96",
            FieldAnnotation::Decimal { .. } => "decimal",
            FieldAnnotation::Passthrough { .. } => "passthrough",
        }
    }

    /// Whether [`crate::decode::decode_field`] can produce a logical value.
    pub fn is_decodable(&self) -> bool {
        matches!(
            self,
            FieldAnnotation::Instant96 | FieldAnnotation::Decimal { .. }
        )
    }
}

/// One named, typed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name, unique within its schema.
    pub name: String,
    /// Physical storage tag.
    pub physical: PhysicalType,
    /// Logical annotation.
    pub annotation: FieldAnnotation,
    /// Whether the field admits explicit nulls.
    pub nullable: bool,
}

impl FieldDescriptor {
    /// Create an unannotated field.
    pub fn new(name: impl Into<String>, physical: PhysicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            physical,
            annotation: FieldAnnotation::None,
            nullable,
        }
    }

    /// Attach an annotation.
    pub fn with_annotation(mut self, annotation: FieldAnnotation) -> Self {
        self.annotation = annotation;
        self
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = if self.nullable { "?" } else { "" };
        match &self.annotation {
            FieldAnnotation::None => write!(f, "{}{q}: {}", self.name, self.physical),
            FieldAnnotation::Instant96 => write!(f, "{}{q}: {} (int96)", self.name, self.physical),
            FieldAnnotation::Decimal { precision, scale } => write!(
                f,
                "{}{q}: {} (decimal({precision},{scale}))",
                self.name, self.physical
            ),
            FieldAnnotation::Passthrough { logical, converted } => write!(
                f,
                "{}{q}: {} ({logical:?}/{converted})",
                self.name, self.physical
            ),
        }
    }
}

/// Errors raised while constructing a schema.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum SchemaError {
    /// Two fields share a name.
    #[snafu(display("Duplicate field name: {field}"))]
    DuplicateField {
        /// The repeated name.
        field: String,
    },

    /// A fixed-width field declared a zero width.
    #[snafu(display("Fixed-length field '{field}' must have a positive width"))]
    ZeroWidth {
        /// Field with the invalid width.
        field: String,
    },

    /// An INT96 annotation on something other than 12 fixed bytes.
    #[snafu(display("Field '{field}' is annotated int96 but stored as {physical}"))]
    Instant96Width {
        /// Offending field.
        field: String,
        /// Declared physical type.
        physical: PhysicalType,
    },
}

/// Ordered, immutable set of fields plus file-level key/value metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDescriptor>,
    metadata: Vec<(String, Option<String>)>,
}

impl Schema {
    /// Construct a validated schema (rejects duplicate names and bad widths).
    pub fn try_new(
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for field in &fields {
            ensure!(
                seen.insert(field.name.as_str()),
                DuplicateFieldSnafu {
                    field: field.name.clone(),
                }
            );
            if field.physical == PhysicalType::FixedBytes(0) {
                return ZeroWidthSnafu {
                    field: field.name.clone(),
                }
                .fail();
            }
            if field.annotation == FieldAnnotation::Instant96 {
                ensure!(
                    field.physical == PhysicalType::FixedBytes(12),
                    Instant96WidthSnafu {
                        field: field.name.clone(),
                        physical: field.physical,
                    }
                );
            }
        }

        Ok(Self {
            name: name.into(),
            fields,
            metadata: Vec::new(),
        })
    }

    /// Attach file-level key/value metadata, kept in original order.
    pub fn with_metadata(mut self, metadata: Vec<(String, Option<String>)>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Name of the root message.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the fields in order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// File-level key/value metadata.
    pub fn metadata(&self) -> &[(String, Option<String>)] {
        &self.metadata
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the field called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Field names in schema order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ ", self.name)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        f.write_str(" }")
    }
}
