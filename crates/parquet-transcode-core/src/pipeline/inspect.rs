//! Optional decode-and-log pass over buffered records.
//!
//! Inspection never changes what is written: records are borrowed, and a
//! value that fails to decode is logged and counted, not propagated.

use log::{debug, warn};

use crate::decode::{DisplayZone, decode_field};
use crate::record::GenericRecord;

/// How decoded values are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectOptions {
    /// Zone used to render decoded instants.
    pub zone: DisplayZone,
}

impl InspectOptions {
    /// Inspect with instants rendered in `zone`.
    pub fn new(zone: DisplayZone) -> Self {
        Self { zone }
    }
}

/// Counters gathered by [`inspect_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InspectStats {
    /// Annotated values decoded successfully.
    pub decoded: u64,
    /// Annotated values whose encoding was malformed.
    pub failures: u64,
}

/// Decode every annotated, non-null value in `records` and log it.
pub fn inspect_records(
    label: &str,
    records: &[GenericRecord],
    options: &InspectOptions,
) -> InspectStats {
    let mut stats = InspectStats::default();

    for (row, record) in records.iter().enumerate() {
        for (field, value) in record.iter().filter(|(f, _)| f.annotation.is_decodable()) {
            match decode_field(field, value) {
                Ok(Some(logical)) => {
                    stats.decoded += 1;
                    debug!(
                        "{label} row {row} {}: {}",
                        field.name,
                        logical.render(options.zone)
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    stats.failures += 1;
                    warn!("{label} row {row} {}: {e}", field.name);
                }
            }
        }
    }

    stats
}
