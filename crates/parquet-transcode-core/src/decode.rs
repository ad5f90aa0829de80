//! Physical-to-logical decoders for encodings without a native scalar form.
//!
//! Two encodings are covered:
//!
//! - **INT96 instants**: 12 bytes, where bytes 0..8 are a little-endian `i64`
//!   holding nanoseconds since midnight and bytes 8..12 are a little-endian
//!   `i32` Julian day number.
//! - **Fixed-point decimals**: big-endian two's-complement unscaled integers
//!   paired with a declared precision and scale.
//!
//! Everything here is pure: no I/O and no state. Decoded values are for
//! observation only; the transcode write path always re-emits the original
//! physical bytes.
//!
//! INT96 values carry no timezone. [`decode_instant96`] yields epoch
//! milliseconds as if the civil time were UTC, and rendering in any other zone
//! is an explicit presentation choice made through [`DisplayZone`].

use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset, Local, SecondsFormat, Utc};
use num_bigint::{BigInt, Sign};
use snafu::prelude::*;

use crate::record::Value;
use crate::schema::{FieldAnnotation, FieldDescriptor};

/// Julian day number of 1970-01-01.
pub const JULIAN_DAY_OF_EPOCH: i64 = 2_440_588;

/// Milliseconds in one civil day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Nanoseconds in one millisecond.
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Width in bytes of an INT96 value.
pub const INSTANT96_WIDTH: usize = 12;

/// Largest precision that may use the 64-bit decimal fast path.
pub const MAX_FAST_PATH_PRECISION: i32 = 18;

const TEN_POW_18: i64 = 1_000_000_000_000_000_000;
const TEN_POW_15: i64 = 1_000_000_000_000_000;

/// Errors raised when decoding a physical value.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    /// The byte sequence has the wrong length or shape for its encoding.
    #[snafu(display("Malformed {encoding} encoding: {detail}"))]
    MalformedEncoding {
        /// Encoding family being decoded (for example `int96`).
        encoding: &'static str,
        /// Description of the structural problem.
        detail: String,
    },

    /// The decoder was called with an out-of-range parameter.
    #[snafu(display("Invalid decimal parameter {parameter}={value}: {detail}"))]
    InvalidParameter {
        /// Parameter name (`precision` or `scale`).
        parameter: &'static str,
        /// Value that was rejected.
        value: i32,
        /// Why the value was rejected.
        detail: String,
    },
}

/// Result alias for decoder operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decode a 12-byte INT96 value into milliseconds since the Unix epoch.
///
/// No range validation is applied to the day or nanos fields; out-of-range
/// inputs produce an out-of-range but well-defined instant.
pub fn decode_instant96(bytes: &[u8]) -> DecodeResult<i64> {
    let raw: [u8; INSTANT96_WIDTH] = bytes.try_into().map_err(|_| {
        MalformedEncodingSnafu {
            encoding: "int96",
            detail: format!("expected {INSTANT96_WIDTH} bytes, got {}", bytes.len()),
        }
        .build()
    })?;

    let mut nanos = [0u8; 8];
    nanos.copy_from_slice(&raw[..8]);
    let mut day = [0u8; 4];
    day.copy_from_slice(&raw[8..]);

    let nanos_of_day = i64::from_le_bytes(nanos);
    let julian_day = i64::from(i32::from_le_bytes(day));

    Ok((julian_day - JULIAN_DAY_OF_EPOCH) * MILLIS_PER_DAY + nanos_of_day / NANOS_PER_MILLI)
}

/// Encode a Julian day and nanos-of-day pair into the 12-byte INT96 layout.
///
/// Inverse of [`decode_instant96`]; used to build fixtures and by callers that
/// need to produce INT96 values.
pub fn encode_instant96(julian_day: i32, nanos_of_day: i64) -> [u8; INSTANT96_WIDTH] {
    let mut out = [0u8; INSTANT96_WIDTH];
    out[..8].copy_from_slice(&nanos_of_day.to_le_bytes());
    out[8..].copy_from_slice(&julian_day.to_le_bytes());
    out
}

/// Unscaled decimal integer.
///
/// `Small` is only produced by the 64-bit fast path for magnitudes below
/// `10^18`; everything else is held as a [`BigInt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unscaled {
    /// Fits in an `i64` with magnitude below `10^18`.
    Small(i64),
    /// Arbitrary-precision value.
    Big(BigInt),
}

impl Unscaled {
    /// Convert to a [`BigInt`] regardless of representation.
    pub fn to_bigint(&self) -> BigInt {
        match self {
            Unscaled::Small(v) => BigInt::from(*v),
            Unscaled::Big(v) => v.clone(),
        }
    }

    fn sign_and_digits(&self) -> (bool, String) {
        match self {
            Unscaled::Small(v) => (*v < 0, v.unsigned_abs().to_string()),
            Unscaled::Big(v) => (v.sign() == Sign::Minus, v.magnitude().to_string()),
        }
    }
}

impl From<i64> for Unscaled {
    fn from(value: i64) -> Self {
        if value.unsigned_abs() >= TEN_POW_18 as u64 {
            Unscaled::Big(BigInt::from(value))
        } else {
            Unscaled::Small(value)
        }
    }
}

/// A decoded fixed-point decimal: `unscaled × 10^-scale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    /// Unscaled integer.
    pub unscaled: Unscaled,
    /// Number of digits to the right of the decimal point.
    pub scale: u32,
}

impl Decimal {
    /// Approximate the value as an `f64`, but only when that is exact enough
    /// to be safe for display (unscaled magnitude below `10^15`).
    pub fn to_f64_lossless(&self) -> Option<f64> {
        match &self.unscaled {
            Unscaled::Small(v) if v.unsigned_abs() < TEN_POW_15 as u64 => {
                Some(*v as f64 / 10f64.powi(i32::try_from(self.scale).ok()?))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (negative, mut digits) = self.unscaled.sign_and_digits();
        let scale = self.scale as usize;

        if scale > 0 {
            if digits.len() <= scale {
                let pad = scale + 1 - digits.len();
                digits.insert_str(0, &"0".repeat(pad));
            }
            digits.insert(digits.len() - scale, '.');
        }

        if negative {
            write!(f, "-{digits}")
        } else {
            f.write_str(&digits)
        }
    }
}

/// Decode a big-endian two's-complement unscaled integer into a [`Decimal`].
///
/// Precisions up to 18 take the 64-bit fast path when the bytes fit in
/// 8 bytes; precisions above 18 always use arbitrary precision.
pub fn decode_decimal(bytes: &[u8], precision: i32, scale: i32) -> DecodeResult<Decimal> {
    ensure!(
        !bytes.is_empty(),
        MalformedEncodingSnafu {
            encoding: "decimal",
            detail: "empty byte sequence".to_string(),
        }
    );
    let scale = validate_decimal_params(precision, scale)?;

    let unscaled = if precision <= MAX_FAST_PATH_PRECISION && bytes.len() <= 8 {
        Unscaled::from(fold_i64_be(bytes))
    } else {
        let big = BigInt::from_signed_bytes_be(bytes);
        match i64::try_from(&big) {
            // Wide storage for a small precision (zero/sign padded bytes).
            Ok(v) if precision <= MAX_FAST_PATH_PRECISION => Unscaled::from(v),
            _ => Unscaled::Big(big),
        }
    };

    Ok(Decimal { unscaled, scale })
}

/// Build a [`Decimal`] from an unscaled value stored as a native integer
/// (`INT32`/`INT64` decimal storage).
pub fn decimal_from_i64(unscaled: i64, precision: i32, scale: i32) -> DecodeResult<Decimal> {
    let scale = validate_decimal_params(precision, scale)?;
    let unscaled = if precision <= MAX_FAST_PATH_PRECISION {
        Unscaled::from(unscaled)
    } else {
        Unscaled::Big(BigInt::from(unscaled))
    };
    Ok(Decimal { unscaled, scale })
}

fn validate_decimal_params(precision: i32, scale: i32) -> DecodeResult<u32> {
    ensure!(
        precision >= 1,
        InvalidParameterSnafu {
            parameter: "precision",
            value: precision,
            detail: "must be >= 1".to_string(),
        }
    );
    u32::try_from(scale).map_err(|_| {
        InvalidParameterSnafu {
            parameter: "scale",
            value: scale,
            detail: "must be >= 0".to_string(),
        }
        .build()
    })
}

fn fold_i64_be(bytes: &[u8]) -> i64 {
    let acc = bytes
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)) as i64;
    let shift = 64 - 8 * bytes.len() as u32;
    if shift == 0 {
        acc
    } else {
        (acc << shift) >> shift
    }
}

/// A decoded logical value. Never written back to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalValue {
    /// Milliseconds since the Unix epoch, civil time interpreted as UTC.
    Instant {
        /// Signed epoch milliseconds.
        epoch_millis: i64,
    },
    /// Fixed-point decimal.
    Decimal(Decimal),
}

/// Zone in which decoded instants are rendered for display.
///
/// There is no `Default`; callers choose explicitly. `Local` depends on the
/// process environment, so output differs across machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayZone {
    /// Render in UTC.
    Utc,
    /// Render in the process-local zone (lossy).
    Local,
    /// Render at a fixed offset from UTC.
    Fixed(FixedOffset),
}

impl fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayZone::Utc => f.write_str("utc"),
            DisplayZone::Local => f.write_str("local"),
            DisplayZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// Error returned when parsing a [`DisplayZone`] from text.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(display("Invalid display zone '{spec}': expected 'utc', 'local' or a +HH:MM offset"))]
pub struct ParseDisplayZoneError {
    spec: String,
}

impl FromStr for DisplayZone {
    type Err = ParseDisplayZoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        match spec.to_ascii_lowercase().as_str() {
            "utc" | "z" => return Ok(DisplayZone::Utc),
            "local" => return Ok(DisplayZone::Local),
            _ => {}
        }

        parse_offset(spec)
            .map(DisplayZone::Fixed)
            .ok_or_else(|| ParseDisplayZoneSnafu { spec }.build())
    }
}

fn parse_offset(spec: &str) -> Option<FixedOffset> {
    let (sign, rest) = match spec.as_bytes().first()? {
        b'+' => (1, &spec[1..]),
        b'-' => (-1, &spec[1..]),
        _ => return None,
    };
    let (hh, mm) = rest.split_once(':')?;
    if hh.len() != 2 || mm.len() != 2 {
        return None;
    }
    let hours: i32 = hh.parse().ok()?;
    let minutes: i32 = mm.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Render epoch milliseconds as RFC 3339 text in the chosen zone.
///
/// Values outside chrono's range are rendered as raw milliseconds.
pub fn render_instant(epoch_millis: i64, zone: DisplayZone) -> String {
    let Some(utc) = DateTime::<Utc>::from_timestamp_millis(epoch_millis) else {
        return format!("{epoch_millis}ms (out of range)");
    };

    match zone {
        DisplayZone::Utc => utc.to_rfc3339_opts(SecondsFormat::Millis, true),
        DisplayZone::Local => utc
            .with_timezone(&Local)
            .to_rfc3339_opts(SecondsFormat::Millis, false),
        DisplayZone::Fixed(offset) => utc
            .with_timezone(&offset)
            .to_rfc3339_opts(SecondsFormat::Millis, false),
    }
}

impl LogicalValue {
    /// Render for display; instants use `zone`.
    pub fn render(&self, zone: DisplayZone) -> String {
        match self {
            LogicalValue::Instant { epoch_millis } => render_instant(*epoch_millis, zone),
            LogicalValue::Decimal(d) => d.to_string(),
        }
    }
}

/// Decode a field value according to its declared annotation.
///
/// Returns `Ok(None)` for nulls and for fields that carry no decodable
/// annotation; the decoder is chosen from the schema tag, never from the
/// runtime shape of the value.
pub fn decode_field(field: &FieldDescriptor, value: &Value) -> DecodeResult<Option<LogicalValue>> {
    if value.is_null() {
        return Ok(None);
    }

    match (&field.annotation, value) {
        (FieldAnnotation::Instant96, Value::FixedBytes(bytes)) => {
            decode_instant96(bytes).map(|epoch_millis| Some(LogicalValue::Instant { epoch_millis }))
        }
        (FieldAnnotation::Decimal { precision, scale }, Value::FixedBytes(bytes))
        | (FieldAnnotation::Decimal { precision, scale }, Value::Bytes(bytes)) => {
            decode_decimal(bytes, *precision, *scale).map(|d| Some(LogicalValue::Decimal(d)))
        }
        (FieldAnnotation::Decimal { precision, scale }, Value::Int32(v)) => {
            decimal_from_i64(i64::from(*v), *precision, *scale)
                .map(|d| Some(LogicalValue::Decimal(d)))
        }
        (FieldAnnotation::Decimal { precision, scale }, Value::Int64(v)) => {
            decimal_from_i64(*v, *precision, *scale).map(|d| Some(LogicalValue::Decimal(d)))
        }
        (FieldAnnotation::Instant96, other) | (FieldAnnotation::Decimal { .. }, other) => {
            MalformedEncodingSnafu {
                encoding: field.annotation.encoding_name(),
                detail: format!(
                    "field '{}' holds a {} value",
                    field.name,
                    other.type_name()
                ),
            }
            .fail()
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PhysicalType;

    #[test]
    fn epoch_day_at_midnight_is_zero() {
        let bytes = encode_instant96(2_440_588, 0);
        assert_eq!(decode_instant96(&bytes).unwrap(), 0);
        assert_eq!(
            render_instant(0, DisplayZone::Utc),
            "1970-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn last_millisecond_before_epoch() {
        let bytes = encode_instant96(2_440_587, 86_399_999_000_000);
        assert_eq!(decode_instant96(&bytes).unwrap(), -1);
    }

    #[test]
    fn instant96_is_deterministic() {
        let bytes = encode_instant96(2_459_000, 12_345_678_901_234);
        let a = decode_instant96(&bytes).unwrap();
        let b = decode_instant96(&bytes).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, (2_459_000 - 2_440_588) * MILLIS_PER_DAY + 12_345_678);
    }

    #[test]
    fn instant96_rejects_wrong_lengths() {
        for len in [0usize, 10, 11, 13] {
            let err = decode_instant96(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, DecodeError::MalformedEncoding { .. }), "len={len}");
        }
    }

    #[test]
    fn instant96_passes_out_of_range_nanos_through() {
        let bytes = encode_instant96(2_440_588, 2 * 86_400_000_000_000);
        assert_eq!(decode_instant96(&bytes).unwrap(), 2 * MILLIS_PER_DAY);
    }

    #[test]
    fn decimal_single_positive_byte() {
        let d = decode_decimal(&[0x64], 2, 0).unwrap();
        assert_eq!(d.unscaled, Unscaled::Small(100));
        assert_eq!(d.to_string(), "100");
    }

    #[test]
    fn decimal_negative_twos_complement() {
        let d = decode_decimal(&[0xFF, 0x9C], 4, 1).unwrap();
        assert_eq!(d.unscaled, Unscaled::Small(-100));
        assert_eq!(d.to_string(), "-10.0");
        assert_eq!(d.to_f64_lossless(), Some(-10.0));
    }

    #[test]
    fn decimal_pads_leading_zeros_after_point() {
        let d = decode_decimal(&[0x05], 3, 3).unwrap();
        assert_eq!(d.to_string(), "0.005");
        let d = decode_decimal(&[0xFB], 3, 2).unwrap();
        assert_eq!(d.to_string(), "-0.05");
    }

    #[test]
    fn decimal_eight_byte_fast_path_sign_extends() {
        let d = decode_decimal(&(-42i64).to_be_bytes(), 18, 0).unwrap();
        assert_eq!(d.unscaled, Unscaled::Small(-42));
    }

    #[test]
    fn decimal_high_precision_keeps_every_digit() {
        // 10^20 + 1 does not fit the fast path and must not lose precision.
        let value: BigInt = "100000000000000000001".parse().unwrap();
        let bytes = value.to_signed_bytes_be();
        let d = decode_decimal(&bytes, 21, 0).unwrap();
        assert_eq!(d.unscaled, Unscaled::Big(value));
        assert_eq!(d.to_string(), "100000000000000000001");
        assert_eq!(d.to_f64_lossless(), None);
    }

    #[test]
    fn decimal_high_precision_never_uses_small_repr() {
        let d = decode_decimal(&[0x01], 19, 0).unwrap();
        assert_eq!(d.unscaled, Unscaled::Big(BigInt::from(1)));
    }

    #[test]
    fn decimal_fast_path_large_magnitude_stays_exact() {
        let v = 1_234_567_890_123_456_789i64;
        let d = decode_decimal(&v.to_be_bytes(), 18, 2).unwrap();
        assert_eq!(d.unscaled, Unscaled::Big(BigInt::from(v)));
        assert_eq!(d.to_string(), "12345678901234567.89");
        assert_eq!(d.to_f64_lossless(), None);
    }

    #[test]
    fn decimal_rejects_bad_inputs() {
        assert!(matches!(
            decode_decimal(&[], 4, 0).unwrap_err(),
            DecodeError::MalformedEncoding { .. }
        ));
        assert!(matches!(
            decode_decimal(&[1], 0, 0).unwrap_err(),
            DecodeError::InvalidParameter { parameter: "precision", .. }
        ));
        assert!(matches!(
            decode_decimal(&[1], 4, -1).unwrap_err(),
            DecodeError::InvalidParameter { parameter: "scale", .. }
        ));
    }

    #[test]
    fn display_zone_parses_known_forms() {
        assert_eq!("UTC".parse::<DisplayZone>().unwrap(), DisplayZone::Utc);
        assert_eq!("local".parse::<DisplayZone>().unwrap(), DisplayZone::Local);
        let zone: DisplayZone = "+05:30".parse().unwrap();
        assert_eq!(
            zone,
            DisplayZone::Fixed(FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert_eq!(render_instant(0, zone), "1970-01-01T05:30:00.000+05:30");
        assert!("mars".parse::<DisplayZone>().is_err());
        assert!("+5:30".parse::<DisplayZone>().is_err());
    }

    #[test]
    fn decode_field_dispatches_on_annotation() {
        let ts = FieldDescriptor::new("ts", PhysicalType::FixedBytes(12), true)
            .with_annotation(FieldAnnotation::Instant96);
        let bytes = encode_instant96(2_440_589, 0).to_vec();
        assert_eq!(
            decode_field(&ts, &Value::FixedBytes(bytes)).unwrap(),
            Some(LogicalValue::Instant {
                epoch_millis: MILLIS_PER_DAY
            })
        );
        assert_eq!(decode_field(&ts, &Value::Null).unwrap(), None);

        let amount = FieldDescriptor::new("amount", PhysicalType::Int64, false).with_annotation(
            FieldAnnotation::Decimal {
                precision: 10,
                scale: 2,
            },
        );
        let decoded = decode_field(&amount, &Value::Int64(-1234)).unwrap().unwrap();
        assert_eq!(decoded.render(DisplayZone::Utc), "-12.34");

        let plain = FieldDescriptor::new("raw", PhysicalType::FixedBytes(12), false);
        assert_eq!(
            decode_field(&plain, &Value::FixedBytes(vec![0; 12])).unwrap(),
            None
        );
    }

    #[test]
    fn decode_field_flags_mismatched_storage() {
        let ts = FieldDescriptor::new("ts", PhysicalType::FixedBytes(12), false)
            .with_annotation(FieldAnnotation::Instant96);
        let err = decode_field(&ts, &Value::Int32(3)).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedEncoding { .. }));
    }
}
