//! Record-level Parquet transcoding.
//!
//! This crate reads Parquet files into schema-tagged generic records and
//! writes them back out unchanged, one file at a time:
//!
//! - A flat schema model and tagged records (`schema`, `record` modules).
//! - Decoders for INT96 timestamps and fixed-point decimals, used to inspect
//!   annotated values without altering them (`decode` module).
//! - A Parquet record source and sink built on typed column readers and
//!   writers (`formats::parquet`).
//! - The read-buffer-write pipeline, directory batches and checksum sidecar
//!   cleanup (`pipeline` module).
//! - Atomic publish and directory helpers for the local filesystem
//!   (`storage` module).
//!
//! The `pqtranscode` CLI is a thin front end over this crate.
#![deny(missing_docs)]
pub mod config;
pub mod decode;
pub mod formats;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod storage;

pub use config::{FailurePolicy, TranscodeOptions};
pub use decode::DisplayZone;
pub use pipeline::batch::{BatchReport, FileOutcome, transcode_directory, transcode_path};
pub use pipeline::{FileSummary, RecordCount, TranscodeError, transcode_file};
