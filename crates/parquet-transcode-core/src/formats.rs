//! Container-format adapters.
//!
//! Each submodule binds the generic record model to one on-disk format by
//! implementing [`crate::pipeline::RecordSource`] and
//! [`crate::pipeline::RecordSink`].

pub mod parquet;
