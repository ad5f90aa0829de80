use parquet_transcode_core::TranscodeError;

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("--row-group-rows must be at least 1"))]
    InvalidRowGroupRows,

    #[snafu(display("Transcode of {input} failed: {source}"))]
    Transcode {
        input: String,
        #[snafu(source(from(TranscodeError, Box::new)))]
        source: Box<TranscodeError>,
    },

    #[snafu(display("Failed to encode the JSON report: {source}"))]
    JsonReport { source: serde_json::Error },

    #[snafu(display("{failed} of {total} files failed to transcode"))]
    FilesFailed { failed: usize, total: usize },
}
