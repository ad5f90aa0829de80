//! CLI tool for transcoding Parquet files record by record.

mod error;
mod report;

use std::path::PathBuf;

use clap::Parser;
use parquet_transcode_core::{DisplayZone, FailurePolicy, TranscodeOptions, transcode_path};
use snafu::{ResultExt, ensure};

use crate::{
    error::{
        CliResult, FilesFailedSnafu, InvalidRowGroupRowsSnafu, JsonReportSnafu, TranscodeSnafu,
    },
    report::{ReportJson, render_text},
};

/// Read Parquet files into generic records and write them back out.
///
/// INPUT may be a single file or a directory; every file directly inside a
/// directory is transcoded into OUTPUT_DIR under the same name.
#[derive(Debug, Parser)]
#[command(name = "pqtranscode", version)]
struct Cli {
    /// Parquet file or directory of Parquet files.
    input: PathBuf,

    /// Directory receiving the transcoded files (created if missing).
    output_dir: PathBuf,

    /// Decode INT96 and decimal values and log them at debug level.
    #[arg(long, default_value_t = false, requires = "display_zone")]
    inspect: bool,

    /// Zone used to render decoded instants: `utc`, `local` or `+HH:MM`.
    #[arg(long = "display-zone")]
    display_zone: Option<DisplayZone>,

    /// Stop at the first file that fails instead of continuing.
    #[arg(long = "fail-fast", default_value_t = false)]
    fail_fast: bool,

    /// Maximum rows per output row group.
    #[arg(long = "row-group-rows")]
    row_group_rows: Option<usize>,

    /// Print the report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Cli {
    fn options(&self) -> CliResult<TranscodeOptions> {
        let mut options = TranscodeOptions::new().with_failure_policy(if self.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        });

        if let Some(rows) = self.row_group_rows {
            ensure!(rows > 0, InvalidRowGroupRowsSnafu);
            options = options.with_row_group_rows(rows);
        }
        if let (true, Some(zone)) = (self.inspect, self.display_zone) {
            options = options.with_inspect(zone);
        }
        Ok(options)
    }
}

fn init_logging(inspect: bool) {
    let default_filter = if inspect {
        "info,parquet_transcode_core=debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.inspect);
    let options = cli.options()?;

    let report = transcode_path(&cli.input, &cli.output_dir, &options)
        .await
        .context(TranscodeSnafu {
            input: cli.input.display().to_string(),
        })?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&ReportJson::from(&report)).context(JsonReportSnafu)?;
        println!("{json}");
    } else {
        print!("{}", render_text(&report));
    }

    let failed = report.failures().count();
    ensure!(
        failed == 0,
        FilesFailedSnafu {
            failed,
            total: report.files.len(),
        }
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
