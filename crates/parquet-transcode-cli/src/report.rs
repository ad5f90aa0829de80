//! Rendering of batch reports for the terminal.

use parquet_transcode_core::BatchReport;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct FileJson {
    pub input: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_failures: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportJson {
    pub files: Vec<FileJson>,
    pub succeeded: usize,
    pub failed: usize,
    pub total_records: u64,
    pub removed_sidecars: Vec<String>,
    pub sidecar_failures: Vec<String>,
    pub cancelled: bool,
}

impl From<&BatchReport> for ReportJson {
    fn from(report: &BatchReport) -> Self {
        let files: Vec<FileJson> = report
            .files
            .iter()
            .map(|f| {
                let (records, decode_failures, error) = match &f.result {
                    Ok(summary) => (Some(summary.records), Some(summary.decode_failures), None),
                    Err(e) => (None, None, Some(e.to_string())),
                };
                FileJson {
                    input: f.input.display().to_string(),
                    output: f.output.display().to_string(),
                    records,
                    decode_failures,
                    error,
                }
            })
            .collect();
        let failed = report.failures().count();

        ReportJson {
            succeeded: files.len() - failed,
            failed,
            files,
            total_records: report.total_records(),
            removed_sidecars: report
                .removed_sidecars
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            sidecar_failures: report
                .sidecar_failures
                .iter()
                .map(|e| e.to_string())
                .collect(),
            cancelled: report.cancelled,
        }
    }
}

/// One line per file plus a closing summary line.
pub fn render_text(report: &BatchReport) -> String {
    let mut out = String::new();
    for f in &report.files {
        match &f.result {
            Ok(summary) => out.push_str(&format!(
                "ok      {} -> {} ({} records)\n",
                f.input.display(),
                f.output.display(),
                summary.records
            )),
            Err(e) => out.push_str(&format!("FAILED  {}: {e}\n", f.input.display())),
        }
    }
    for e in &report.sidecar_failures {
        out.push_str(&format!("warning {e}\n"));
    }

    let failed = report.failures().count();
    out.push_str(&format!(
        "Transcoded {} of {} files ({} records)",
        report.files.len() - failed,
        report.files.len(),
        report.total_records()
    ));
    if !report.removed_sidecars.is_empty() {
        out.push_str(&format!(
            ", removed {} sidecar files",
            report.removed_sidecars.len()
        ));
    }
    if report.cancelled {
        out.push_str(", cancelled");
    }
    out.push('\n');
    out
}
