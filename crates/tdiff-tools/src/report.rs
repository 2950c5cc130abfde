// tdiff-tools/src/report.rs
//! Rendering comparison results for stdout

use std::path::Path;

use serde::Serialize;

use crate::compare::{Comparison, RecordDiff};

/// Report format on stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    file1: &'a Path,
    file2: &'a Path,
    records1: u64,
    records2: u64,
    compared: u64,
    first_diff: Option<RecordDiff>,
}

/// Header lines naming the two inputs
pub fn render_files(file1: &Path, file2: &Path) -> String {
    format!("file1: {}\nfile2: {}", file1.display(), file2.display())
}

/// Record-count line, printed before any record is read
pub fn render_counts(records1: u64, records2: u64, compared: u64) -> String {
    format!(
        "Number of records in file1 and file2: {} and {}. Will compare first {} records",
        records1, records2, compared
    )
}

/// `diff:` block for the first differing record
pub fn render_diff(first: &RecordDiff) -> String {
    format!("diff: {}: {}", first.record, first.diff)
}

/// Text lines following the file header
///
/// The `diff:` block appears only when a differing record was found.
pub fn render_text(comparison: &Comparison) -> String {
    let mut out = render_counts(comparison.records1, comparison.records2, comparison.compared);

    if let Some(first) = &comparison.first_diff {
        out.push('\n');
        out.push_str(&render_diff(first));
    }

    out
}

/// Single JSON object with every fact of the run
pub fn render_json(file1: &Path, file2: &Path, comparison: &Comparison) -> serde_json::Result<String> {
    let report = JsonReport {
        file1,
        file2,
        records1: comparison.records1,
        records2: comparison.records2,
        compared: comparison.compared,
        first_diff: comparison.first_diff,
    };
    serde_json::to_string_pretty(&report)
}

/// Full report in the requested format
pub fn render(
    format: OutputFormat,
    file1: &Path,
    file2: &Path,
    comparison: &Comparison,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(format!(
            "{}\n{}",
            render_files(file1, file2),
            render_text(comparison)
        )),
        OutputFormat::Json => render_json(file1, file2, comparison),
    }
}
