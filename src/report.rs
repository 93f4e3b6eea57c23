//! Traversal results: the aggregated failure list and its renderings.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;

use crate::formats::{DownloadOutcome, FailureRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraversalReport {
    /// One per attempted item, in traversal order.
    pub outcomes: Vec<DownloadOutcome>,
    pub failures: Vec<FailureRecord>,
    /// Items never started because cancellation was requested.
    pub cancelled: usize,
}

impl TraversalReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }
}

/// Human-readable summary printed at the end of a download.
pub fn render(report: &TraversalReport) -> String {
    let mut out = format!(
        "{} downloaded, {} failed",
        report.succeeded(),
        report.failures.len()
    );
    if report.cancelled > 0 {
        out.push_str(&format!(", {} cancelled", report.cancelled));
    }
    out.push('\n');

    if report.failures.is_empty() {
        return out;
    }

    let rule = "-".repeat(70);
    out.push_str("Items with errors:\n");
    for failure in &report.failures {
        out.push_str(&rule);
        out.push('\n');
        if !failure.breadcrumb.is_empty() {
            out.push_str(&format!("  Path:   {}\n", failure.breadcrumb));
        }
        out.push_str(&format!("  Title:  {}\n", failure.title));
        out.push_str(&format!("  URL:    {}\n", failure.url));
        out.push_str(&format!("  Reason: {}\n", failure.reason));
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

/// Writes one JSON object per failure. Refuses to overwrite.
pub fn write_failures_jsonl(path: &Path, failures: &[FailureRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create report dir: {}", parent.display()))?;
        }
    }

    let mut out = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create failure report: {}", path.display()))?;
    for failure in failures {
        serde_json::to_writer(&mut out, failure).context("serialize failure record")?;
        out.write_all(b"\n").context("write failure report newline")?;
    }
    out.flush().context("flush failure report")?;
    Ok(())
}
