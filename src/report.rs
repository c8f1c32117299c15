//! JSON and HTML reports for a finished run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::runner::{RunSummary, TestResult, TestStatus};
use crate::session::Session;

/// A run's results plus totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub results: Vec<TestResult>,
}

impl Report {
    pub fn new(results: Vec<TestResult>) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: RunSummary::from_results(&results),
            results,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_html(&self) -> String {
        let mut rows = String::new();
        for r in &self.results {
            let color = match r.status {
                TestStatus::Passed => "green",
                TestStatus::Failed => "red",
            };
            let _ = writeln!(
                rows,
                "<tr><td>{}</td><td>{}</td><td style='color:{}'>{}</td><td>{}</td><td>{:.2}s</td></tr>",
                escape_html(&r.id),
                escape_html(&r.description),
                color,
                r.status,
                escape_html(r.error.as_deref().unwrap_or("")),
                r.duration
            );
        }

        let s = &self.summary;
        format!(
            "<!DOCTYPE html>
<html><head><meta charset='utf-8'><title>UI Test Report</title></head><body>
<h1>UI Test Report</h1>
<p>Generated: {generated}</p>
<p>{passed} passed, {failed} failed, {total} total in {duration:.2}s</p>
<table border='1' cellpadding='6'>
<tr><th>ID</th><th>Description</th><th>Status</th><th>Error</th><th>Duration</th></tr>
{rows}</table>
</body></html>
",
            generated = self.generated_at.to_rfc3339(),
            passed = s.passed,
            failed = s.failed,
            total = s.total,
            duration = s.duration,
            rows = rows
        )
    }

    /// Write `report.json` and `report.html` into the session directory.
    pub fn write(&self, session: &Session) -> std::io::Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(&session.dir)?;
        let json_path = session.report_json_path();
        let html_path = session.report_html_path();
        fs::write(&json_path, self.to_json()?)?;
        fs::write(&html_path, self.to_html())?;
        info!(dir = %session.dir.display(), "report written");
        Ok((json_path, html_path))
    }
}

/// Escape text for inclusion in HTML element content and attributes
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
