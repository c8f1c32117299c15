//! Artifact directory management.
//!
//! A session owns the directory where screenshots and reports land:
//! - Session metadata is written to `.session.json`
//! - Failure screenshots are named after the (sanitized) test case id
//! - Reports are written next to them

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::analyzer::CAPTURE_FILE;

const JSON_REPORT: &str = "report.json";
const HTML_REPORT: &str = "report.html";

/// Artifact directory for one run
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Root directory for this session
    pub dir: PathBuf,
    /// Target URL, recorded in the metadata
    pub url: Option<String>,
}

impl Session {
    /// Create a session in a specific directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(generate_session_id);

        Self { id, dir, url: None }
    }

    /// Record the target URL
    pub fn for_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Create the directory and write session metadata
    pub fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
            "url": self.url,
        });

        let metadata_path = self.dir.join(".session.json");
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        Ok(())
    }

    /// Path of the analysis screenshot
    pub fn capture_path(&self) -> PathBuf {
        self.dir.join(CAPTURE_FILE)
    }

    /// Path of the screenshot taken when test `id` fails
    pub fn failure_screenshot_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.png", sanitize_name(id)))
    }

    pub fn report_json_path(&self) -> PathBuf {
        self.dir.join(JSON_REPORT)
    }

    pub fn report_html_path(&self) -> PathBuf {
        self.dir.join(HTML_REPORT)
    }
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let pid = std::process::id();
    format!("session_{}_{}", timestamp, pid)
}

/// Sanitize a test id or name for use in filenames
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();
    match sanitized.as_str() {
        "" | "." | ".." => "unnamed".to_string(),
        _ => sanitized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_metadata() {
        let base = TempDir::new().unwrap();
        let dir = base.path().join("results");
        let session = Session::in_dir(&dir).for_url("https://app.test/");
        assert_eq!(session.id, "results");
        session.init().unwrap();

        let metadata: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(".session.json")).unwrap()).unwrap();
        assert_eq!(metadata["id"], "results");
        assert_eq!(metadata["url"], "https://app.test/");
        assert!(metadata["created"].is_string());
    }

    #[test]
    fn test_root_dir_gets_generated_id() {
        let session = Session::in_dir("/");
        assert!(session.id.starts_with("session_"));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("T1"), "T1");
        assert_eq!(sanitize_name("login test"), "login_test");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_name(".."), "unnamed");
        assert_eq!(sanitize_name(""), "unnamed");
    }

    #[test]
    fn test_artifact_paths() {
        let session = Session::in_dir("/tmp/pp-results");
        assert!(session.capture_path().ends_with("page_capture.png"));
        assert!(session.failure_screenshot_path("T 3").ends_with("T_3.png"));
        assert!(session.failure_screenshot_path("../up").ends_with(".._up.png"));
        assert!(session.report_json_path().ends_with("report.json"));
        assert!(session.report_html_path().ends_with("report.html"));
    }
}
