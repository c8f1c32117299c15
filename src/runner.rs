//! Test cases, their results, and the runner that replays them.
//!
//! One browser session and one page serve the whole run. Cases execute in
//! order and share page state: whatever a case leaves behind (navigation,
//! filled fields) is what the next case starts from, unless
//! [`RunnerConfig::reset_between_tests`] is set.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::action::ActionDescriptor;
use crate::analyzer::write_artifact;
use crate::browser::{DriverError, Launcher, PageDriver, bounded, navigate, release};
use crate::config;
use crate::interpreter::{FailureKind, StepInterpreter};
use crate::session::Session;

/// A named scenario: an ordered list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique within a run
    pub id: String,

    pub description: String,

    pub steps: Vec<ActionDescriptor>,

    /// Expected outcome in prose, when the generator supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl TestCase {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<ActionDescriptor>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            steps,
            expected: None,
        }
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Passed => f.write_str("passed"),
            TestStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Recorded result of replaying one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,

    pub description: String,

    pub status: TestStatus,

    /// Failure message; `None` when passed
    pub error: Option<String>,

    /// Elapsed wall time in seconds
    pub duration: f64,

    /// Zero-based index of the step that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// Screenshot taken at the moment of failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Totals over a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Sum of case durations in seconds
    pub duration: f64,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration: results.iter().map(|r| r.duration).sum(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Errors that abort a whole run
#[derive(Debug, Error)]
pub enum RunError {
    /// The target page never loaded; no case was executed
    #[error(transparent)]
    Navigation(DriverError),

    #[error(transparent)]
    Launch(DriverError),

    #[error("failed to prepare artifact directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runner settings
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Page load and browser launch bound (default: 30s)
    pub nav_timeout: Duration,
    /// Locate/act bound per step, also used for screenshots and close (default: 10s)
    pub step_timeout: Duration,
    /// Where failure screenshots are written
    pub artifacts: Session,
    /// Re-navigate to the target URL before every case after the first
    pub reset_between_tests: bool,
    /// Capture the whole page on failure rather than the viewport
    pub full_page: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            nav_timeout: Duration::from_secs(cfg.timeouts.navigation_secs),
            step_timeout: Duration::from_secs(cfg.timeouts.step_secs),
            artifacts: Session::in_dir(&cfg.session.results_dir),
            reset_between_tests: cfg.run.reset_between_tests,
            full_page: true,
        }
    }
}

impl RunnerConfig {
    pub fn nav_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout = timeout;
        self
    }

    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts = Session::in_dir(dir);
        self
    }

    pub fn reset_between_tests(mut self, reset: bool) -> Self {
        self.reset_between_tests = reset;
        self
    }
}

/// Replays test cases against one page session.
#[derive(Debug, Default)]
pub struct TestRunner {
    config: RunnerConfig,
    interpreter: StepInterpreter,
}

impl TestRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let interpreter = StepInterpreter::new(config.step_timeout);
        Self {
            config,
            interpreter,
        }
    }

    /// Use a custom interpreter (e.g. a shorter poll interval)
    pub fn with_interpreter(mut self, interpreter: StepInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Open a session, replay `cases` against `url`, and release the session.
    ///
    /// The session is closed exactly once whether or not the run succeeds.
    pub async fn run<L: Launcher>(
        &self,
        launcher: &L,
        url: &str,
        cases: &[TestCase],
    ) -> Result<Vec<TestResult>, RunError> {
        let dir = &self.config.artifacts.dir;
        std::fs::create_dir_all(dir).map_err(|source| RunError::Io {
            path: dir.clone(),
            source,
        })?;

        info!(source = launcher.source_type(), cases = cases.len(), "starting run");
        let mut page = bounded(self.config.nav_timeout, launcher.launch())
            .await
            .map_err(RunError::Launch)?;
        let results = self.run_on_page(&mut page, url, cases).await;
        release(&mut page, self.config.step_timeout).await;
        results
    }

    /// Replay `cases` on a page the caller owns.
    pub async fn run_on_page<D: PageDriver + ?Sized>(
        &self,
        page: &mut D,
        url: &str,
        cases: &[TestCase],
    ) -> Result<Vec<TestResult>, RunError> {
        navigate(page, url, self.config.nav_timeout)
            .await
            .map_err(RunError::Navigation)?;

        let mut results = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            if self.config.reset_between_tests && index > 0 {
                let started = Instant::now();
                if let Err(err) = navigate(page, url, self.config.nav_timeout).await {
                    warn!(id = %case.id, error = %err, "reset navigation failed");
                    let screenshot = self.capture_failure(page, &case.id).await;
                    results.push(TestResult {
                        id: case.id.clone(),
                        description: case.description.clone(),
                        status: TestStatus::Failed,
                        error: Some(err.to_string()),
                        duration: started.elapsed().as_secs_f64(),
                        failed_step: None,
                        failure_kind: Some(FailureKind::Browser),
                        screenshot,
                    });
                    continue;
                }
            }
            results.push(self.run_case(page, case).await);
        }

        let summary = RunSummary::from_results(&results);
        info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            "run complete"
        );
        Ok(results)
    }

    /// Execute one case, stopping at the first failing step.
    pub async fn run_case<D: PageDriver + ?Sized>(&self, page: &mut D, case: &TestCase) -> TestResult {
        let started = Instant::now();
        let mut failure = None;

        for (index, step) in case.steps.iter().enumerate() {
            if let Err(err) = self.interpreter.execute(page, step).await {
                failure = Some((index, err));
                break;
            }
        }

        let mut result = TestResult {
            id: case.id.clone(),
            description: case.description.clone(),
            status: TestStatus::Passed,
            error: None,
            duration: 0.0,
            failed_step: None,
            failure_kind: None,
            screenshot: None,
        };

        match failure {
            None => info!(id = %case.id, "passed"),
            Some((index, err)) => {
                warn!(id = %case.id, step = index, error = %err, "failed");
                result.status = TestStatus::Failed;
                result.error = Some(err.to_string());
                result.failed_step = Some(index);
                result.failure_kind = Some(err.kind());
                result.screenshot = self.capture_failure(page, &case.id).await;
            }
        }

        result.duration = started.elapsed().as_secs_f64();
        result
    }

    /// Save a screenshot named after the case. Failures here are logged only.
    async fn capture_failure<D: PageDriver + ?Sized>(&self, page: &mut D, id: &str) -> Option<PathBuf> {
        let path = self.config.artifacts.failure_screenshot_path(id);

        let captured = bounded(self.config.step_timeout, page.screenshot(self.config.full_page)).await;
        let png = match captured {
            Ok(png) => png,
            Err(err) => {
                warn!(id, error = %err, "failure screenshot not captured");
                return None;
            }
        };

        match write_artifact(&path, &png) {
            Ok(()) => Some(path),
            Err(err) => {
                warn!(id, path = %path.display(), error = %err, "failure screenshot not written");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::driver::stalled::{StalledLauncher, StalledPage};
    use crate::browser::{MockElement, MockPage, MockPageSpec, MockSite};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const URL: &str = "https://app.test/";

    fn site() -> MockSite {
        MockSite::new().page(
            URL,
            MockPageSpec::new("App")
                .element(MockElement::new("input").id("name").attr("type", "text"))
                .element(MockElement::new("p").id("motd").text("Hello there")),
        )
    }

    fn runner(dir: &TempDir) -> TestRunner {
        TestRunner::new(
            RunnerConfig::default()
                .nav_timeout(Duration::from_secs(5))
                .step_timeout(Duration::from_millis(150))
                .artifacts_dir(dir.path())
                .reset_between_tests(false),
        )
        .with_interpreter(
            StepInterpreter::new(Duration::from_millis(150)).poll_interval(Duration::from_millis(5)),
        )
    }

    #[tokio::test]
    async fn test_passing_case_has_no_error() {
        let dir = TempDir::new().unwrap();
        let mut page = MockPage::new(site());
        let cases = vec![TestCase::new(
            "T1",
            "greets",
            vec![
                ActionDescriptor::fill("#name", "Ada"),
                ActionDescriptor::assert_text("#motd", "Hello"),
            ],
        )];

        let results = runner(&dir).run_on_page(&mut page, URL, &cases).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TestStatus::Passed);
        assert_eq!(results[0].error, None);
        assert_eq!(results[0].screenshot, None);
        assert!(results[0].duration >= 0.0);
    }

    #[tokio::test]
    async fn test_failure_captures_screenshot_named_by_id() {
        let dir = TempDir::new().unwrap();
        let mut page = MockPage::new(site());
        let cases = vec![TestCase::new(
            "login/bad",
            "missing button",
            vec![ActionDescriptor::click("#missing")],
        )];

        let results = runner(&dir).run_on_page(&mut page, URL, &cases).await.unwrap();

        let result = &results[0];
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.failure_kind, Some(FailureKind::Timeout));
        assert_eq!(result.failed_step, Some(0));
        let shot = dir.path().join("login_bad.png");
        assert_eq!(result.screenshot.as_deref(), Some(shot.as_path()));
        assert!(shot.exists());
    }

    #[tokio::test]
    async fn test_empty_case_passes() {
        let dir = TempDir::new().unwrap();
        let mut page = MockPage::new(site());
        let cases = vec![TestCase::new("T1", "nothing to do", Vec::new())];
        let results = runner(&dir).run_on_page(&mut page, URL, &cases).await.unwrap();
        assert!(results[0].passed());
    }

    #[tokio::test]
    async fn test_unresponsive_page_fails_case_without_hanging() {
        let dir = TempDir::new().unwrap();
        let cases = vec![TestCase::new("T1", "hung", vec![ActionDescriptor::click("#go")])];

        let results = tokio::time::timeout(
            Duration::from_secs(5),
            runner(&dir).run_on_page(&mut StalledPage, URL, &cases),
        )
        .await
        .expect("run must not hang")
        .unwrap();

        assert_eq!(results[0].status, TestStatus::Failed);
        assert_eq!(results[0].failure_kind, Some(FailureKind::Timeout));
        assert_eq!(results[0].screenshot, None);
        assert!(!dir.path().join("T1.png").exists());
    }

    #[tokio::test]
    async fn test_launch_that_never_finishes_aborts_run() {
        let dir = TempDir::new().unwrap();
        let runner = TestRunner::new(
            RunnerConfig::default()
                .nav_timeout(Duration::from_millis(50))
                .artifacts_dir(dir.path()),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            runner.run(&StalledLauncher, URL, &[]),
        )
        .await
        .expect("launch must not hang");

        assert!(matches!(outcome, Err(RunError::Launch(DriverError::Timeout(_)))));
    }

    #[test]
    fn test_summary_counts() {
        let result = |id: &str, status| TestResult {
            id: id.to_string(),
            description: String::new(),
            status,
            error: None,
            duration: 0.5,
            failed_step: None,
            failure_kind: None,
            screenshot: None,
        };
        let results = vec![
            result("T1", TestStatus::Passed),
            result("T2", TestStatus::Failed),
            result("T3", TestStatus::Passed),
        ];
        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert!((summary.duration - 1.5).abs() < f64::EPSILON);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_result_serializes_status_lowercase() {
        let result = TestResult {
            id: "T1".to_string(),
            description: "d".to_string(),
            status: TestStatus::Failed,
            error: Some("boom".to_string()),
            duration: 1.25,
            failed_step: Some(2),
            failure_kind: Some(FailureKind::UnknownAction),
            screenshot: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["failure_kind"], "unknown_action");
        assert_eq!(json["failed_step"], 2);
        assert!(json.get("screenshot").is_none());
    }

    #[test]
    fn test_case_deserializes_without_expected() {
        let case: TestCase = serde_json::from_str(
            r##"{"id":"T1","description":"d","steps":[{"action":"click","selector":"#go"}]}"##,
        )
        .unwrap();
        assert_eq!(case.steps, vec![ActionDescriptor::click("#go")]);
        assert_eq!(case.expected, None);
    }
}
