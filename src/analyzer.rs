//! Page analysis: load a page, enumerate its interactive elements and turn
//! each one into at most one action.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::{ActionClassifier, ActionDescriptor, strategy_by_name};
use crate::browser::{DriverError, Launcher, PageDriver, bounded, navigate, release};
use crate::config;

/// Elements considered interactive candidates, in document order.
pub const CANDIDATE_QUERY: &str =
    "a, button, input, select, textarea, [role='button'], form, [data-testid]";

/// File name of the analysis screenshot inside the artifact directory
pub const CAPTURE_FILE: &str = "page_capture.png";

/// Errors that abort an analysis
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The page never loaded; no result is produced
    #[error(transparent)]
    Navigation(DriverError),

    #[error("browser error during analysis: {0}")]
    Driver(#[from] DriverError),

    #[error("failed to write screenshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The output of scanning one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    /// Final URL after redirects
    pub url: String,
    /// Inferred actions in document order
    pub actions: Vec<ActionDescriptor>,
    /// Full-page screenshot written during analysis
    pub screenshot: PathBuf,
}

/// Analyzer settings
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Maximum number of candidate elements considered (default: 200)
    pub max_elements: usize,
    /// Page load bound, also applied to launch, enumeration and the
    /// screenshot (default: 30s)
    pub nav_timeout: Duration,
    /// Bound on short browser calls: title, URL, close (default: 10s)
    pub call_timeout: Duration,
    /// Where the screenshot is written
    pub screenshot_path: PathBuf,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            max_elements: cfg.analysis.max_elements,
            nav_timeout: Duration::from_secs(cfg.timeouts.navigation_secs),
            call_timeout: Duration::from_secs(cfg.timeouts.step_secs),
            screenshot_path: Path::new(&cfg.session.results_dir).join(CAPTURE_FILE),
        }
    }
}

impl AnalyzerConfig {
    pub fn max_elements(mut self, max: usize) -> Self {
        self.max_elements = max;
        self
    }

    pub fn nav_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout = timeout;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn screenshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot_path = path.into();
        self
    }
}

/// Scans pages for interactive elements.
#[derive(Debug)]
pub struct PageAnalyzer {
    config: AnalyzerConfig,
    classifier: ActionClassifier,
}

impl Default for PageAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl PageAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let classifier = strategy_by_name(&config::get().analysis.value_strategy)
            .map(ActionClassifier::new)
            .unwrap_or_default();
        Self { config, classifier }
    }

    pub fn with_classifier(mut self, classifier: ActionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn classifier(&self) -> &ActionClassifier {
        &self.classifier
    }

    /// Open a session, analyze `url`, and release the session.
    pub async fn analyze<L: Launcher>(
        &self,
        launcher: &L,
        url: &str,
    ) -> Result<AnalysisResult, AnalyzeError> {
        let mut page = bounded(self.config.nav_timeout, launcher.launch()).await?;
        let result = self.analyze_page(&mut page, url).await;
        release(&mut page, self.config.call_timeout).await;
        result
    }

    /// Analyze `url` on a page the caller owns.
    pub async fn analyze_page<D: PageDriver + ?Sized>(
        &self,
        page: &mut D,
        url: &str,
    ) -> Result<AnalysisResult, AnalyzeError> {
        navigate(page, url, self.config.nav_timeout)
            .await
            .map_err(AnalyzeError::Navigation)?;

        let cap = self.config.max_elements;
        let candidates = bounded(
            self.config.nav_timeout,
            page.snapshot_elements(CANDIDATE_QUERY, cap),
        )
        .await?;

        let mut actions = Vec::new();
        for (index, candidate) in candidates.into_iter().take(cap).enumerate() {
            let snapshot = match candidate {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(index, error = %err, "skipping unreadable element");
                    continue;
                }
            };
            if let Some(action) = self.classifier.classify(&snapshot, index) {
                debug!(index, tag = %snapshot.tag, action = %action, "inferred action");
                actions.push(action);
            }
        }

        let png = bounded(self.config.nav_timeout, page.screenshot(true)).await?;
        let path = self.config.screenshot_path.clone();
        write_artifact(&path, &png).map_err(|source| AnalyzeError::Io {
            path: path.clone(),
            source,
        })?;

        let title = bounded(self.config.call_timeout, page.title()).await?;
        let final_url = bounded(self.config.call_timeout, page.current_url()).await?;
        info!(url = %final_url, title = %title, actions = actions.len(), "analysis complete");

        Ok(AnalysisResult {
            title,
            url: final_url,
            actions,
            screenshot: path,
        })
    }
}

/// Write bytes to `path`, creating parent directories.
pub(crate) fn write_artifact(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, RealisticValues};
    use crate::browser::driver::stalled::{StalledLauncher, StalledPage};
    use crate::browser::{MockElement, MockLauncher, MockPageSpec, MockSite};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn analyzer(dir: &TempDir) -> PageAnalyzer {
        PageAnalyzer::new(
            AnalyzerConfig::default()
                .max_elements(200)
                .nav_timeout(Duration::from_secs(5))
                .screenshot_path(dir.path().join(CAPTURE_FILE)),
        )
        .with_classifier(ActionClassifier::default())
    }

    #[tokio::test]
    async fn test_redirected_url_and_title_recorded() {
        let dir = TempDir::new().unwrap();
        let site = MockSite::new()
            .redirect("https://shop.test/", "https://shop.test/home")
            .page(
                "https://shop.test/home",
                MockPageSpec::new("Shop")
                    .element(MockElement::new("form").id("search"))
                    .element(MockElement::new("div").id("banner"))
                    .element(MockElement::new("a").attr("href", "/cart").attr("class", "nav cart")),
            );
        let launcher = MockLauncher::new(site);

        let result = analyzer(&dir).analyze(&launcher, "https://shop.test/").await.unwrap();

        assert_eq!(result.url, "https://shop.test/home");
        assert_eq!(result.title, "Shop");
        // The form matches the query but yields no action; the div is not a candidate.
        assert_eq!(result.actions, vec![ActionDescriptor::click(".nav")]);
        assert!(result.screenshot.exists());
        assert_eq!(launcher.stats().launched(), 1);
        assert_eq!(launcher.stats().closed(), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_fatal_and_releases_session() {
        let dir = TempDir::new().unwrap();
        let launcher = MockLauncher::new(MockSite::new());

        let err = analyzer(&dir)
            .analyze(&launcher, "https://missing.test/")
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzeError::Navigation(_)));
        assert!(!dir.path().join(CAPTURE_FILE).exists());
        assert_eq!(launcher.stats().closed(), 1);
    }

    #[tokio::test]
    async fn test_value_strategy_is_pluggable() {
        let dir = TempDir::new().unwrap();
        let site = MockSite::new().page(
            "https://app.test/",
            MockPageSpec::new("Signup")
                .element(MockElement::new("input").id("email").attr("type", "email")),
        );
        let launcher = MockLauncher::new(site);

        let result = analyzer(&dir)
            .with_classifier(ActionClassifier::new(Box::new(RealisticValues)))
            .analyze(&launcher, "https://app.test/")
            .await
            .unwrap();

        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].action, ActionKind::Fill);
        assert_eq!(result.actions[0].value, "user0@example.com");
    }

    #[tokio::test]
    async fn test_unresponsive_page_is_cut_off() {
        let dir = TempDir::new().unwrap();
        let analyzer = PageAnalyzer::new(
            AnalyzerConfig::default()
                .nav_timeout(Duration::from_millis(50))
                .call_timeout(Duration::from_millis(50))
                .screenshot_path(dir.path().join(CAPTURE_FILE)),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            analyzer.analyze_page(&mut StalledPage, "https://hung.test/"),
        )
        .await
        .expect("analysis must not hang");

        assert!(matches!(
            outcome,
            Err(AnalyzeError::Driver(DriverError::Timeout(_)))
        ));
        assert!(!dir.path().join(CAPTURE_FILE).exists());
    }

    #[tokio::test]
    async fn test_launch_that_never_finishes_is_cut_off() {
        let dir = TempDir::new().unwrap();
        let analyzer = PageAnalyzer::new(
            AnalyzerConfig::default()
                .nav_timeout(Duration::from_millis(50))
                .screenshot_path(dir.path().join(CAPTURE_FILE)),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            analyzer.analyze(&StalledLauncher, "https://hung.test/"),
        )
        .await
        .expect("launch must not hang");

        assert!(matches!(
            outcome,
            Err(AnalyzeError::Driver(DriverError::Timeout(_)))
        ));
    }

    #[test]
    fn test_default_uses_configured_strategy() {
        let configured = strategy_by_name(&config::get().analysis.value_strategy)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| "sample".to_string());
        assert_eq!(PageAnalyzer::default().classifier().strategy_name(), configured);
    }

    #[test]
    fn test_write_artifact_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("shot.png");
        write_artifact(&path, b"png").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }
}
