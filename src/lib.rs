//! Page Pilot - infer UI tests from a web page and replay them in a browser.
//!
//! This crate provides:
//! - A selector deriver and an ordered rule table that turn DOM elements into actions
//! - A page analyzer that scans a live page for interactive elements
//! - A step interpreter with bounded waits and typed failures
//! - A test runner that replays test cases against one browser session
//! - Language-model test case generation with a deterministic fallback
//! - Headless Chromium and in-memory mock browser backends
//!
//! # Example
//!
//! ```rust,no_run
//! use page_pilot::analyzer::{AnalyzerConfig, PageAnalyzer};
//! use page_pilot::browser::ChromiumLauncher;
//! use page_pilot::generator::fallback_test_cases;
//! use page_pilot::runner::{RunnerConfig, TestRunner};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let launcher = ChromiumLauncher::default();
//! let analysis = PageAnalyzer::new(AnalyzerConfig::default())
//!     .analyze(&launcher, "https://example.com")
//!     .await?;
//! let cases = fallback_test_cases(&analysis.actions);
//! let results = TestRunner::new(RunnerConfig::default())
//!     .run(&launcher, "https://example.com", &cases)
//!     .await?;
//! println!("{} results", results.len());
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod analyzer;
pub mod browser;
pub mod config;
pub mod generator;
pub mod interpreter;
pub mod llm;
pub mod report;
pub mod runner;
pub mod session;

// Re-export the action vocabulary
pub use action::{ActionClassifier, ActionDescriptor, ActionKind, ElementSnapshot, derive_selector};

// Re-export the pipeline
pub use analyzer::{AnalysisResult, AnalyzeError, AnalyzerConfig, PageAnalyzer};
pub use interpreter::{FailureKind, StepFailure, StepInterpreter};
pub use runner::{RunError, RunSummary, RunnerConfig, TestCase, TestResult, TestRunner, TestStatus};

// Re-export generation
pub use generator::{FallbackReason, GeneratedCases, GeneratorError, TestCaseGenerator, fallback_test_cases};
pub use llm::{LlmClient, LlmConfig, LlmError, TextGenerator};

// Re-export browser backends
pub use browser::{ChromiumLauncher, Launcher, MockLauncher, MockSite, PageDriver};

pub use report::Report;
pub use session::Session;
