//! Executes one action against a live page.
//!
//! Every step either succeeds or fails with a [`StepFailure`]. Waiting is
//! bounded: element lookups poll until the step timeout, and each individual
//! browser call is cut off at whatever is left of that budget.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::action::{ActionDescriptor, ActionKind};
use crate::browser::{DriverError, DriverResult, OptionChoice, PageDriver};
use crate::config;

/// Stand-in deadline for step bounds too large for [`Instant`]
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Deadline `timeout` from now, saturating instead of overflowing.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
}

/// Coarse failure class, so callers can tell a malformed test case from a
/// flaky environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Assertion,
    UnknownAction,
    Browser,
}

/// Why a step failed
#[derive(Debug, Error)]
pub enum StepFailure {
    /// The element never became ready within the bound
    #[error("{action} '{selector}' timed out after {timeout:?}: {waiting_for}")]
    Timeout {
        action: ActionKind,
        selector: String,
        timeout: Duration,
        waiting_for: String,
    },

    /// An assertion's expected value was not found
    #[error("{action} failed: expected '{expected}' in '{actual}'")]
    AssertionMismatch {
        action: ActionKind,
        expected: String,
        actual: String,
    },

    /// The step names an action outside the vocabulary
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// The browser rejected the action after the element was ready
    #[error("{action} '{selector}' failed: {source}")]
    Browser {
        action: ActionKind,
        selector: String,
        #[source]
        source: DriverError,
    },
}

impl StepFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            StepFailure::Timeout { .. } => FailureKind::Timeout,
            StepFailure::AssertionMismatch { .. } => FailureKind::Assertion,
            StepFailure::UnknownAction(_) => FailureKind::UnknownAction,
            StepFailure::Browser { .. } => FailureKind::Browser,
        }
    }
}

/// What an element must satisfy before a step acts on it
#[derive(Debug, Clone, Copy)]
enum Readiness {
    Present,
    Actionable,
}

impl Readiness {
    fn describe(self) -> &'static str {
        match self {
            Readiness::Present => "element did not appear",
            Readiness::Actionable => "element not found or not actionable",
        }
    }
}

/// Executes [`ActionDescriptor`]s with a bounded wait per step.
#[derive(Debug, Clone)]
pub struct StepInterpreter {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for StepInterpreter {
    fn default() -> Self {
        Self::new(Duration::from_secs(config::get().timeouts.step_secs))
    }
}

impl StepInterpreter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one step.
    pub async fn execute<D: PageDriver + ?Sized>(
        &self,
        page: &mut D,
        step: &ActionDescriptor,
    ) -> Result<(), StepFailure> {
        debug!(step = %step, "executing step");
        let deadline = deadline_after(self.timeout);
        let selector = step.selector.as_str();

        match &step.action {
            ActionKind::Click => {
                self.wait_until(page, step, Readiness::Actionable, deadline).await?;
                self.act(step, deadline, page.click(selector)).await
            }
            ActionKind::Fill => {
                self.wait_until(page, step, Readiness::Actionable, deadline).await?;
                self.act(step, deadline, page.fill(selector, &step.value)).await
            }
            ActionKind::Check => {
                self.wait_until(page, step, Readiness::Actionable, deadline).await?;
                let checked = step.value != "false";
                self.act(step, deadline, page.set_checked(selector, checked)).await
            }
            ActionKind::Select => {
                self.wait_until(page, step, Readiness::Actionable, deadline).await?;
                self.select(page, step, deadline).await
            }
            ActionKind::AssertText => {
                self.wait_until(page, step, Readiness::Present, deadline).await?;
                let text = self.act(step, deadline, page.inner_text(selector)).await?;
                let actual = text.trim();
                if actual.contains(step.value.as_str()) {
                    Ok(())
                } else {
                    Err(StepFailure::AssertionMismatch {
                        action: step.action.clone(),
                        expected: step.value.clone(),
                        actual: actual.to_string(),
                    })
                }
            }
            ActionKind::AssertUrl => {
                let url = self.act(step, deadline, page.current_url()).await?;
                if url.contains(step.value.as_str()) {
                    Ok(())
                } else {
                    Err(StepFailure::AssertionMismatch {
                        action: step.action.clone(),
                        expected: step.value.clone(),
                        actual: url,
                    })
                }
            }
            ActionKind::Wait => self.wait_until(page, step, Readiness::Present, deadline).await,
            ActionKind::Other(name) => Err(StepFailure::UnknownAction(name.clone())),
        }
    }

    fn timed_out(&self, step: &ActionDescriptor, waiting_for: impl Into<String>) -> StepFailure {
        StepFailure::Timeout {
            action: step.action.clone(),
            selector: step.selector.clone(),
            timeout: self.timeout,
            waiting_for: waiting_for.into(),
        }
    }

    /// Poll the element until it satisfies `readiness` or the deadline passes.
    async fn wait_until<D: PageDriver + ?Sized>(
        &self,
        page: &mut D,
        step: &ActionDescriptor,
        readiness: Readiness,
        deadline: Instant,
    ) -> Result<(), StepFailure> {
        let selector = step.selector.as_str();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let probe = match readiness {
                Readiness::Present => {
                    tokio::time::timeout(remaining, page.is_present(selector)).await
                }
                Readiness::Actionable => {
                    tokio::time::timeout(remaining, page.is_actionable(selector)).await
                }
            };
            match probe {
                Ok(Ok(true)) => return Ok(()),
                Ok(Ok(false)) => {}
                Ok(Err(err)) => debug!(selector, error = %err, "probe failed, retrying"),
                Err(_) => return Err(self.timed_out(step, readiness.describe())),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(step, readiness.describe()));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Run one browser call within what is left of the step budget.
    async fn act<T>(
        &self,
        step: &ActionDescriptor,
        deadline: Instant,
        call: impl Future<Output = DriverResult<T>>,
    ) -> Result<T, StepFailure> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(StepFailure::Browser {
                action: step.action.clone(),
                selector: step.selector.clone(),
                source,
            }),
            Err(_) => Err(self.timed_out(step, "browser did not respond")),
        }
    }

    /// Retry the selection until a matching option exists.
    async fn select<D: PageDriver + ?Sized>(
        &self,
        page: &mut D,
        step: &ActionDescriptor,
        deadline: Instant,
    ) -> Result<(), StepFailure> {
        let choice = OptionChoice::from_value(&step.value);
        loop {
            if self
                .act(step, deadline, page.select_option(&step.selector, &choice))
                .await?
            {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(step, format!("no {} available", choice)));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ClickEffect, MockElement, MockPage, MockPageSpec, MockSite};
    use pretty_assertions::assert_eq;

    const URL: &str = "https://app.test/login";

    fn login_site() -> MockSite {
        MockSite::new()
            .page(
                URL,
                MockPageSpec::new("Login")
                    .element(MockElement::new("input").id("user").attr("type", "text"))
                    .element(MockElement::new("input").id("remember").attr("type", "checkbox"))
                    .element(
                        MockElement::new("select")
                            .id("lang")
                            .option("en", "English")
                            .option("de", "Deutsch"),
                    )
                    .element(MockElement::new("h1").id("greeting").text("  Welcome back  "))
                    .element(MockElement::new("button").id("ghost").disabled())
                    .element(MockElement::new("div").id("later").appears_after(3))
                    .element(
                        MockElement::new("button").id("go").on_click(ClickEffect::Navigate {
                            url: "/home".to_string(),
                        }),
                    ),
            )
            .page("https://app.test/home", MockPageSpec::new("Home"))
    }

    async fn page() -> MockPage {
        let mut page = MockPage::new(login_site());
        page.goto(URL).await.unwrap();
        page
    }

    fn fast() -> StepInterpreter {
        StepInterpreter::new(Duration::from_millis(200)).poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_fill_check_select() {
        let mut page = page().await;
        let interp = fast();
        interp.execute(&mut page, &ActionDescriptor::fill("#user", "alice")).await.unwrap();
        interp.execute(&mut page, &ActionDescriptor::check("#remember")).await.unwrap();
        interp.execute(&mut page, &ActionDescriptor::select_first("#lang")).await.unwrap();

        assert_eq!(page.value_of("#user").as_deref(), Some("alice"));
        assert_eq!(page.is_checked("#remember"), Some(true));
        assert_eq!(page.selected_value("#lang").as_deref(), Some("en"));

        let uncheck = ActionDescriptor::new(ActionKind::Check, "#remember", "false");
        interp.execute(&mut page, &uncheck).await.unwrap();
        assert_eq!(page.is_checked("#remember"), Some(false));

        let by_label = ActionDescriptor::new(ActionKind::Select, "#lang", "Deutsch");
        interp.execute(&mut page, &by_label).await.unwrap();
        assert_eq!(page.selected_value("#lang").as_deref(), Some("de"));
    }

    #[tokio::test]
    async fn test_click_navigates() {
        let mut page = page().await;
        let interp = fast();
        interp.execute(&mut page, &ActionDescriptor::click("#go")).await.unwrap();
        interp.execute(&mut page, &ActionDescriptor::assert_url("/home")).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_element_times_out() {
        let mut page = page().await;
        let err = fast()
            .execute(&mut page, &ActionDescriptor::click("#nope"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(err.to_string().starts_with("click '#nope' timed out"));
    }

    #[tokio::test]
    async fn test_disabled_element_times_out() {
        let mut page = page().await;
        let err = fast()
            .execute(&mut page, &ActionDescriptor::click("#ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_wait_succeeds_when_element_appears() {
        let mut page = page().await;
        fast().execute(&mut page, &ActionDescriptor::wait("#later")).await.unwrap();
    }

    #[tokio::test]
    async fn test_assert_text_substring_after_trim() {
        let mut page = page().await;
        let interp = fast();
        interp
            .execute(&mut page, &ActionDescriptor::assert_text("#greeting", "Welcome"))
            .await
            .unwrap();

        let err = interp
            .execute(&mut page, &ActionDescriptor::assert_text("#greeting", "welcome"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Assertion);
        assert_eq!(
            err.to_string(),
            "assert_text failed: expected 'welcome' in 'Welcome back'"
        );
    }

    #[tokio::test]
    async fn test_assert_url_mismatch_reports_both() {
        let mut page = page().await;
        let err = fast()
            .execute(&mut page, &ActionDescriptor::assert_url("/dashboard"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Assertion);
        let message = err.to_string();
        assert!(message.contains("/dashboard"));
        assert!(message.contains(URL));
    }

    #[tokio::test]
    async fn test_unknown_action_is_distinct() {
        let mut page = page().await;
        let step = ActionDescriptor::new(ActionKind::from("goto"), "body", "https://x.test");
        let err = fast().execute(&mut page, &step).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnknownAction);
        assert_eq!(err.to_string(), "unknown action 'goto'");
    }

    #[tokio::test]
    async fn test_select_without_matching_option_times_out() {
        let mut page = page().await;
        let step = ActionDescriptor::new(ActionKind::Select, "#lang", "Klingon");
        let err = fast().execute(&mut page, &step).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(err.to_string().contains("no option 'Klingon' available"));
    }

    #[tokio::test]
    async fn test_huge_step_bound_does_not_overflow() {
        let mut page = page().await;
        let interp = StepInterpreter::new(Duration::from_secs(u64::MAX));
        interp.execute(&mut page, &ActionDescriptor::click("#go")).await.unwrap();
        interp.execute(&mut page, &ActionDescriptor::assert_url("/home")).await.unwrap();
    }

    #[tokio::test]
    async fn test_fill_on_non_input_is_browser_failure() {
        let mut page = page().await;
        let err = fast()
            .execute(&mut page, &ActionDescriptor::fill("#greeting", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Browser);
    }
}
