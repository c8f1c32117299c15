//! The seam between the core and a live browser.
//!
//! Implementations provide primitive, non-waiting page operations:
//! - `ChromiumPage` drives headless Chromium over the DevTools protocol
//! - `MockPage` replays a scripted in-memory site for tests and dry runs
//!
//! Bounded waiting is owned by the callers (analyzer, interpreter, runner).

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use super::types::{DriverError, DriverResult, OptionChoice};
use crate::action::ElementSnapshot;

/// One live page inside a browser session.
#[async_trait]
pub trait PageDriver: Send {
    /// Load `url` and wait for the load event
    async fn goto(&mut self, url: &str) -> DriverResult<()>;

    async fn title(&mut self) -> DriverResult<String>;

    /// Current (possibly redirected) URL
    async fn current_url(&mut self) -> DriverResult<String>;

    /// Snapshot up to `limit` elements matching `query`, in document order.
    ///
    /// Each entry fails on its own so one unreadable element does not hide
    /// the rest.
    async fn snapshot_elements(
        &mut self,
        query: &str,
        limit: usize,
    ) -> DriverResult<Vec<DriverResult<ElementSnapshot>>>;

    /// Whether an element matching `selector` is attached to the document
    async fn is_present(&mut self, selector: &str) -> DriverResult<bool>;

    /// Whether the element is present, visible and enabled
    async fn is_actionable(&mut self, selector: &str) -> DriverResult<bool>;

    async fn click(&mut self, selector: &str) -> DriverResult<()>;

    /// Replace the element's value with `value`
    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()>;

    async fn set_checked(&mut self, selector: &str, checked: bool) -> DriverResult<()>;

    /// Select an option. Returns `false` when no option matches yet.
    async fn select_option(&mut self, selector: &str, choice: &OptionChoice) -> DriverResult<bool>;

    /// Visible text of the first element matching `selector`
    async fn inner_text(&mut self, selector: &str) -> DriverResult<String>;

    /// PNG-encoded screenshot
    async fn screenshot(&mut self, full_page: bool) -> DriverResult<Vec<u8>>;

    /// Release the page and its browser
    async fn close(&mut self) -> DriverResult<()>;
}

/// Opens browser sessions.
#[async_trait]
pub trait Launcher: Send + Sync {
    type Page: PageDriver;

    /// Start a browser and open one blank page
    async fn launch(&self) -> DriverResult<Self::Page>;

    /// Source identifier for logs (e.g. "chromium", "mock")
    fn source_type(&self) -> &str;
}

/// Navigate with an upper bound on the page load.
pub async fn navigate<D: PageDriver + ?Sized>(
    page: &mut D,
    url: &str,
    timeout: Duration,
) -> DriverResult<()> {
    info!(url, timeout_secs = timeout.as_secs(), "navigating");
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(DriverError::Navigation { url, reason })) => {
            Err(DriverError::Navigation { url, reason })
        }
        Ok(Err(err)) => Err(DriverError::Navigation {
            url: url.to_string(),
            reason: err.to_string(),
        }),
        Err(_) => Err(DriverError::Navigation {
            url: url.to_string(),
            reason: format!("timed out after {:?}", timeout),
        }),
    }
}

/// Run one browser call with an upper bound.
pub async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = DriverResult<T>>,
) -> DriverResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout(timeout)),
    }
}

/// Close a page within `timeout`, logging instead of failing.
pub async fn release<D: PageDriver + ?Sized>(page: &mut D, timeout: Duration) {
    if let Err(err) = bounded(timeout, page.close()).await {
        warn!(error = %err, "failed to close browser session");
    }
}

/// Drivers that never answer, for exercising the time bounds.
#[cfg(test)]
pub(crate) mod stalled {
    use super::*;
    use futures::future::pending;

    /// Loads any URL instantly, then hangs on every other call.
    pub(crate) struct StalledPage;

    #[async_trait]
    impl PageDriver for StalledPage {
        async fn goto(&mut self, _url: &str) -> DriverResult<()> {
            Ok(())
        }

        async fn title(&mut self) -> DriverResult<String> {
            pending().await
        }

        async fn current_url(&mut self) -> DriverResult<String> {
            pending().await
        }

        async fn snapshot_elements(
            &mut self,
            _query: &str,
            _limit: usize,
        ) -> DriverResult<Vec<DriverResult<ElementSnapshot>>> {
            pending().await
        }

        async fn is_present(&mut self, _selector: &str) -> DriverResult<bool> {
            pending().await
        }

        async fn is_actionable(&mut self, _selector: &str) -> DriverResult<bool> {
            pending().await
        }

        async fn click(&mut self, _selector: &str) -> DriverResult<()> {
            pending().await
        }

        async fn fill(&mut self, _selector: &str, _value: &str) -> DriverResult<()> {
            pending().await
        }

        async fn set_checked(&mut self, _selector: &str, _checked: bool) -> DriverResult<()> {
            pending().await
        }

        async fn select_option(&mut self, _selector: &str, _choice: &OptionChoice) -> DriverResult<bool> {
            pending().await
        }

        async fn inner_text(&mut self, _selector: &str) -> DriverResult<String> {
            pending().await
        }

        async fn screenshot(&mut self, _full_page: bool) -> DriverResult<Vec<u8>> {
            pending().await
        }

        async fn close(&mut self) -> DriverResult<()> {
            pending().await
        }
    }

    /// A launcher whose browser never starts.
    pub(crate) struct StalledLauncher;

    #[async_trait]
    impl Launcher for StalledLauncher {
        type Page = StalledPage;

        async fn launch(&self) -> DriverResult<StalledPage> {
            pending().await
        }

        fn source_type(&self) -> &str {
            "stalled"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stalled::StalledPage;
    use super::*;

    const GUARD: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_bounded_reports_timeout() {
        let mut page = StalledPage;
        let bound = Duration::from_millis(20);
        let result = tokio::time::timeout(GUARD, bounded(bound, page.title()))
            .await
            .expect("bounded call must return");
        assert!(matches!(result, Err(DriverError::Timeout(d)) if d == bound));
    }

    #[tokio::test]
    async fn test_release_gives_up_on_hung_close() {
        let mut page = StalledPage;
        let released = tokio::time::timeout(GUARD, release(&mut page, Duration::from_millis(20))).await;
        assert!(released.is_ok());
    }
}
