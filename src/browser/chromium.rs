//! Headless Chromium backend over the Chrome DevTools Protocol.
//!
//! Element interactions that have to behave like a user (click) go through
//! CDP input events; value changes (fill, check, select) run small in-page
//! scripts that set the value and dispatch `input`/`change` so framework
//! listeners observe them.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::driver::{Launcher, PageDriver};
use super::types::{DriverError, DriverResult, OptionChoice};
use crate::action::ElementSnapshot;

/// Bound on closing a browser whose launch did not complete
const ABANDON_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for launching Chromium
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    /// Run without a visible window (default: true)
    pub headless: bool,
    /// Window width (default: 1280)
    pub window_width: u32,
    /// Window height (default: 720)
    pub window_height: u32,
    /// Explicit browser binary; detected when `None`
    pub executable: Option<PathBuf>,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 720,
            executable: None,
        }
    }
}

impl ChromiumConfig {
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }
}

/// Launches one Chromium process per session
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    config: ChromiumConfig,
}

impl ChromiumLauncher {
    pub fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    type Page = ChromiumPage;

    async fn launch(&self) -> DriverResult<ChromiumPage> {
        info!(headless = self.config.headless, "launching chromium");

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .window_size(self.config.window_width, self.config.window_height);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        // The handler drives the websocket; the browser is unusable without it.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler event loop ended");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                abandon(async { browser.close().await.map(|_| ()) }, handler_task).await;
                return Err(DriverError::Launch(format!("failed to open page: {}", err)));
            }
        };

        Ok(ChromiumPage {
            browser,
            page,
            handler_task,
        })
    }

    fn source_type(&self) -> &str {
        "chromium"
    }
}

/// Tear down a browser whose launch failed part way: close it, then stop
/// its handler task.
async fn abandon<E: std::fmt::Display>(
    close: impl Future<Output = Result<(), E>>,
    handler_task: JoinHandle<()>,
) {
    match tokio::time::timeout(ABANDON_CLOSE_TIMEOUT, close).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "failed to close browser after launch error"),
        Err(_) => warn!("browser close timed out after launch error"),
    }
    handler_task.abort();
}

/// One Chromium process with a single open tab
pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

/// Element snapshot as returned by the enumeration script
#[derive(Debug, Deserialize)]
struct RawCandidate {
    ok: Option<ElementSnapshot>,
    error: Option<String>,
}

/// Quote a string as a JavaScript string literal.
fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn protocol(err: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(err.to_string())
}

/// Map the status string returned by the action scripts.
fn script_status(status: &str, selector: &str) -> DriverResult<()> {
    match status {
        "ok" => Ok(()),
        "missing" => Err(DriverError::ElementNotFound(selector.to_string())),
        other => Err(DriverError::Script(format!("'{}': {}", selector, other))),
    }
}

impl ChromiumPage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> DriverResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| DriverError::Script(e.to_string()))
    }

    async fn run_action(&self, selector: &str, body: &str) -> DriverResult<()> {
        let script = format!(
            "(() => {{ const e = document.querySelector({sel}); if (!e) return 'missing'; {body} }})()",
            sel = js_str(selector),
            body = body
        );
        let status: String = self.eval(script).await?;
        script_status(&status, selector)
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn title(&mut self) -> DriverResult<String> {
        Ok(self.page.get_title().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn snapshot_elements(
        &mut self,
        query: &str,
        limit: usize,
    ) -> DriverResult<Vec<DriverResult<ElementSnapshot>>> {
        let script = format!(
            r#"(() => Array.from(document.querySelectorAll({query})).slice(0, {limit}).map((e) => {{
                try {{
                    const attributes = {{}};
                    for (const at of e.attributes) attributes[at.name] = at.value;
                    return {{ ok: {{ tag: e.tagName.toLowerCase(), attributes, role: e.getAttribute('role') }} }};
                }} catch (err) {{
                    return {{ error: String(err) }};
                }}
            }}))()"#,
            query = js_str(query),
            limit = limit
        );
        let raw: Vec<RawCandidate> = self.eval(script).await?;
        Ok(raw
            .into_iter()
            .map(|candidate| match candidate {
                RawCandidate { ok: Some(snapshot), .. } => Ok(snapshot),
                RawCandidate { error, .. } => Err(DriverError::Script(
                    error.unwrap_or_else(|| "unreadable element".to_string()),
                )),
            })
            .collect())
    }

    async fn is_present(&mut self, selector: &str) -> DriverResult<bool> {
        let script = format!(
            "(() => {{ try {{ return document.querySelector({}) !== null; }} catch (_) {{ return false; }} }})()",
            js_str(selector)
        );
        self.eval(script).await
    }

    async fn is_actionable(&mut self, selector: &str) -> DriverResult<bool> {
        let script = format!(
            r#"(() => {{
                try {{
                    const e = document.querySelector({});
                    if (!e || !e.isConnected || e.disabled) return false;
                    const style = getComputedStyle(e);
                    if (style.visibility === 'hidden' || style.display === 'none') return false;
                    const rect = e.getBoundingClientRect();
                    return rect.width > 0 && rect.height > 0;
                }} catch (_) {{
                    return false;
                }}
            }})()"#,
            js_str(selector)
        );
        self.eval(script).await
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        let body = format!(
            r#"if (!('value' in e) && !e.isContentEditable) return 'element is not fillable';
            e.focus();
            if (e.isContentEditable) {{
                e.textContent = {value};
            }} else {{
                const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(e), 'value');
                if (desc && desc.set) desc.set.call(e, {value}); else e.value = {value};
            }}
            e.dispatchEvent(new Event('input', {{ bubbles: true }}));
            e.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return 'ok';"#,
            value = js_str(value)
        );
        self.run_action(selector, &body).await
    }

    async fn set_checked(&mut self, selector: &str, checked: bool) -> DriverResult<()> {
        let body = format!(
            r#"if (!('checked' in e)) return 'element is not checkable';
            if (e.checked !== {checked}) e.click();
            return e.checked === {checked} ? 'ok' : 'state did not change';"#,
            checked = checked
        );
        self.run_action(selector, &body).await
    }

    async fn select_option(&mut self, selector: &str, choice: &OptionChoice) -> DriverResult<bool> {
        let pick = match choice {
            OptionChoice::First => "options.length > 0 ? 0 : -1".to_string(),
            OptionChoice::Matching(text) => format!(
                "options.findIndex((o) => o.value === {t} || o.label === {t} || o.text.trim() === {t})",
                t = js_str(text)
            ),
        };
        let body = format!(
            r#"if (!e.options) return 'element is not a select';
            const options = Array.from(e.options);
            const index = {pick};
            if (index < 0) return 'no-option';
            e.selectedIndex = index;
            e.dispatchEvent(new Event('input', {{ bubbles: true }}));
            e.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return 'ok';"#,
            pick = pick
        );
        match self.run_action(selector, &body).await {
            Ok(()) => Ok(true),
            Err(DriverError::Script(msg)) if msg.ends_with("no-option") => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn inner_text(&mut self, selector: &str) -> DriverResult<String> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        Ok(element.inner_text().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn screenshot(&mut self, full_page: bool) -> DriverResult<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(full_page)
                    .build(),
            )
            .await
            .map_err(protocol)
    }

    async fn close(&mut self) -> DriverResult<()> {
        let result = self.browser.close().await.map(|_| ()).map_err(protocol);
        self.handler_task.abort();
        info!("chromium closed");
        result
    }
}
