//! Scripted in-memory browser for tests and dry runs.
//!
//! A [`MockSite`] is a set of pages keyed by URL. Each page holds a flat list
//! of [`MockElement`]s in document order. A [`MockLauncher`] hands out
//! [`MockPage`] sessions over a private copy of the site, so mutations
//! (filled values, clicks that navigate) are visible for the rest of that
//! session only.
//!
//! Supported selectors: `tag`, `#id`, `.class`, `[attr]`, `[attr='v']`, any
//! compound of those (`input#user.wide[type=text]`), and comma-separated
//! lists. Anything else (combinators, pseudo-classes) matches nothing.

use async_trait::async_trait;
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{ImageBuffer, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::driver::{Launcher, PageDriver};
use super::types::{DriverError, DriverResult, OptionChoice};
use crate::action::ElementSnapshot;

/// One `<option>` of a mock `<select>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockOption {
    pub value: String,
    pub label: String,
}

/// What happens when a mock element is clicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClickEffect {
    /// Load another page of the site
    Navigate { url: String },
    /// Replace the text of the first element matching `selector`
    SetText { selector: String, text: String },
    /// Reveal elements matching `selector`
    Reveal { selector: String },
}

/// A scripted DOM element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockElement {
    pub tag: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lookups that miss this element before it attaches to the document
    #[serde(default)]
    pub appears_after: usize,
    #[serde(default)]
    pub options: Vec<MockOption>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub selected: Option<usize>,
    #[serde(default)]
    pub on_click: Option<ClickEffect>,
    /// Attribute extraction throws for this element
    #[serde(default)]
    pub unreadable: bool,
}

fn default_true() -> bool {
    true
}

impl MockElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attributes: HashMap::new(),
            text: String::new(),
            visible: true,
            enabled: true,
            appears_after: 0,
            options: Vec::new(),
            value: String::new(),
            checked: false,
            selected: None,
            on_click: None,
            unreadable: false,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn appears_after(mut self, lookups: usize) -> Self {
        self.appears_after = lookups;
        self
    }

    pub fn option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.options.push(MockOption {
            value: value.into(),
            label: label.into(),
        });
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }

    fn snapshot(&self) -> DriverResult<ElementSnapshot> {
        if self.unreadable {
            return Err(DriverError::Script(format!(
                "cannot read attributes of <{}>",
                self.tag
            )));
        }
        Ok(ElementSnapshot {
            tag: self.tag.clone(),
            attributes: self.attributes.clone(),
            role: self.attributes.get("role").cloned(),
        })
    }

    fn attached(&self) -> bool {
        self.appears_after == 0
    }

    fn is_fillable(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea")
            || self.attributes.contains_key("contenteditable")
    }
}

/// A scripted page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockPageSpec {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub elements: Vec<MockElement>,
}

impl MockPageSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: Vec::new(),
        }
    }

    pub fn element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// A set of scripted pages keyed by URL, plus server-side redirects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockSite {
    #[serde(default)]
    pub pages: HashMap<String, MockPageSpec>,
    #[serde(default)]
    pub redirects: HashMap<String, String>,
}

impl MockSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, spec: MockPageSpec) -> Self {
        self.pages.insert(url.into(), spec);
        self
    }

    pub fn redirect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.redirects.insert(from.into(), to.into());
        self
    }

    /// Load a site description from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Session counters shared by a launcher and every page it opened
#[derive(Debug, Default)]
pub struct SessionStats {
    launched: AtomicUsize,
    closed: AtomicUsize,
}

impl SessionStats {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opens [`MockPage`] sessions over a [`MockSite`]
#[derive(Debug, Clone)]
pub struct MockLauncher {
    site: Arc<MockSite>,
    stats: Arc<SessionStats>,
}

impl MockLauncher {
    pub fn new(site: MockSite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    type Page = MockPage;

    async fn launch(&self) -> DriverResult<MockPage> {
        self.stats.launched.fetch_add(1, Ordering::SeqCst);
        Ok(MockPage::with_stats(
            MockSite::clone(&self.site),
            Arc::clone(&self.stats),
        ))
    }

    fn source_type(&self) -> &str {
        "mock"
    }
}

/// A live session over a private copy of a [`MockSite`]
#[derive(Debug)]
pub struct MockPage {
    site: MockSite,
    url: String,
    stats: Arc<SessionStats>,
    closed: bool,
}

impl MockPage {
    pub fn new(site: MockSite) -> Self {
        Self::with_stats(site, Arc::new(SessionStats::default()))
    }

    fn with_stats(site: MockSite, stats: Arc<SessionStats>) -> Self {
        Self {
            site,
            url: "about:blank".to_string(),
            stats,
            closed: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current value of the first element matching `selector`
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let index = self.find_attached(selector)?;
        self.current().map(|page| page.elements[index].value.clone())
    }

    /// Checked state of the first element matching `selector`
    pub fn is_checked(&self, selector: &str) -> Option<bool> {
        let index = self.find_attached(selector)?;
        self.current().map(|page| page.elements[index].checked)
    }

    /// Selected option value of the first `<select>` matching `selector`
    pub fn selected_value(&self, selector: &str) -> Option<String> {
        let index = self.find_attached(selector)?;
        let element = &self.current()?.elements[index];
        element
            .selected
            .and_then(|i| element.options.get(i))
            .map(|o| o.value.clone())
    }

    fn current(&self) -> Option<&MockPageSpec> {
        self.site.pages.get(&self.url)
    }

    fn current_mut(&mut self) -> Option<&mut MockPageSpec> {
        self.site.pages.get_mut(&self.url)
    }

    fn load(&mut self, url: &str) -> DriverResult<()> {
        let mut target = url.to_string();
        // Follow redirects, guarding against loops.
        for _ in 0..10 {
            match self.site.redirects.get(&target) {
                Some(next) => target = next.clone(),
                None => break,
            }
        }
        if !self.site.pages.contains_key(&target) {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        self.url = target;
        Ok(())
    }

    fn find_attached(&self, selector: &str) -> Option<usize> {
        let selector = Selector::parse(selector);
        self.current()?
            .elements
            .iter()
            .position(|el| el.attached() && selector.matches(el))
    }

    /// Looks an element up, counting the miss against elements that attach late.
    fn lookup(&mut self, selector: &str) -> Option<usize> {
        let parsed = Selector::parse(selector);
        let page = self.current_mut()?;
        let mut found = None;
        for (index, el) in page.elements.iter_mut().enumerate() {
            if !parsed.matches(el) {
                continue;
            }
            if el.appears_after > 0 {
                el.appears_after -= 1;
                continue;
            }
            if found.is_none() {
                found = Some(index);
            }
        }
        found
    }

    fn require(&mut self, selector: &str) -> DriverResult<usize> {
        self.lookup(selector)
            .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))
    }

    fn apply_click(&mut self, effect: ClickEffect) -> DriverResult<()> {
        match effect {
            ClickEffect::Navigate { url } => {
                let target = resolve_url(&self.url, &url);
                self.load(&target)
            }
            ClickEffect::SetText { selector, text } => {
                let index = self.require(&selector)?;
                if let Some(page) = self.current_mut() {
                    page.elements[index].text = text;
                }
                Ok(())
            }
            ClickEffect::Reveal { selector } => {
                let parsed = Selector::parse(&selector);
                if let Some(page) = self.current_mut() {
                    for el in page.elements.iter_mut().filter(|el| parsed.matches(el)) {
                        el.visible = true;
                        el.appears_after = 0;
                    }
                }
                Ok(())
            }
        }
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Protocol("session already closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.ensure_open()?;
        self.load(url)
    }

    async fn title(&mut self) -> DriverResult<String> {
        Ok(self.current().map(|p| p.title.clone()).unwrap_or_default())
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        Ok(self.url.clone())
    }

    async fn snapshot_elements(
        &mut self,
        query: &str,
        limit: usize,
    ) -> DriverResult<Vec<DriverResult<ElementSnapshot>>> {
        self.ensure_open()?;
        let selector = Selector::parse(query);
        let Some(page) = self.current() else {
            return Ok(Vec::new());
        };
        Ok(page
            .elements
            .iter()
            .filter(|el| el.attached() && selector.matches(el))
            .take(limit)
            .map(MockElement::snapshot)
            .collect())
    }

    async fn is_present(&mut self, selector: &str) -> DriverResult<bool> {
        self.ensure_open()?;
        Ok(self.lookup(selector).is_some())
    }

    async fn is_actionable(&mut self, selector: &str) -> DriverResult<bool> {
        self.ensure_open()?;
        let Some(index) = self.lookup(selector) else {
            return Ok(false);
        };
        Ok(self
            .current()
            .map(|p| p.elements[index].visible && p.elements[index].enabled)
            .unwrap_or(false))
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        self.ensure_open()?;
        let index = self.require(selector)?;
        let element = self
            .current()
            .map(|p| p.elements[index].clone())
            .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;

        if let Some(effect) = element.on_click {
            return self.apply_click(effect);
        }
        if element.tag == "a" {
            if let Some(href) = element.attributes.get("href") {
                let target = resolve_url(&self.url, href);
                return self.load(&target);
            }
        }
        if element.tag == "input"
            && matches!(
                element.attributes.get("type").map(String::as_str),
                Some("checkbox") | Some("radio")
            )
        {
            if let Some(page) = self.current_mut() {
                let el = &mut page.elements[index];
                el.checked = !el.checked;
            }
        }
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        self.ensure_open()?;
        let index = self.require(selector)?;
        let page = self
            .current_mut()
            .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;
        let el = &mut page.elements[index];
        if !el.is_fillable() {
            return Err(DriverError::Script(format!(
                "<{}> matched by '{}' is not an input, textarea or contenteditable",
                el.tag, selector
            )));
        }
        el.value = value.to_string();
        Ok(())
    }

    async fn set_checked(&mut self, selector: &str, checked: bool) -> DriverResult<()> {
        self.ensure_open()?;
        let index = self.require(selector)?;
        if let Some(page) = self.current_mut() {
            page.elements[index].checked = checked;
        }
        Ok(())
    }

    async fn select_option(&mut self, selector: &str, choice: &OptionChoice) -> DriverResult<bool> {
        self.ensure_open()?;
        let index = self.require(selector)?;
        let page = self
            .current_mut()
            .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;
        let el = &mut page.elements[index];
        if el.tag != "select" {
            return Err(DriverError::Script(format!(
                "element matched by '{}' is not a <select>",
                selector
            )));
        }
        let position = match choice {
            OptionChoice::First => (!el.options.is_empty()).then_some(0),
            OptionChoice::Matching(text) => el
                .options
                .iter()
                .position(|o| &o.value == text || o.label.trim() == text),
        };
        match position {
            Some(i) => {
                el.selected = Some(i);
                el.value = el.options[i].value.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn inner_text(&mut self, selector: &str) -> DriverResult<String> {
        self.ensure_open()?;
        let index = self.require(selector)?;
        let el = self
            .current()
            .map(|p| &p.elements[index])
            .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;
        if el.visible {
            Ok(el.text.clone())
        } else {
            Ok(String::new())
        }
    }

    async fn screenshot(&mut self, _full_page: bool) -> DriverResult<Vec<u8>> {
        self.ensure_open()?;
        let spec = self.current().cloned().unwrap_or_default();
        render_page(&self.url, &spec)
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        self.closed = true;
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Resolve `href` against the page at `base`.
fn resolve_url(base: &str, href: &str) -> String {
    if href.contains("://") {
        return href.to_string();
    }
    let origin = base
        .find("://")
        .map(|scheme_end| {
            let rest = &base[scheme_end + 3..];
            let host_end = rest.find('/').map(|i| scheme_end + 3 + i).unwrap_or(base.len());
            &base[..host_end]
        })
        .unwrap_or(base);
    if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else {
        let dir = base.rfind('/').map(|i| &base[..=i]).unwrap_or(base);
        if dir.len() <= origin.len() {
            format!("{}/{}", origin, href)
        } else {
            format!("{}{}", dir, href)
        }
    }
}

// ============================================================================
// Selector matching
// ============================================================================

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

/// A comma-separated list of compound selectors; `None` entries never match.
#[derive(Debug)]
struct Selector(Vec<Option<Compound>>);

impl Selector {
    fn parse(input: &str) -> Self {
        Self(input.split(',').map(|part| parse_compound(part.trim())).collect())
    }

    fn matches(&self, el: &MockElement) -> bool {
        self.0
            .iter()
            .flatten()
            .any(|compound| compound.matches(el))
    }
}

impl Compound {
    fn matches(&self, el: &MockElement) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && tag != &el.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attributes.get("id") != Some(id) {
                return false;
            }
        }
        let classes: Vec<&str> = el
            .attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();
        if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
        self.attributes.iter().all(|(name, value)| match value {
            Some(value) => el.attributes.get(name) == Some(value),
            None => el.attributes.contains_key(name),
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(input: &str) -> Option<Compound> {
    if input.is_empty() {
        return None;
    }
    let chars: Vec<char> = input.chars().collect();
    let mut compound = Compound::default();
    let mut i = 0;

    let take_ident = |i: &mut usize| -> String {
        let start = *i;
        while *i < chars.len() && is_ident_char(chars[*i]) {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    };

    if chars[0] == '*' {
        compound.tag = Some("*".to_string());
        i = 1;
    } else if is_ident_char(chars[0]) {
        compound.tag = Some(take_ident(&mut i).to_lowercase());
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                let id = take_ident(&mut i);
                if id.is_empty() {
                    return None;
                }
                compound.id = Some(id);
            }
            '.' => {
                i += 1;
                let class = take_ident(&mut i);
                if class.is_empty() {
                    return None;
                }
                compound.classes.push(class);
            }
            '[' => {
                let close = chars[i..].iter().position(|&c| c == ']')? + i;
                let body: String = chars[i + 1..close].iter().collect();
                let (name, value) = match body.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
                        (name.trim().to_string(), Some(value.to_string()))
                    }
                    None => (body.trim().to_string(), None),
                };
                compound.attributes.push((name, value));
                i = close + 1;
            }
            _ => return None,
        }
    }
    Some(compound)
}

// ============================================================================
// Screenshot rendering
// ============================================================================

/// RGB pixel buffer used to render mock screenshots
struct Framebuffer {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl Framebuffer {
    fn with_color(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut buffer = vec![0u8; (width * height * 3) as usize];
        for chunk in buffer.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
        Self {
            width,
            height,
            buffer,
        }
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x < self.width && y < self.height {
            let idx = ((y * self.width + x) * 3) as usize;
            self.buffer[idx..idx + 3].copy_from_slice(&color);
        }
    }

    fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    fn draw_text(&mut self, x: u32, y: u32, text: &str, fg: [u8; 3]) {
        for (i, ch) in text.chars().enumerate() {
            let cx = x + (i as u32) * 8;
            if cx + 8 > self.width {
                break;
            }
            let glyph = BASIC_FONTS.get(ch).unwrap_or([0u8; 8]);
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..8 {
                    // LSB is the leftmost pixel
                    if (bits >> col) & 1 == 1 {
                        self.set_pixel(cx + col, y + row as u32, fg);
                    }
                }
            }
        }
    }

    fn to_png(&self) -> DriverResult<Vec<u8>> {
        let img: RgbImage = ImageBuffer::from_raw(self.width, self.height, self.buffer.clone())
            .ok_or_else(|| DriverError::Script("framebuffer size mismatch".to_string()))?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| DriverError::Io(std::io::Error::other(e.to_string())))?;
        Ok(bytes)
    }
}

/// Draw the title, URL and one bar per visible element.
fn render_page(url: &str, spec: &MockPageSpec) -> DriverResult<Vec<u8>> {
    const WIDTH: u32 = 640;
    const ROW: u32 = 14;
    let visible: Vec<&MockElement> = spec
        .elements
        .iter()
        .filter(|el| el.attached() && el.visible)
        .collect();
    let height = 40 + ROW * visible.len() as u32 + 8;

    let mut fb = Framebuffer::with_color(WIDTH, height, [245, 245, 245]);
    fb.draw_rect(0, 0, WIDTH, 32, [40, 44, 52]);
    fb.draw_text(8, 4, &spec.title, [255, 255, 255]);
    fb.draw_text(8, 18, url, [170, 170, 170]);

    for (row, el) in visible.iter().enumerate() {
        let y = 40 + row as u32 * ROW;
        let color = match el.tag.as_str() {
            "button" | "a" => [66, 133, 244],
            "input" | "textarea" | "select" => [120, 120, 120],
            _ => [200, 200, 200],
        };
        fb.draw_rect(8, y, 4, ROW - 4, color);
        let label = if el.text.is_empty() {
            format!("<{}>", el.tag)
        } else {
            el.text.clone()
        };
        fb.draw_text(18, y, &label, [20, 20, 20]);
    }
    fb.to_png()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn site() -> MockSite {
        MockSite::new()
            .page(
                "https://shop.test/",
                MockPageSpec::new("Shop")
                    .element(MockElement::new("a").attr("href", "/cart").text("Cart"))
                    .element(MockElement::new("input").id("q").attr("class", "search wide"))
                    .element(
                        MockElement::new("select")
                            .attr("name", "size")
                            .option("s", "Small")
                            .option("m", "Medium"),
                    ),
            )
            .page("https://shop.test/cart", MockPageSpec::new("Cart"))
            .redirect("http://shop.test/", "https://shop.test/")
    }

    #[test]
    fn test_selector_forms() {
        let el = MockElement::new("input")
            .id("q")
            .attr("class", "search wide")
            .attr("name", "query")
            .attr("type", "text");
        for selector in [
            "input",
            "#q",
            ".search",
            ".wide",
            "[name='query']",
            "[name=\"query\"]",
            "[type]",
            "input#q.search[type=text]",
            "a, input",
            "*",
        ] {
            assert!(Selector::parse(selector).matches(&el), "{}", selector);
        }
        for selector in ["button", "#other", ".narrow", "[name='x']", "form input", "input:hover"] {
            assert!(!Selector::parse(selector).matches(&el), "{}", selector);
        }
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(resolve_url("https://a.test/x/y", "/cart"), "https://a.test/cart");
        assert_eq!(resolve_url("https://a.test/x/y", "z"), "https://a.test/x/z");
        assert_eq!(resolve_url("https://a.test", "z"), "https://a.test/z");
        assert_eq!(resolve_url("https://a.test/", "http://b.test/"), "http://b.test/");
    }

    #[tokio::test]
    async fn test_redirect_and_anchor_navigation() {
        let mut page = MockPage::new(site());
        page.goto("http://shop.test/").await.unwrap();
        assert_eq!(page.current_url().await.unwrap(), "https://shop.test/");
        page.click("a").await.unwrap();
        assert_eq!(page.title().await.unwrap(), "Cart");
    }

    #[tokio::test]
    async fn test_unknown_page_is_navigation_error() {
        let mut page = MockPage::new(site());
        let err = page.goto("https://nowhere.test/").await.unwrap_err();
        assert!(matches!(err, DriverError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_select_by_label_and_first() {
        let mut page = MockPage::new(site());
        page.goto("https://shop.test/").await.unwrap();
        let sel = "[name='size']";
        assert!(page.select_option(sel, &OptionChoice::Matching("Medium".into())).await.unwrap());
        assert_eq!(page.selected_value(sel).as_deref(), Some("m"));
        assert!(page.select_option(sel, &OptionChoice::First).await.unwrap());
        assert_eq!(page.selected_value(sel).as_deref(), Some("s"));
        assert!(!page.select_option(sel, &OptionChoice::Matching("XL".into())).await.unwrap());
    }

    #[tokio::test]
    async fn test_late_element_attaches_after_lookups() {
        let site = MockSite::new().page(
            "https://a.test/",
            MockPageSpec::new("A").element(MockElement::new("div").id("toast").appears_after(2)),
        );
        let mut page = MockPage::new(site);
        page.goto("https://a.test/").await.unwrap();
        assert!(!page.is_present("#toast").await.unwrap());
        assert!(!page.is_present("#toast").await.unwrap());
        assert!(page.is_present("#toast").await.unwrap());
    }

    #[tokio::test]
    async fn test_screenshot_is_png() {
        let mut page = MockPage::new(site());
        page.goto("https://shop.test/").await.unwrap();
        let png = page.screenshot(true).await.unwrap();
        assert_eq!(&png[0..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_site_from_json() {
        let json = r#"{
            "pages": {
                "https://a.test/": {
                    "title": "A",
                    "elements": [
                        {"tag": "button", "attributes": {"id": "go"}, "text": "Go",
                         "on_click": {"type": "navigate", "url": "/done"}}
                    ]
                }
            }
        }"#;
        let site = MockSite::from_json(json).unwrap();
        let el = &site.pages["https://a.test/"].elements[0];
        assert!(el.visible);
        assert_eq!(
            el.on_click,
            Some(ClickEffect::Navigate { url: "/done".to_string() })
        );
    }
}
