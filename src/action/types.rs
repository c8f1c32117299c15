//! Core types for the action vocabulary shared by the analyzer, the
//! generator and the runner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Value of a `select` step that means "choose the first available option".
pub const FIRST_OPTION: &str = "first_option";

/// Value of a `check` step produced by the classifier.
pub const CHECKED: &str = "true";

/// Transient extraction of one DOM element, used only for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Lowercase tag name (e.g. "input", "a")
    pub tag: String,

    /// Every attribute present on the element
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Explicit `role` attribute, if any
    #[serde(default)]
    pub role: Option<String>,
}

impl ElementSnapshot {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attributes: HashMap::new(),
            role: None,
        }
    }

    /// Add an attribute. A `role` attribute also populates [`ElementSnapshot::role`].
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == "role" {
            self.role = Some(value.clone());
        }
        self.attributes.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The explicit role, falling back to the `role` attribute.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref().or_else(|| self.get("role"))
    }
}

/// The kind of interaction a step performs.
///
/// Names outside the known vocabulary are kept verbatim in `Other` so that a
/// malformed test case can still be loaded and reported as an unknown action
/// when it is executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Click,
    Fill,
    Check,
    Select,
    AssertText,
    AssertUrl,
    Wait,
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Fill => "fill",
            ActionKind::Check => "check",
            ActionKind::Select => "select",
            ActionKind::AssertText => "assert_text",
            ActionKind::AssertUrl => "assert_url",
            ActionKind::Wait => "wait",
            ActionKind::Other(name) => name,
        }
    }
}

impl From<String> for ActionKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "click" => ActionKind::Click,
            "fill" => ActionKind::Fill,
            "check" => ActionKind::Check,
            "select" => ActionKind::Select,
            "assert_text" => ActionKind::AssertText,
            "assert_url" => ActionKind::AssertUrl,
            "wait" => ActionKind::Wait,
            _ => ActionKind::Other(name),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(name: &str) -> Self {
        ActionKind::from(name.to_string())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized UI interaction: what to do, where, and with which value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action: ActionKind,
    pub selector: String,
    /// Empty when the action takes no value
    #[serde(default)]
    pub value: String,
}

impl ActionDescriptor {
    pub fn new(action: ActionKind, selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action,
            selector: selector.into(),
            value: value.into(),
        }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Self::new(ActionKind::Click, selector, "")
    }

    pub fn fill(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ActionKind::Fill, selector, value)
    }

    pub fn check(selector: impl Into<String>) -> Self {
        Self::new(ActionKind::Check, selector, CHECKED)
    }

    pub fn select_first(selector: impl Into<String>) -> Self {
        Self::new(ActionKind::Select, selector, FIRST_OPTION)
    }

    pub fn assert_text(selector: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::new(ActionKind::AssertText, selector, expected)
    }

    pub fn assert_url(expected: impl Into<String>) -> Self {
        Self::new(ActionKind::AssertUrl, "body", expected)
    }

    pub fn wait(selector: impl Into<String>) -> Self {
        Self::new(ActionKind::Wait, selector, "")
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{} {}", self.action, self.selector)
        } else {
            write!(f, "{} {} = '{}'", self.action, self.selector, self.value)
        }
    }
}
