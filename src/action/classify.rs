//! Element-to-action classification.
//!
//! Classification is an ordered rule table: the first rule whose predicate
//! matches an element decides the action.
//!
//! | rule | matches | action | value |
//! |------|---------|--------|-------|
//! | `text-input` | `input` of type text/email/password/number (missing type = text) | fill | strategy value |
//! | `toggle-input` | `input` of type checkbox/radio | check | `true` |
//! | `button-input` | `input` of type submit/button | click | empty |
//! | `textarea` | `textarea` | fill | strategy value, subtype `text` |
//! | `select` | `select` | select | `first_option` |
//! | `clickable` | `button`, `a`, or `role="button"` (not an `input`) | click | empty |

use super::selector::derive_selector;
use super::types::{ActionDescriptor, ActionKind, CHECKED, ElementSnapshot, FIRST_OPTION};

/// Input types that accept free text.
const TEXT_INPUT_TYPES: &[&str] = &["text", "email", "password", "number"];

/// Input types that toggle.
const TOGGLE_INPUT_TYPES: &[&str] = &["checkbox", "radio"];

/// Input types that behave like buttons.
const BUTTON_INPUT_TYPES: &[&str] = &["submit", "button"];

/// What a matching rule emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// Fill with a value from the [`ValueStrategy`]; the subtype is taken from
    /// the input type, or the fixed subtype when given.
    Fill(Option<&'static str>),
    Check,
    Click,
    SelectFirst,
}

/// One row of the classification table.
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&ElementSnapshot) -> bool,
    pub emit: Emit,
}

/// The classification table, in priority order.
pub static RULES: &[Rule] = &[
    Rule {
        name: "text-input",
        matches: is_text_input,
        emit: Emit::Fill(None),
    },
    Rule {
        name: "toggle-input",
        matches: is_toggle_input,
        emit: Emit::Check,
    },
    Rule {
        name: "button-input",
        matches: is_button_input,
        emit: Emit::Click,
    },
    Rule {
        name: "textarea",
        matches: is_textarea,
        emit: Emit::Fill(Some("text")),
    },
    Rule {
        name: "select",
        matches: is_select,
        emit: Emit::SelectFirst,
    },
    Rule {
        name: "clickable",
        matches: is_clickable,
        emit: Emit::Click,
    },
];

/// The `type` of an input, lowercased, defaulting to `text`.
fn input_type(el: &ElementSnapshot) -> String {
    el.get("type")
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "text".to_string())
}

fn is_input_of(el: &ElementSnapshot, types: &[&str]) -> bool {
    el.tag == "input" && types.contains(&input_type(el).as_str())
}

fn is_text_input(el: &ElementSnapshot) -> bool {
    is_input_of(el, TEXT_INPUT_TYPES)
}

fn is_toggle_input(el: &ElementSnapshot) -> bool {
    is_input_of(el, TOGGLE_INPUT_TYPES)
}

fn is_button_input(el: &ElementSnapshot) -> bool {
    is_input_of(el, BUTTON_INPUT_TYPES)
}

fn is_textarea(el: &ElementSnapshot) -> bool {
    el.tag == "textarea"
}

fn is_select(el: &ElementSnapshot) -> bool {
    el.tag == "select"
}

// Inputs of any other type (hidden, file, range, ...) never fall through to
// the generic click rule, even with role="button".
fn is_clickable(el: &ElementSnapshot) -> bool {
    el.tag != "input" && (el.tag == "button" || el.tag == "a" || el.role() == Some("button"))
}

/// Produces the placeholder typed into fillable fields.
pub trait ValueStrategy: Send + Sync {
    /// Value for a field of `subtype` (input type, or `text` for textareas)
    /// at enumeration position `index`.
    fn fill_value(&self, subtype: &str, index: usize) -> String;

    fn name(&self) -> &str;
}

/// `sample_<subtype>_<index>` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleValues;

impl ValueStrategy for SampleValues {
    fn fill_value(&self, subtype: &str, index: usize) -> String {
        format!("sample_{}_{}", subtype, index)
    }

    fn name(&self) -> &str {
        "sample"
    }
}

/// Placeholders shaped to pass common client-side validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealisticValues;

impl ValueStrategy for RealisticValues {
    fn fill_value(&self, subtype: &str, index: usize) -> String {
        match subtype {
            "email" => format!("user{}@example.com", index),
            "number" => (index + 1).to_string(),
            "password" => format!("Passw0rd!{}", index),
            _ => format!("Sample text {}", index),
        }
    }

    fn name(&self) -> &str {
        "realistic"
    }
}

/// Look up a value strategy by name (`sample` or `realistic`).
pub fn strategy_by_name(name: &str) -> Option<Box<dyn ValueStrategy>> {
    match name.trim().to_lowercase().as_str() {
        "sample" => Some(Box::new(SampleValues)),
        "realistic" => Some(Box::new(RealisticValues)),
        _ => None,
    }
}

/// Maps element snapshots to at most one action each.
pub struct ActionClassifier {
    strategy: Box<dyn ValueStrategy>,
}

impl Default for ActionClassifier {
    fn default() -> Self {
        Self::new(Box::new(SampleValues))
    }
}

impl std::fmt::Debug for ActionClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionClassifier")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl ActionClassifier {
    pub fn new(strategy: Box<dyn ValueStrategy>) -> Self {
        Self { strategy }
    }

    /// Name of the active value strategy
    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// The first rule matching `el`, if any.
    pub fn matching_rule(el: &ElementSnapshot) -> Option<&'static Rule> {
        RULES.iter().find(|rule| (rule.matches)(el))
    }

    /// Classify the element at enumeration position `index`.
    pub fn classify(&self, el: &ElementSnapshot, index: usize) -> Option<ActionDescriptor> {
        let rule = Self::matching_rule(el)?;
        let selector = derive_selector(&el.attributes, &el.tag);

        let descriptor = match rule.emit {
            Emit::Fill(subtype) => {
                let subtype = subtype.map(str::to_string).unwrap_or_else(|| input_type(el));
                ActionDescriptor::new(
                    ActionKind::Fill,
                    selector,
                    self.strategy.fill_value(&subtype, index),
                )
            }
            Emit::Check => ActionDescriptor::new(ActionKind::Check, selector, CHECKED),
            Emit::Click => ActionDescriptor::new(ActionKind::Click, selector, ""),
            Emit::SelectFirst => ActionDescriptor::new(ActionKind::Select, selector, FIRST_OPTION),
        };
        Some(descriptor)
    }
}
