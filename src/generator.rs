//! Test case generation.
//!
//! The analysis is rendered into a prompt, the model's answer is parsed into
//! test cases, and any failure along the way (unreachable endpoint, HTTP
//! error, malformed output) is recovered by deriving one test case per
//! inferred action. Callers always get a usable list.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::{ActionDescriptor, ActionKind, FIRST_OPTION};
use crate::analyzer::AnalysisResult;
use crate::llm::{LlmError, TextGenerator};
use crate::runner::TestCase;

/// Expected outcome used when none is known
pub const DEFAULT_EXPECTED: &str = "Expected behavior";

/// Keys every generated object must carry
const REQUIRED_FIELDS: [&str; 6] = ["id", "description", "action", "selector", "value", "expected"];

/// Why the model's output could not be used
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("response is not valid JSON: {0}")]
    NotJson(String),

    #[error("response is not a JSON array")]
    NotArray,

    #[error("entry {index} is not a JSON object")]
    NotObject { index: usize },

    #[error("entry {index} is missing '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("duplicate test id '{0}'")]
    DuplicateId(String),

    #[error("response contains no test cases")]
    Empty,
}

/// Why the model was not used
#[derive(Debug, Error)]
pub enum FallbackReason {
    #[error("language model endpoint unreachable")]
    Unreachable,

    #[error("language model request failed: {0}")]
    Request(#[from] LlmError),

    #[error("unusable model output: {0}")]
    Output(#[from] GeneratorError),
}

/// Where a generated list came from
#[derive(Debug)]
pub enum CaseOrigin {
    Model,
    /// Derived 1:1 from the analysis because the model was not usable
    Fallback { reason: FallbackReason },
}

/// Output of [`TestCaseGenerator::generate`]
#[derive(Debug)]
pub struct GeneratedCases {
    pub cases: Vec<TestCase>,
    pub origin: CaseOrigin,
}

impl GeneratedCases {
    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, CaseOrigin::Fallback { .. })
    }
}

/// Render the generator prompt for an analysis.
///
/// Page content is substituted once, so braces in a title or URL are kept
/// as-is.
pub fn build_prompt(analysis: &AnalysisResult) -> String {
    let mut actions = String::new();
    for action in &analysis.actions {
        let _ = writeln!(
            actions,
            "- Action: {}, Selector: {}, Value: {}",
            action.action, action.selector, action.value
        );
    }
    if actions.is_empty() {
        actions.push_str("No actions detected.");
    } else {
        actions.pop();
    }

    format!(
        r#"You are a JSON-only generator.
If you output anything other than a valid JSON array, the response will be rejected.
Output must start with [ and end with ].
No explanations, no comments, no markdown, no extra text.

You are an AI test generator. Based on the following web page analysis:

Title: {title}
URL: {url}
Possible Actions:
{actions}

Generate a list of UI test cases in pure JSON format.

Each test must have:
- id (string, e.g., T1, T2, ...)
- description (string, short and clear)
- action (string: click, fill, check, select, assert_text, assert_url, wait)
- selector (CSS selector string)
- value (string, leave "" if not needed)
- expected (string, expected outcome)

Output JSON ONLY, like this:

[
  {{
    "id": "T1",
    "description": "Click login button → Login modal opens",
    "action": "click",
    "selector": "button#login",
    "value": "",
    "expected": "Login modal opens"
  }}
]
"#,
        title = analysis.title,
        url = analysis.url,
        actions = actions,
    )
}

/// Strip an OpenAI-style envelope and Markdown code fences from model output.
pub fn extract_json_payload(output: &str) -> String {
    let trimmed = output.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(content) = value
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
        {
            return strip_code_fence(content);
        }
        return trimmed.to_string();
    }
    strip_code_fence(trimmed)
}

fn strip_code_fence(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(stripped) = trimmed.strip_prefix("```json") {
        return stripped.trim().trim_end_matches("```").trim().to_string();
    }
    if let Some(stripped) = trimmed.strip_prefix("```") {
        return stripped.trim().trim_end_matches("```").trim().to_string();
    }
    trimmed.to_string()
}

/// Human-readable description of a single-step test.
pub fn humanize_description(step: &ActionDescriptor, expected: &str) -> String {
    let selector = &step.selector;
    match &step.action {
        ActionKind::Fill => format!("Fill {} with '{}' → {}", selector, step.value, expected),
        ActionKind::Check => format!("Check option {} → {}", selector, expected),
        ActionKind::Click => format!("Click {} → {}", selector, expected),
        ActionKind::Select if step.value == FIRST_OPTION => {
            format!("Select first option of {} → {}", selector, expected)
        }
        ActionKind::Select => format!("Select '{}' in {} → {}", step.value, selector, expected),
        other => format!("{} on {} → {}", other, selector, expected),
    }
}

/// One test case per action, ids `T1..Tn`, steps copied verbatim.
pub fn fallback_test_cases(actions: &[ActionDescriptor]) -> Vec<TestCase> {
    actions
        .iter()
        .enumerate()
        .map(|(i, action)| {
            TestCase::new(
                format!("T{}", i + 1),
                humanize_description(action, DEFAULT_EXPECTED),
                vec![action.clone()],
            )
            .expected(DEFAULT_EXPECTED)
        })
        .collect()
}

/// Scalar field as a string; `null`, objects and arrays count as missing.
fn scalar_field(
    object: &Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, GeneratorError> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(GeneratorError::MissingField { index, field }),
    }
}

/// Parse cleaned model output into test cases.
///
/// Each array entry is a flat object with every key in [`REQUIRED_FIELDS`]
/// and becomes a single-step test case.
pub fn parse_test_cases(payload: &str) -> Result<Vec<TestCase>, GeneratorError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| GeneratorError::NotJson(e.to_string()))?;
    let Value::Array(entries) = value else {
        return Err(GeneratorError::NotArray);
    };
    if entries.is_empty() {
        return Err(GeneratorError::Empty);
    }

    let mut seen = HashSet::new();
    let mut cases = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let object = entry
            .as_object()
            .ok_or(GeneratorError::NotObject { index })?;
        for field in REQUIRED_FIELDS {
            scalar_field(object, index, field)?;
        }

        let id = scalar_field(object, index, "id")?;
        if !seen.insert(id.clone()) {
            return Err(GeneratorError::DuplicateId(id));
        }
        let step = ActionDescriptor::new(
            ActionKind::from(scalar_field(object, index, "action")?),
            scalar_field(object, index, "selector")?,
            scalar_field(object, index, "value")?,
        );
        let expected = scalar_field(object, index, "expected")?;
        let description = scalar_field(object, index, "description")?;
        let description = if description.trim().is_empty() {
            humanize_description(&step, &expected)
        } else {
            description.trim().to_string()
        };

        cases.push(TestCase::new(id, description, vec![step]).expected(expected));
    }
    Ok(cases)
}

/// Asks a language model for test cases, falling back to a 1:1 derivation.
pub struct TestCaseGenerator<'a> {
    client: &'a dyn TextGenerator,
    attach_screenshot: bool,
}

impl<'a> TestCaseGenerator<'a> {
    pub fn new(client: &'a dyn TextGenerator) -> Self {
        Self {
            client,
            attach_screenshot: false,
        }
    }

    /// Attach the analysis screenshot to the request
    pub fn attach_screenshot(mut self, attach: bool) -> Self {
        self.attach_screenshot = attach;
        self
    }

    /// Generate test cases. Never fails.
    pub async fn generate(&self, analysis: &AnalysisResult) -> GeneratedCases {
        match self.ask_model(analysis).await {
            Ok(cases) => {
                info!(count = cases.len(), "model generated test cases");
                GeneratedCases {
                    cases,
                    origin: CaseOrigin::Model,
                }
            }
            Err(reason) => {
                warn!(%reason, actions = analysis.actions.len(), "falling back to one test per action");
                GeneratedCases {
                    cases: fallback_test_cases(&analysis.actions),
                    origin: CaseOrigin::Fallback { reason },
                }
            }
        }
    }

    async fn ask_model(&self, analysis: &AnalysisResult) -> Result<Vec<TestCase>, FallbackReason> {
        if !self.client.is_healthy().await {
            return Err(FallbackReason::Unreachable);
        }

        let image = if self.attach_screenshot {
            match tokio::fs::read(&analysis.screenshot).await {
                Ok(png) => Some(png),
                Err(err) => {
                    warn!(path = %analysis.screenshot.display(), error = %err, "screenshot not attached");
                    None
                }
            }
        } else {
            None
        };

        let prompt = build_prompt(analysis);
        let raw = self.client.complete(&prompt, image.as_deref()).await?;
        debug!(chars = raw.len(), "model responded");

        Ok(parse_test_cases(&extract_json_payload(&raw))?)
    }
}
