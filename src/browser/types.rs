use std::time::Duration;
use thiserror::Error;

use crate::action::FIRST_OPTION;

/// Result type for browser driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors raised by a [`PageDriver`](super::PageDriver)
#[derive(Debug, Error)]
pub enum DriverError {
    /// The browser process could not be started
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Page load failed (timeout, DNS, TLS, unknown page)
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A browser call did not complete in time
    #[error("browser call timed out after {0:?}")]
    Timeout(Duration),

    /// No element matches the selector
    #[error("no element matches '{0}'")]
    ElementNotFound(String),

    /// The DevTools protocol connection reported an error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// In-page script failed or returned something unexpected
    #[error("script error: {0}")]
    Script(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which option a `select` step picks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionChoice {
    /// The first available option
    First,
    /// The option whose value or visible label equals this text
    Matching(String),
}

impl OptionChoice {
    /// Interpret a step value, mapping the `first_option` sentinel to [`OptionChoice::First`].
    pub fn from_value(value: &str) -> Self {
        if value == FIRST_OPTION {
            OptionChoice::First
        } else {
            OptionChoice::Matching(value.to_string())
        }
    }
}

impl std::fmt::Display for OptionChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionChoice::First => f.write_str("first option"),
            OptionChoice::Matching(text) => write!(f, "option '{}'", text),
        }
    }
}
