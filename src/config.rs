//! Configuration management with environment variable support.
//!
//! This module provides centralized defaults for Page Pilot:
//! - Environment variables for all configurable values
//! - Built-in defaults when a variable is unset or unparseable
//! - CLI flags override both (see `main.rs`)
//!
//! The configuration only supplies defaults. Live resources such as the
//! browser session and the LLM client are constructed explicitly and passed
//! by reference.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PAGE_PILOT_LLM_ENDPOINT` | LLM endpoint URL | `http://localhost:11434/api/generate` |
//! | `PAGE_PILOT_LLM_MODEL` | Model name | `llama3` |
//! | `PAGE_PILOT_LLM_API` | `ollama` or `openai` | `ollama` |
//! | `PAGE_PILOT_LLM_TIMEOUT` | LLM request timeout in seconds | `120` |
//! | `PAGE_PILOT_RESULTS_DIR` | Artifact directory | `results` |
//! | `PAGE_PILOT_MAX_ELEMENTS` | Analyzer element cap | `200` |
//! | `PAGE_PILOT_NAV_TIMEOUT` | Navigation bound in seconds | `30` |
//! | `PAGE_PILOT_STEP_TIMEOUT` | Interactive wait bound in seconds | `10` |
//! | `PAGE_PILOT_HEADLESS` | `false` shows the browser window | `true` |
//! | `PAGE_PILOT_RESET_BETWEEN_TESTS` | Re-navigate before every test case | `false` |
//! | `PAGE_PILOT_VALUE_STRATEGY` | `sample` or `realistic` fill values | `sample` |
//!
//! # Example
//!
//! ```bash
//! # Point the generator at an OpenAI-compatible server
//! export PAGE_PILOT_LLM_API="openai"
//! export PAGE_PILOT_LLM_ENDPOINT="http://127.0.0.1:8080/v1/chat/completions"
//!
//! # Give slow pages more time
//! export PAGE_PILOT_NAV_TIMEOUT=60
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default LLM endpoint (local Ollama)
pub const DEFAULT_LLM_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Default LLM model name
pub const DEFAULT_LLM_MODEL: &str = "llama3";

/// Default LLM wire format
pub const DEFAULT_LLM_API: &str = "ollama";

/// Default LLM request timeout (seconds)
pub const DEFAULT_LLM_TIMEOUT: u64 = 120;

/// Default artifact directory
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Default cap on elements considered by the analyzer
pub const DEFAULT_MAX_ELEMENTS: usize = 200;

/// Default navigation bound (seconds)
pub const DEFAULT_NAV_TIMEOUT: u64 = 30;

/// Default interactive wait bound (seconds)
pub const DEFAULT_STEP_TIMEOUT: u64 = 10;

/// Default fill value strategy
pub const DEFAULT_VALUE_STRATEGY: &str = "sample";

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_LLM_ENDPOINT: &str = "PAGE_PILOT_LLM_ENDPOINT";
pub const ENV_LLM_MODEL: &str = "PAGE_PILOT_LLM_MODEL";
pub const ENV_LLM_API: &str = "PAGE_PILOT_LLM_API";
pub const ENV_LLM_TIMEOUT: &str = "PAGE_PILOT_LLM_TIMEOUT";
pub const ENV_RESULTS_DIR: &str = "PAGE_PILOT_RESULTS_DIR";
pub const ENV_MAX_ELEMENTS: &str = "PAGE_PILOT_MAX_ELEMENTS";
pub const ENV_NAV_TIMEOUT: &str = "PAGE_PILOT_NAV_TIMEOUT";
pub const ENV_STEP_TIMEOUT: &str = "PAGE_PILOT_STEP_TIMEOUT";
pub const ENV_HEADLESS: &str = "PAGE_PILOT_HEADLESS";
pub const ENV_RESET_BETWEEN_TESTS: &str = "PAGE_PILOT_RESET_BETWEEN_TESTS";
pub const ENV_VALUE_STRATEGY: &str = "PAGE_PILOT_VALUE_STRATEGY";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for Page Pilot
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmSettings,
    pub session: SessionSettings,
    pub timeouts: TimeoutSettings,
    pub analysis: AnalysisSettings,
    pub run: RunSettings,
}

/// Language model client settings
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Wire format: `ollama` or `openai`
    pub api: String,
    /// Request timeout (seconds)
    pub timeout: u64,
}

/// Artifact directory settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Directory for screenshots and reports
    pub results_dir: String,
}

/// Bounded wait settings
#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    /// Page load bound (seconds)
    pub navigation_secs: u64,
    /// Locate/act bound per step (seconds)
    pub step_secs: u64,
}

/// Page analysis settings
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub max_elements: usize,
    /// `sample` or `realistic`
    pub value_strategy: String,
}

/// Test run settings
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub headless: bool,
    pub reset_between_tests: bool,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            llm: LlmSettings::from_env(),
            session: SessionSettings::from_env(),
            timeouts: TimeoutSettings::from_env(),
            analysis: AnalysisSettings::from_env(),
            run: RunSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            llm: LlmSettings::defaults(),
            session: SessionSettings::defaults(),
            timeouts: TimeoutSettings::defaults(),
            analysis: AnalysisSettings::defaults(),
            run: RunSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LlmSettings {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENV_LLM_ENDPOINT)
                .unwrap_or_else(|_| DEFAULT_LLM_ENDPOINT.to_string()),
            model: env::var(ENV_LLM_MODEL).unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            api: env::var(ENV_LLM_API).unwrap_or_else(|_| DEFAULT_LLM_API.to_string()),
            timeout: parse_env(ENV_LLM_TIMEOUT).unwrap_or(DEFAULT_LLM_TIMEOUT),
        }
    }

    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api: DEFAULT_LLM_API.to_string(),
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }
}

impl SessionSettings {
    pub fn from_env() -> Self {
        Self {
            results_dir: env::var(ENV_RESULTS_DIR)
                .unwrap_or_else(|_| DEFAULT_RESULTS_DIR.to_string()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
        }
    }
}

impl TimeoutSettings {
    pub fn from_env() -> Self {
        Self {
            navigation_secs: parse_env(ENV_NAV_TIMEOUT).unwrap_or(DEFAULT_NAV_TIMEOUT),
            step_secs: parse_env(ENV_STEP_TIMEOUT).unwrap_or(DEFAULT_STEP_TIMEOUT),
        }
    }

    pub fn defaults() -> Self {
        Self {
            navigation_secs: DEFAULT_NAV_TIMEOUT,
            step_secs: DEFAULT_STEP_TIMEOUT,
        }
    }
}

impl AnalysisSettings {
    pub fn from_env() -> Self {
        Self {
            max_elements: parse_env(ENV_MAX_ELEMENTS).unwrap_or(DEFAULT_MAX_ELEMENTS),
            value_strategy: env::var(ENV_VALUE_STRATEGY)
                .unwrap_or_else(|_| DEFAULT_VALUE_STRATEGY.to_string()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
            value_strategy: DEFAULT_VALUE_STRATEGY.to_string(),
        }
    }
}

impl RunSettings {
    pub fn from_env() -> Self {
        Self {
            headless: env::var(ENV_HEADLESS)
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(true),
            reset_between_tests: env::var(ENV_RESET_BETWEEN_TESTS)
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(false),
        }
    }

    pub fn defaults() -> Self {
        Self {
            headless: true,
            reset_between_tests: false,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse a boolean flag value. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
