//! Language model client used by the test case generator.
//!
//! Two wire formats are supported:
//! - Ollama `/api/generate` (non-streaming, answer in `response`)
//! - OpenAI-compatible `/chat/completions` (answer in `choices[0].message.content`)
//!
//! # Configuration
//!
//! Defaults come from `PAGE_PILOT_LLM_ENDPOINT`, `PAGE_PILOT_LLM_MODEL`,
//! `PAGE_PILOT_LLM_API` and `PAGE_PILOT_LLM_TIMEOUT`.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur while talking to the model
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection refused, DNS failure, timeout
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Request/response format of the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmApi {
    Ollama,
    OpenAi,
}

impl LlmApi {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ollama" => Some(LlmApi::Ollama),
            "openai" | "openai-compatible" => Some(LlmApi::OpenAi),
            _ => None,
        }
    }
}

/// Configuration for the LLM client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    pub api: LlmApi,
    /// Total request timeout (seconds)
    pub timeout: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            endpoint: cfg.llm.endpoint.clone(),
            model: cfg.llm.model.clone(),
            api: LlmApi::parse(&cfg.llm.api).unwrap_or(LlmApi::Ollama),
            timeout: cfg.llm.timeout,
        }
    }
}

impl LlmConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api(mut self, api: LlmApi) -> Self {
        self.api = api;
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }
}

/// Something that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt`, optionally attaching a PNG image
    async fn complete(&self, prompt: &str, image_png: Option<&[u8]>) -> LlmResult<String>;

    /// Whether the backend is reachable at all
    async fn is_healthy(&self) -> bool {
        true
    }
}

/// HTTP client for an Ollama or OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the endpoint's server is reachable.
    ///
    /// Any HTTP response (even 4xx/5xx) counts as reachable.
    pub async fn check_health(&self, timeout: Duration) -> bool {
        let probe = server_root(&self.config.endpoint);
        match self.client.get(&probe).timeout(timeout).send().await {
            Ok(response) => {
                debug!(url = %probe, status = %response.status(), "LLM endpoint reachable");
                true
            }
            Err(err) => {
                debug!(url = %probe, error = %err, "LLM endpoint unreachable");
                false
            }
        }
    }

    fn request_body(&self, prompt: &str, image_png: Option<&[u8]>) -> Value {
        let image = image_png.map(|png| base64::engine::general_purpose::STANDARD.encode(png));
        match self.config.api {
            LlmApi::Ollama => {
                let mut body = json!({
                    "model": self.config.model,
                    "prompt": prompt,
                    "stream": false,
                });
                if let Some(image) = image {
                    body["images"] = json!([image]);
                }
                body
            }
            LlmApi::OpenAi => {
                let content = match image {
                    Some(image) => json!([
                        {"type": "text", "text": prompt},
                        {"type": "image_url", "image_url": {"url": format!("data:image/png;base64,{}", image)}}
                    ]),
                    None => json!(prompt),
                };
                json!({
                    "model": self.config.model,
                    "messages": [{"role": "user", "content": content}],
                    "temperature": 0.2,
                })
            }
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn complete(&self, prompt: &str, image_png: Option<&[u8]>) -> LlmResult<String> {
        let body = self.request_body(prompt, image_png);
        debug!(endpoint = %self.config.endpoint, model = %self.config.model, "sending prompt");

        let response = self.client.post(&self.config.endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let text = response.text().await?;
        extract_answer(self.config.api, &text)
    }

    async fn is_healthy(&self) -> bool {
        self.check_health(Duration::from_secs(5)).await
    }
}

/// Pull the model's answer out of a response body.
///
/// An Ollama body that is not the expected envelope is returned verbatim so
/// the generator can still try to parse it.
fn extract_answer(api: LlmApi, body: &str) -> LlmResult<String> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    match api {
        LlmApi::Ollama => Ok(parsed
            .as_ref()
            .and_then(|v| v["response"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string())),
        LlmApi::OpenAi => parsed
            .as_ref()
            .and_then(|v| v["choices"][0]["message"]["content"].as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".to_string())),
    }
}

/// `scheme://host:port/` of an endpoint URL
fn server_root(endpoint: &str) -> String {
    let (scheme, rest) = endpoint.split_once("://").unwrap_or(("http", endpoint));
    let host = rest.split('/').next().unwrap_or(rest);
    format!("{}://{}/", scheme, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client(server: &mockito::Server, path: &str, api: LlmApi) -> LlmClient {
        LlmClient::new(
            LlmConfig::new(format!("{}{}", server.url(), path))
                .model("llama3")
                .api(api)
                .timeout(5),
        )
        .unwrap()
    }

    #[test]
    fn test_server_root() {
        assert_eq!(server_root("http://localhost:11434/api/generate"), "http://localhost:11434/");
        assert_eq!(server_root("https://llm.test/v1/chat/completions"), "https://llm.test/");
        assert_eq!(server_root("127.0.0.1:8080/v1"), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_api_parse() {
        assert_eq!(LlmApi::parse("Ollama"), Some(LlmApi::Ollama));
        assert_eq!(LlmApi::parse("openai"), Some(LlmApi::OpenAi));
        assert_eq!(LlmApi::parse("bard"), None);
    }

    #[test]
    fn test_extract_answer_ollama_falls_back_to_raw_body() {
        assert_eq!(extract_answer(LlmApi::Ollama, r#"{"response":"[]"}"#).unwrap(), "[]");
        assert_eq!(extract_answer(LlmApi::Ollama, "not json").unwrap(), "not json");
        assert!(extract_answer(LlmApi::OpenAi, r#"{"choices":[]}"#).is_err());
    }

    #[tokio::test]
    async fn test_ollama_request_and_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "llama3",
                "prompt": "hello",
                "stream": false,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"llama3","response":"[{\"id\":\"T1\"}]","done":true}"#)
            .create_async()
            .await;

        let answer = client(&server, "/api/generate", LlmApi::Ollama)
            .complete("hello", None)
            .await
            .unwrap();

        assert_eq!(answer, r#"[{"id":"T1"}]"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_openai_request_with_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::Regex("data:image/png;base64,".to_string()))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"[]"}}]}"#)
            .create_async()
            .await;

        let answer = client(&server, "/v1/chat/completions", LlmApi::OpenAi)
            .complete("hello", Some(&[0x89, b'P', b'N', b'G']))
            .await
            .unwrap();

        assert_eq!(answer, "[]");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let err = client(&server, "/api/generate", LlmApi::Ollama)
            .complete("hello", None)
            .await
            .unwrap_err();

        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model not loaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(404).create_async().await;
        let healthy = client(&server, "/api/generate", LlmApi::Ollama)
            .check_health(Duration::from_secs(2))
            .await;
        assert!(healthy);

        let unreachable = LlmClient::new(LlmConfig::new("http://127.0.0.1:9/api/generate").timeout(1)).unwrap();
        assert!(!unreachable.check_health(Duration::from_millis(500)).await);
    }
}
