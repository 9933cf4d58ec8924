//! Minimal client for the LLM HTTP API the orchestrator graph talks to.
//!
//! The API itself is an external collaborator (spec §1, "Out of scope: The
//! LLM HTTP API — supplies: one-shot text completion") — this module only
//! defines the narrow interface [`LlmClient`] the `orchestrator run` command
//! needs and one concrete implementation against an OpenAI-compatible
//! chat-completions endpoint, grounded in the teacher's own `loom` crate
//! dependency choice of `reqwest` (json feature) for its LLM calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use config::{as_float_env, as_int_env};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("llm client not configured: {0}")]
    NotConfigured(String),
    #[error("llm request failed: {0}")]
    Request(String),
    #[error("llm response malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Settings read once at startup from `llm_api_key` / `llm_base_url` /
/// `llm_model` / `llm_temperature` / `llm_timeout_sec` / `llm_retries`
/// (spec §6 configuration keys), via their `LLM_*` environment names.
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    retries: i64,
}

impl HttpLlmClient {
    /// Builds a client from the process environment. Returns
    /// `LlmError::NotConfigured` when no API key is set, so callers can
    /// surface a clean config error rather than a runtime request failure.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            return Err(LlmError::NotConfigured("LLM_API_KEY is not set".to_string()));
        }
        let base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let temperature = as_float_env("LLM_TEMPERATURE", 0.2, 0.0, 2.0);
        let timeout_sec = as_int_env("LLM_TIMEOUT_SEC", 60, 1, 600);
        let retries = as_int_env("LLM_RETRIES", 2, 0, 10);

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_sec as u64))
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        Ok(Self { http, base_url, api_key, model, temperature, retries })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });

        let mut attempt = 0;
        loop {
            let result = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let value: serde_json::Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::Malformed(e.to_string()))?;
                    return value
                        .get("choices")
                        .and_then(|c| c.get(0))
                        .and_then(|c| c.get("message"))
                        .and_then(|m| m.get("content"))
                        .and_then(|c| c.as_str())
                        .map(str::to_string)
                        .ok_or_else(|| LlmError::Malformed("missing choices[0].message.content".to_string()));
                }
                Ok(resp) => {
                    let status = resp.status();
                    if attempt >= self.retries {
                        return Err(LlmError::Request(format!("http {status}")));
                    }
                }
                Err(e) => {
                    if attempt >= self.retries {
                        return Err(LlmError::Request(e.to_string()));
                    }
                }
            }
            attempt += 1;
        }
    }
}
