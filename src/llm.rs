//! Blocking language-model client used for entity extraction.
//!
//! Two wire protocols are supported:
//! - Ollama `/api/generate`
//! - OpenAI-compatible `/chat/completions` (Groq, vLLM, llama.cpp server, ...)
//!
//! The pipeline only depends on the [`CompletionModel`] trait, so tests and
//! embedders can swap in their own completion source.

use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the LLM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("language model is not reachable at {url}")]
    #[diagnostic(
        code(medkg::llm::unavailable),
        help(
            "Start the model server (e.g. `ollama serve`) or point `llm.base_url` / \
             MEDKG_LLM_URL at a reachable endpoint."
        )
    )]
    Unavailable { url: String },

    #[error("LLM request failed: {message}")]
    #[diagnostic(
        code(medkg::llm::request_failed),
        help("Check that the model is pulled and the API key, if any, is valid.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse LLM response: {message}")]
    #[diagnostic(
        code(medkg::llm::parse_error),
        help("The server returned an unexpected response format for the configured backend.")
    )]
    ParseError { message: String },

    #[error("LLM request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(medkg::llm::timeout),
        help("Increase `llm.timeout_secs` or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

/// Wire protocol spoken by the model server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    Ollama,
    OpenAi,
}

/// Connection settings for the model server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    /// Base URL. For OpenAI-compatible servers this includes the `/v1` prefix.
    pub base_url: String,
    pub model: String,
    /// Bearer token, sent only when set.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Ollama,
            base_url: "http://localhost:11434".into(),
            model: "llama3.1".into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// A source of single-turn text completions.
pub trait CompletionModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// HTTP client for the configured backend.
pub struct LlmClient {
    config: LlmConfig,
    agent: ureq::Agent,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.backend {
            LlmBackend::Ollama => format!("{base}/api/generate"),
            LlmBackend::OpenAi => format!("{base}/chat/completions"),
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        match self.config.backend {
            LlmBackend::Ollama => serde_json::json!({
                "model": self.config.model,
                "prompt": prompt,
                "stream": false,
            }),
            LlmBackend::OpenAi => serde_json::json!({
                "model": self.config.model,
                "messages": [{ "role": "user", "content": prompt }],
            }),
        }
    }

    fn map_transport(&self, err: ureq::Error) -> LlmError {
        match err {
            ureq::Error::Status(code, resp) => LlmError::RequestFailed {
                message: format!(
                    "server returned status {code}: {}",
                    resp.into_string().unwrap_or_default()
                ),
            },
            ureq::Error::Transport(t) => match t.kind() {
                ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
                    LlmError::Unavailable {
                        url: self.config.base_url.clone(),
                    }
                }
                _ if t.to_string().contains("timed out") => LlmError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                },
                _ => LlmError::RequestFailed {
                    message: t.to_string(),
                },
            },
        }
    }
}

/// Pull the completion text out of a backend response body.
fn completion_text(backend: LlmBackend, json: &serde_json::Value) -> Result<String, LlmError> {
    let text = match backend {
        LlmBackend::Ollama => json["response"].as_str(),
        LlmBackend::OpenAi => json["choices"][0]["message"]["content"].as_str(),
    };
    text.map(str::to_string).ok_or_else(|| LlmError::ParseError {
        message: match backend {
            LlmBackend::Ollama => "missing 'response' field".into(),
            LlmBackend::OpenAi => "missing 'choices[0].message.content' field".into(),
        },
    })
}

impl CompletionModel for LlmClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = self.endpoint();
        let body = self.request_body(prompt);

        let mut req = self.agent.post(&url).set("Content-Type", "application/json");
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.set("Authorization", &format!("Bearer {key}"));
        }

        tracing::debug!(url = %url, model = %self.config.model, "sending completion request");
        let resp = req.send_json(body).map_err(|e| self.map_transport(e))?;

        let json: serde_json::Value = resp.into_json().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;
        completion_text(self.config.backend, &json)
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("backend", &self.config.backend)
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}
