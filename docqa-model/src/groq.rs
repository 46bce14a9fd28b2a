//! Groq chat-completions client.
//!
//! Groq serves open-weight models (Llama 3.1 and others) behind an
//! OpenAI-compatible `/chat/completions` endpoint. This client sends the
//! rendered prompt as one user message and returns the first choice.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_model::groq::{GroqClient, GroqConfig};
//!
//! let llm = GroqClient::new(GroqConfig::from_env()?)?;
//! let response = llm.generate(GenerationRequest::new("Hello")).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::llm::{GenerationRequest, GenerationResponse, Llm, TokenUsage};

/// Groq's OpenAI-compatible API root.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Settings for [`GroqClient`].
#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GroqConfig {
    /// Config for `model` with the given key and default endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GROQ_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Config for [`DEFAULT_MODEL`] using the key in `GROQ_API_KEY`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key, DEFAULT_MODEL)),
            _ => Err(ModelError::Config(format!("{API_KEY_ENV} environment variable not set"))),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A [`Llm`] backed by the Groq API.
pub struct GroqClient {
    client: reqwest::Client,
    config: GroqConfig,
}

impl GroqClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] for an empty API key or if the HTTP
    /// client cannot be built.
    pub fn new(config: GroqConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::Config("Groq API key must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn generation_error(&self, message: String) -> ModelError {
        ModelError::Generation { model: self.config.model.clone(), message }
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Rate limiting and server errors are transient; other client errors are not.
fn is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn first_text(response: ChatResponse) -> Option<(String, Option<TokenUsage>)> {
    let usage = response.usage.map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
    });
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .map(|text| (text, usage))
}

#[async_trait]
impl Llm for GroqClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let model = self.config.model.as_str();
        debug!(model, prompt_len = request.prompt.len(), "sending chat completion");

        let body = ChatRequest {
            model,
            messages: [ChatMessage { role: "user", content: &request.prompt }],
            temperature: request.config.temperature,
            max_tokens: request.config.max_output_tokens,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model, error = %e, "request failed");
                let kind = if e.is_timeout() { "request timed out" } else { "request failed" };
                self.generation_error(format!("{kind}: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message =
                serde_json::from_str::<ErrorResponse>(&text).map(|e| e.error.message).unwrap_or(text);
            error!(model, %status, "API error");
            return Err(if is_transient(status) {
                self.generation_error(format!("API returned {status}: {message}"))
            } else {
                ModelError::Rejected { model: model.to_string(), status: status.as_u16(), message }
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(model, error = %e, "failed to parse response");
            self.generation_error(format!("failed to parse response: {e}"))
        })?;

        let (text, usage) = first_text(parsed).ok_or_else(|| ModelError::EmptyResponse(model.to_string()))?;
        debug!(model, answer_len = text.len(), "chat completion received");
        Ok(GenerationResponse { text, model: model.to_string(), usage })
    }
}
