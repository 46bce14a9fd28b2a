//! The text-generation interface shared by every backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sampling settings for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature; 0 is near-deterministic.
    pub temperature: f32,
    /// Upper bound on generated tokens. `None` leaves it to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.5, max_output_tokens: None }
    }
}

/// A fully rendered prompt plus sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The prompt, sent as a single user message.
    pub prompt: String,
    /// Sampling settings.
    pub config: GenerationConfig,
}

impl GenerationRequest {
    /// Create a request with default sampling settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), config: GenerationConfig::default() }
    }

    /// Replace the sampling settings.
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }
}

/// Token accounting reported by the backend, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Generated text and the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// A text-generation model.
///
/// Implementations turn one prompt into one completion. They do not retry;
/// callers decide retry behaviour using [`ModelError::is_retryable`](crate::ModelError::is_retryable).
#[async_trait]
pub trait Llm: Send + Sync {
    /// The model identifier, used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for `request`.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;
}
