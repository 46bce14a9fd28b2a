//! Embedding provider for OpenAI-compatible `/embeddings` endpoints.
//!
//! Besides OpenAI itself, the same wire format is served by
//! text-embeddings-inference, Ollama, vLLM and most hosted gateways, which is
//! how sentence-transformer models such as `all-MiniLM-L6-v2` are reached.
//!
//! This module is only available when the `openai` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "OpenAI";

/// Default endpoint: a local text-embeddings-inference server.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/v1";

/// Default model, a 384-dimensional sentence-transformer.
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Dimensionality of [`DEFAULT_MODEL`].
pub const DEFAULT_DIMENSIONS: usize = 384;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An [`EmbeddingProvider`] that calls an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `base_url` – defaults to [`DEFAULT_BASE_URL`]; `/embeddings` is appended.
/// - `model` – defaults to [`DEFAULT_MODEL`].
/// - `dimensions` – defaults to [`DEFAULT_DIMENSIONS`]. Set it to whatever the
///   model produces; responses of another size are rejected by the pipeline.
/// - `api_key` – optional bearer token, from the constructor or `OPENAI_API_KEY`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new()?
///     .with_base_url("http://localhost:8080/v1");
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for the default local endpoint without credentials.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a provider whose HTTP requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            RagError::ConfigError(format!("failed to build embedding HTTP client: {e}"))
        })?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a provider that authenticates with `OPENAI_API_KEY` when it is set.
    pub fn from_env() -> Result<Self> {
        let provider = Self::new()?;
        Ok(match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => provider.with_api_key(key),
            _ => provider,
        })
    }

    /// Send `key` as a bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Point the provider at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Declare the dimensionality the model produces.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// Ask the server to truncate embeddings to `dims` (Matryoshka models only).
    ///
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_requested_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// The model name sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message }
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Map a non-success response to a retryable or a terminal error.
fn status_error(status: reqwest::StatusCode, detail: String) -> RagError {
    if is_transient(status) {
        embedding_error(format!("API returned {status}: {detail}"))
    } else {
        RagError::EmbeddingRejected {
            provider: PROVIDER.into(),
            status: status.as_u16(),
            message: detail,
        }
    }
}

/// Restore input order; servers may return `data` in any order when they
/// report an `index`.
fn into_ordered(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        let mut request = self.client.post(self.endpoint()).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            let kind = if e.is_timeout() { "request timed out" } else { "request failed" };
            embedding_error(format!("{kind}: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(status_error(status, detail));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            embedding_error(format!("failed to parse response: {e}"))
        })?;

        Ok(into_ordered(embedding_response.data))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model_id(&self) -> String {
        format!("{PROVIDER}/{}", self.model)
    }
}
