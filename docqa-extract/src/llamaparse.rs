//! LlamaParse client: PDF in, markdown out.
//!
//! LlamaParse is asynchronous. A file is uploaded to create a job, the job
//! is polled until it reaches a terminal status, and the markdown result is
//! then downloaded.
//!
//! This module is only available when the `llamaparse` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_extract::{LlamaParseConfig, LlamaParseExtractor, TextExtractor, Upload};
//!
//! let extractor = LlamaParseExtractor::new(LlamaParseConfig::from_env()?)?;
//! let markdown = extractor.extract_text(&Upload::from_path("q2.pdf").await?).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::error::{ExtractionError, Result};
use crate::extractor::TextExtractor;
use crate::upload::Upload;

const BACKEND: &str = "LlamaParse";

/// LlamaParse API root.
pub const LLAMA_CLOUD_API_BASE: &str = "https://api.cloud.llamaindex.ai";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "LLAMA_CLOUD_API_KEY";

/// Instruction sent with every upload unless overridden.
pub const DEFAULT_INSTRUCTION: &str =
    "The provided document contains Condensed Consolidated Financial Statements";

/// Settings for [`LlamaParseExtractor`].
#[derive(Debug, Clone)]
pub struct LlamaParseConfig {
    pub api_key: String,
    pub base_url: String,
    /// Formatting hint passed to the parser. `None` sends no instruction.
    pub instruction: Option<String>,
    /// Delay between status checks.
    pub poll_interval: Duration,
    /// Give up on a job after this long.
    pub max_wait: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl LlamaParseConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: LLAMA_CLOUD_API_BASE.to_string(),
            instruction: Some(DEFAULT_INSTRUCTION.to_string()),
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Config using the key in `LLAMA_CLOUD_API_KEY`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(ExtractionError::Config(format!("{API_KEY_ENV} environment variable not set"))),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.instruction = instruction;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

/// A [`TextExtractor`] backed by the LlamaParse service.
pub struct LlamaParseExtractor {
    client: reqwest::Client,
    config: LlamaParseConfig,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: JobStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum JobStatus {
    Pending,
    Success,
    PartialSuccess,
    Error,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MarkdownResponse {
    markdown: String,
}

fn backend_error(message: String) -> ExtractionError {
    ExtractionError::Backend { backend: BACKEND.into(), message }
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn status_error(status: reqwest::StatusCode, body: String) -> ExtractionError {
    if is_transient(status) {
        backend_error(format!("API returned {status}: {body}"))
    } else {
        ExtractionError::Rejected { backend: BACKEND.into(), status: status.as_u16(), message: body }
    }
}

impl LlamaParseExtractor {
    /// Create an extractor.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Config`] for an empty API key or if the HTTP
    /// client cannot be built.
    pub fn new(config: LlamaParseConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ExtractionError::Config("LlamaParse API key must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExtractionError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/parsing{path}", self.config.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| backend_error(format!("request failed: {e}")))?;
        decode(response).await
    }

    async fn submit(&self, upload: &Upload) -> Result<String> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str("application/pdf")
            .map_err(|e| backend_error(format!("invalid upload: {e}")))?;
        let mut form = Form::new().part("file", part);
        if let Some(instruction) = &self.config.instruction {
            form = form.text("complemental_formatting_instruction", instruction.clone());
        }

        let response = self
            .client
            .post(self.url("/upload"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| backend_error(format!("upload failed: {e}")))?;
        let job: JobResponse = decode(response).await?;
        Ok(job.id)
    }

    /// Poll the job until it reaches a terminal status or `max_wait` passes.
    async fn wait_for(&self, job_id: &str) -> Result<()> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            if start.elapsed() >= self.config.max_wait {
                return Err(ExtractionError::Timeout {
                    job_id: job_id.to_string(),
                    waited: start.elapsed(),
                });
            }

            tokio::time::sleep(self.config.poll_interval).await;
            attempts += 1;

            let status: StatusResponse = self.get_json(self.url(&format!("/job/{job_id}"))).await?;
            debug!(job_id, attempt = attempts, status = ?status.status, "polled parsing job");

            match status.status {
                JobStatus::Success | JobStatus::PartialSuccess => return Ok(()),
                JobStatus::Pending | JobStatus::Unknown => continue,
                JobStatus::Error | JobStatus::Canceled => {
                    return Err(ExtractionError::JobFailed {
                        job_id: job_id.to_string(),
                        status: format!("{:?}", status.status).to_uppercase(),
                    });
                }
            }
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(backend = BACKEND, %status, "API error");
        return Err(status_error(status, body));
    }
    response.json().await.map_err(|e| backend_error(format!("failed to parse response: {e}")))
}

#[async_trait]
impl TextExtractor for LlamaParseExtractor {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn extract_text(&self, upload: &Upload) -> Result<String> {
        if !upload.is_pdf() {
            return Err(ExtractionError::UnsupportedFormat {
                file_name: upload.file_name.clone(),
                reason: "expected a PDF document".into(),
            });
        }

        let job_id = self.submit(upload).await?;
        info!(file = %upload.file_name, job_id, bytes = upload.len(), "submitted parsing job");

        self.wait_for(&job_id).await?;

        let result: MarkdownResponse =
            self.get_json(self.url(&format!("/job/{job_id}/result/markdown"))).await?;
        info!(job_id, chars = result.markdown.chars().count(), "parsing job finished");
        Ok(result.markdown)
    }
}
