//! The text-extraction interface and the local plain-text extractor.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::upload::Upload;

/// Turns an uploaded file into text (markdown where the backend supports it).
///
/// Extractors do not judge whether the text is useful; callers reject blank
/// output with [`ExtractionError::Empty`].
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Extract the full text of `upload`.
    async fn extract_text(&self, upload: &Upload) -> Result<String>;
}

/// Reads UTF-8 text and markdown files as-is.
///
/// PDFs are rejected with [`ExtractionError::UnsupportedFormat`]; they need a
/// parsing backend such as LlamaParse.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text"
    }

    async fn extract_text(&self, upload: &Upload) -> Result<String> {
        if upload.is_pdf() {
            return Err(ExtractionError::UnsupportedFormat {
                file_name: upload.file_name.clone(),
                reason: "PDF files need a parsing backend".into(),
            });
        }
        let text = std::str::from_utf8(&upload.bytes).map_err(|e| ExtractionError::UnsupportedFormat {
            file_name: upload.file_name.clone(),
            reason: format!("not UTF-8 text ({e})"),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        debug!(file = %upload.file_name, chars = text.chars().count(), "read plain text");
        Ok(text.to_string())
    }
}
