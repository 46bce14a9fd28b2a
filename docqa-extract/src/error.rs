//! Error types for the `docqa-extract` crate.

use std::time::Duration;

use thiserror::Error;

/// Why an uploaded file could not be turned into text.
///
/// Every variant is fatal for the upload it concerns.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The extractor does not handle this kind of file.
    #[error("Unsupported file '{file_name}': {reason}")]
    UnsupportedFormat {
        /// The uploaded file's name.
        file_name: String,
        /// What was expected instead.
        reason: String,
    },

    /// Extraction succeeded but produced no usable text.
    #[error("No text could be extracted from '{0}'")]
    Empty(String),

    /// The parsing service failed or could not be reached.
    #[error("Extraction backend error ({backend}): {message}")]
    Backend {
        /// The service that failed.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The parsing service refused the request, for example a bad API key.
    #[error("Extraction request rejected ({backend}, HTTP {status}): {message}")]
    Rejected {
        /// The service that refused.
        backend: String,
        /// The HTTP status returned.
        status: u16,
        /// The service's explanation.
        message: String,
    },

    /// The parsing service reported that the job failed.
    #[error("Parsing job {job_id} ended with status {status}")]
    JobFailed {
        /// Service-side job identifier.
        job_id: String,
        /// The terminal status reported.
        status: String,
    },

    /// The parsing job did not finish in time.
    #[error("Parsing job {job_id} did not finish within {waited:?}")]
    Timeout {
        /// Service-side job identifier.
        job_id: String,
        /// How long we waited.
        waited: Duration,
    },

    /// Missing credentials or an invalid setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Whether submitting the same upload again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Timeout { .. })
    }
}

/// Convenience alias for results from this crate.
pub type Result<T> = std::result::Result<T, ExtractionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_terminal() {
        let rejected =
            ExtractionError::Rejected { backend: "LlamaParse".into(), status: 401, message: "bad key".into() };
        assert!(!rejected.is_retryable());
        assert!(ExtractionError::Backend { backend: "LlamaParse".into(), message: "502".into() }.is_retryable());
    }
}
