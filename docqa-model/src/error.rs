//! Error types for the `docqa-model` crate.

use thiserror::Error;

/// Errors returned by text-generation backends.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The call failed in a way that may succeed on retry: transport errors,
    /// timeouts, rate limiting and server-side failures.
    #[error("Generation failed ({model}): {message}")]
    Generation {
        /// The model that was called.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend refused the request; retrying the same request will not help.
    #[error("Request rejected by {model} ({status}): {message}")]
    Rejected {
        /// The model that was called.
        model: String,
        /// HTTP status returned by the backend.
        status: u16,
        /// The backend's explanation.
        message: String,
    },

    /// The backend answered without any generated text.
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Missing credentials or an invalid setting.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Whether retrying the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }
}

/// Convenience alias for results from this crate.
pub type Result<T> = std::result::Result<T, ModelError>;
