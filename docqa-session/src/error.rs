//! Error types for the `docqa-session` crate.

use docqa_extract::ExtractionError;
use docqa_model::ModelError;
use docqa_rag::RagError;
use thiserror::Error;

/// Errors surfaced by a [`DocumentSession`](crate::DocumentSession).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The upload could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Chunking, embedding, storage or retrieval failed.
    #[error(transparent)]
    Rag(#[from] RagError),

    /// The language model failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A prompt template could not be loaded or parsed.
    #[error("Invalid prompt template '{template}': {message}")]
    Template {
        /// Where the template came from.
        template: String,
        /// What is wrong with it.
        message: String,
    },

    /// A question was asked before any document finished loading.
    #[error("No document is loaded")]
    NotReady,

    /// The session has been closed.
    #[error("Session is closed")]
    Closed,

    /// The question was empty.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// Invalid session settings.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Extraction(e) => e.is_retryable(),
            Self::Rag(e) => e.is_retryable(),
            Self::Model(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// A short explanation suitable for showing to the person asking.
    pub fn user_message(&self) -> String {
        match self {
            Self::Extraction(ExtractionError::Empty(file)) => format!(
                "No text could be extracted from {file}. It may be a scanned image without a text layer."
            ),
            Self::Extraction(ExtractionError::UnsupportedFormat { file_name, reason }) => {
                format!("{file_name} cannot be processed: {reason}.")
            }
            Self::Extraction(ExtractionError::Config(message)) => format!("Document parsing is not configured: {message}."),
            Self::Extraction(ExtractionError::Rejected { status, message, .. }) => format!(
                "The document parser refused the request (HTTP {status}): {message}. Check its API key and settings."
            ),
            Self::Extraction(_) => "The document could not be processed. Please try uploading it again.".into(),
            Self::Rag(RagError::EmbeddingError { .. }) => {
                "The embedding service is unavailable right now. Please try again in a moment.".into()
            }
            Self::Rag(RagError::EmbeddingRejected { status, message, .. }) => format!(
                "The embedding service refused the request (HTTP {status}): {message}. Check the embedding model and API key."
            ),
            Self::Rag(_) => "The document index could not be accessed. Please try again.".into(),
            Self::Model(ModelError::Config(message)) => format!("The language model is not configured: {message}."),
            Self::Model(ModelError::Rejected { .. }) => {
                "The language model rejected the request. Try a shorter or simpler question.".into()
            }
            Self::Model(_) => "The language model is unavailable right now. Please try again in a moment.".into(),
            Self::Template { .. } | Self::Config(_) => self.to_string(),
            Self::NotReady => "Please upload a document first.".into(),
            Self::Closed => "This session has ended. Start a new one to continue.".into(),
            Self::EmptyQuestion => "Please type a question.".into(),
        }
    }
}

/// Convenience alias for results from this crate.
pub type Result<T> = std::result::Result<T, SessionError>;
