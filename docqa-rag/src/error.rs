//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur in chunking, embedding, storage and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    ///
    /// Embedding failures are provider-side and treated as transient.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding backend refused the request outright.
    ///
    /// Raised for client errors such as a bad key, an unknown model or a
    /// malformed request. Retrying cannot help.
    #[error("Embedding request rejected ({provider}, HTTP {status}): {message}")]
    EmbeddingRejected {
        /// The embedding provider that refused the request.
        provider: String,
        /// The HTTP status returned by the backend.
        status: u16,
        /// The backend's explanation.
        message: String,
    },

    /// A chunk id already exists in the collection with different text.
    ///
    /// Ids are generated per chunk, so this signals a defect in the caller.
    #[error("Duplicate id '{id}' in collection '{collection}'")]
    DuplicateId {
        /// The collection that rejected the write.
        collection: String,
        /// The conflicting chunk id.
        id: String,
    },

    /// A vector does not match the collection's dimensionality.
    #[error("Dimension mismatch in collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The collection the vector was destined for.
        collection: String,
        /// The collection's dimensionality.
        expected: usize,
        /// The offending vector's length.
        actual: usize,
    },

    /// The named collection does not exist.
    #[error("Collection '{0}' does not exist")]
    CollectionNotFound(String),

    /// The collection name is not usable as a storage key.
    #[error("Invalid collection name '{0}': expected 1-63 characters of [A-Za-z0-9_-]")]
    InvalidCollectionName(String),

    /// A persisted collection was written with an unsupported schema.
    #[error("Unsupported schema version {found} for collection '{collection}' (supported: {supported})")]
    SchemaVersion {
        /// The collection being opened.
        collection: String,
        /// The version tag found on disk.
        found: u32,
        /// The version this build reads and writes.
        supported: u32,
    },

    /// A collection file exists on disk but could not be loaded.
    ///
    /// The file is kept until the collection is explicitly deleted.
    #[error("Collection '{0}' exists on disk but could not be read; delete it to rebuild")]
    UnreadableCollection(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Filesystem failure in a persistent store.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A persisted collection could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingError { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
