//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. Providers must be deterministic for a fixed model and input,
/// return one vector per input in input order, and always produce vectors of
/// [`dimensions`](EmbeddingProvider::dimensions) length.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "embedding"
    }

    /// Identifies the vector space this provider embeds into.
    ///
    /// Vectors from providers with different ids must never share a
    /// collection. Providers serving several models should include the model.
    fn model_id(&self) -> String {
        self.name().to_string()
    }
}

/// Check that a provider honoured its contract for a batch of `expected` inputs.
pub(crate) fn check_batch(
    provider: &dyn EmbeddingProvider,
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<()> {
    if vectors.len() != expected {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("expected {expected} vectors, got {}", vectors.len()),
        });
    }
    let dimensions = provider.dimensions();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("expected {dimensions}-dimensional vectors, got {}", bad.len()),
        });
    }
    if let Some(index) = vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("vector {index} contains non-finite values"),
        });
    }
    Ok(())
}
