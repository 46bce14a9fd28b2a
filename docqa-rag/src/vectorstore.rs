//! Vector store trait for storing and searching vector embeddings.

use std::cmp::Ordering;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s. Collections are
/// additive: [`add`](VectorStore::add) never overwrites a chunk whose id is
/// already present with different text.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// store.add("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection.
    ///
    /// No-op if it already exists with the same dimensionality.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data. No-op if absent.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Names of all collections, sorted.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Append chunks to a collection. Chunks must have embeddings set.
    ///
    /// Re-adding a chunk with the same id and text is a no-op. The whole
    /// batch is rejected, leaving the collection unchanged, if any chunk
    /// conflicts with a stored id or has the wrong dimensionality.
    async fn add(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Number of chunks stored in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending cosine similarity; equal scores
    /// keep insertion order.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}

/// Chunks of one collection in insertion order, shared by the store backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct CollectionData {
    pub dimensions: usize,
    pub chunks: IndexMap<String, Chunk>,
}

impl CollectionData {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, chunks: IndexMap::new() }
    }

    /// Validate a batch against the stored chunks and itself. Returns the
    /// chunks that are not already present.
    pub fn plan_add<'c>(&self, collection: &str, chunks: &'c [Chunk]) -> Result<Vec<&'c Chunk>> {
        let mut pending: IndexMap<&str, &Chunk> = IndexMap::new();
        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(RagError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: self.dimensions,
                    actual: chunk.embedding.len(),
                });
            }
            let existing =
                self.chunks.get(&chunk.id).or_else(|| pending.get(chunk.id.as_str()).copied());
            match existing {
                Some(stored) if stored.text == chunk.text => {}
                Some(_) => {
                    return Err(RagError::DuplicateId {
                        collection: collection.to_string(),
                        id: chunk.id.clone(),
                    });
                }
                None => {
                    pending.insert(chunk.id.as_str(), chunk);
                }
            }
        }
        Ok(pending.into_values().collect())
    }

    pub fn insert_all(&mut self, chunks: Vec<&Chunk>) {
        for chunk in chunks {
            self.chunks.insert(chunk.id.clone(), chunk.clone());
        }
    }

    pub fn remove_all(&mut self, ids: &[&str]) -> usize {
        ids.iter().filter(|id| self.chunks.shift_remove(**id).is_some()).count()
    }

    pub fn search(&self, embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        if top_k == 0 {
            return Vec::new();
        }
        let mut scored: Vec<SearchResult> = self
            .chunks
            .values()
            .map(|chunk| SearchResult {
                chunk: chunk.clone(),
                score: cosine_similarity(&chunk.embedding, embedding),
            })
            .collect();

        // `sort_by` is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Check that a collection name is usable as a storage key.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let valid = (1..=63).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid { Ok(()) } else { Err(RagError::InvalidCollectionName(name.to_string())) }
}
