//! Query-time retrieval bound to one collection.

use std::sync::Arc;

use crate::document::SearchResult;
use crate::error::Result;
use crate::pipeline::RagPipeline;

/// Top-k nearest-neighbor lookup over a single collection.
///
/// A `Retriever` is cheap to clone and is what the answer side of a session
/// holds on to: the collection name is fixed when it is created, so questions
/// can never reach another document's chunks.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = pipeline.retriever("financial_db").with_top_k(5);
/// let results = retriever.retrieve("What was Q2 revenue?").await?;
/// ```
#[derive(Clone)]
pub struct Retriever {
    pipeline: Arc<RagPipeline>,
    collection: String,
    top_k: usize,
}

impl Retriever {
    /// Create a retriever using the pipeline's configured `top_k`.
    pub fn new(pipeline: Arc<RagPipeline>, collection: impl Into<String>) -> Self {
        let top_k = pipeline.config().top_k;
        Self { pipeline, collection: collection.into(), top_k }
    }

    /// Override how many results each lookup returns.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// The collection this retriever reads from.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// How many results each lookup returns at most.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Return up to `top_k` chunks most similar to `query`, best first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.pipeline.query_with_top_k(&self.collection, query, self.top_k).await
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("collection", &self.collection)
            .field("top_k", &self.top_k)
            .finish()
    }
}
