//! Ingestion and retrieval over one embedder and one store.
//!
//! Documents go in as chunks with vectors attached; questions come back as
//! the nearest chunks, best first.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, InMemoryVectorStore, RecursiveChunker};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chunker(Arc::new(RecursiveChunker::new(3000, 500)))
//!     .build()?;
//!
//! pipeline.create_collection("financial_db_3f2a").await?;
//! pipeline.ingest("financial_db_3f2a", &statement).await?;
//! let passages = pipeline.query("financial_db_3f2a", "What was Q2 revenue?").await?;
//! ```

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, SearchResult};
use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};
use crate::retriever::Retriever;
use crate::retry::RetryPolicy;
use crate::vectorstore::VectorStore;

/// Chunk, embed and store documents; embed, search and filter questions.
///
/// Built with [`RagPipeline::builder()`]. Provider calls go through the
/// configured [`RetryPolicy`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    retry: RetryPolicy,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Create `name` sized for the embedder's vectors.
    ///
    /// Succeeds without changes if it already exists with the same
    /// dimensionality.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(name, dimensions).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
        })
    }

    /// Remove `name` and its chunks. Missing collections are ignored.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.vector_store.delete_collection(name).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to delete collection");
        })
    }

    /// Everything that shapes the stored vectors: embedding model,
    /// dimensionality and chunking.
    ///
    /// Collections built by pipelines with different profiles are not
    /// interchangeable.
    pub fn index_profile(&self) -> String {
        format!(
            "{}|{}|{}",
            self.embedding_provider.model_id(),
            self.embedding_provider.dimensions(),
            self.chunker.settings()
        )
    }

    /// Number of chunks stored in `collection`, or `None` if it does not exist.
    pub async fn collection_size(&self, collection: &str) -> Result<Option<usize>> {
        if !self.vector_store.collection_exists(collection).await? {
            return Ok(None);
        }
        self.vector_store.count(collection).await.map(Some)
    }

    /// Split `document`, embed every chunk and store the batch.
    ///
    /// Every chunk is embedded before anything is written, and the store
    /// accepts or rejects the batch as a whole, so a failure never leaves part
    /// of the document in the collection. Returns the stored chunks with
    /// embeddings attached; a blank document yields no chunks.
    ///
    /// # Errors
    ///
    /// Propagates [`RagError::EmbeddingError`] once retries are exhausted, and
    /// any store error unchanged.
    pub async fn ingest(&self, collection: &str, document: &Document) -> Result<Vec<Chunk>> {
        let mut chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(document.id = %document.id, collection, "nothing to ingest from blank document");
            return Ok(chunks);
        }

        let vectors = {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            self.embed_texts(&texts).await.inspect_err(|e| {
                error!(document.id = %document.id, collection, error = %e, "could not embed chunks");
            })?
        };
        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            chunk.embedding = vector;
        }

        self.vector_store.add(collection, &chunks).await.inspect_err(|e| {
            error!(document.id = %document.id, collection, error = %e, "add failed during ingestion");
        })?;

        info!(document.id = %document.id, collection, chunk_count = chunks.len(), "ingested document");

        Ok(chunks)
    }

    /// Nearest chunks to `query`, up to the configured `top_k`.
    pub async fn query(&self, collection: &str, query: &str) -> Result<Vec<SearchResult>> {
        self.query_with_top_k(collection, query, self.config.top_k).await
    }

    /// Embed `query`, search `collection` and drop results under the similarity threshold.
    ///
    /// Returns at most `top_k` results ordered by descending similarity. An
    /// empty collection yields an empty result.
    pub async fn query_with_top_k(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embed_query(query).await.inspect_err(|e| {
            error!(collection, error = %e, "could not embed query");
        })?;

        let results =
            self.vector_store.search(collection, &query_embedding, top_k).await.inspect_err(|e| {
                error!(collection, error = %e, "search failed");
            })?;

        let filtered: Vec<SearchResult> = match self.config.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };

        info!(collection, top_k, result_count = filtered.len(), "query completed");
        Ok(filtered)
    }

    /// A [`Retriever`] bound to `collection` with the configured `top_k`.
    pub fn retriever(self: &Arc<Self>, collection: impl Into<String>) -> Retriever {
        Retriever::new(Arc::clone(self), collection)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(&[query]).await?;
        vectors.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: self.embedding_provider.name().to_string(),
            message: "no vector returned for query".to_string(),
        })
    }

    async fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let provider = self.embedding_provider.as_ref();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.embedding_batch_size) {
            debug!(provider = provider.name(), batch_size = batch.len(), "embedding batch");
            let embedded = self
                .retry
                .run("embed_batch", RagError::is_retryable, move || provider.embed_batch(batch))
                .await?;
            check_batch(provider, batch.len(), &embedded)?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

/// Builder for [`RagPipeline`].
///
/// The embedding provider and vector store are required. Without an explicit
/// chunker a [`RecursiveChunker`] sized from the config is used; without an
/// explicit retry policy [`RetryPolicy::default`] applies.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
///     .vector_store(Arc::new(FileVectorStore::open("chroma_db").await?))
///     .retry_policy(RetryPolicy::single_retry(Duration::from_secs(1)))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    retry: Option<RetryPolicy>,
}

impl RagPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Replace the default [`RecursiveChunker`].
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the retry policy for embedding calls.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// config is inconsistent.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            retry: self.retry.unwrap_or_default(),
        })
    }
}
