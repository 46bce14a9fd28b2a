//! # docqa-rag
//!
//! Chunking, embedding, vector storage and retrieval for document question
//! answering.
//!
//! ## Overview
//!
//! - [`RecursiveChunker`] - splits text on paragraph, line, word and
//!   character boundaries into overlapping chunks
//! - [`EmbeddingProvider`] - turns text into vectors
//! - [`VectorStore`] - named collections searched by cosine similarity
//!   ([`InMemoryVectorStore`], [`FileVectorStore`])
//! - [`RagPipeline`] - chunk → embed → store, and embed → search
//! - [`Retriever`] - top-k lookup bound to one collection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{Document, FileVectorStore, HashEmbeddingProvider, RagConfig, RagPipeline};
//!
//! let pipeline = Arc::new(
//!     RagPipeline::builder()
//!         .config(RagConfig::default())
//!         .embedding_provider(Arc::new(HashEmbeddingProvider::new(384)))
//!         .vector_store(Arc::new(FileVectorStore::open("chroma_db").await?))
//!         .build()?,
//! );
//!
//! pipeline.create_collection("financial_db").await?;
//! pipeline.ingest("financial_db", &Document::new("report", markdown)).await?;
//! let passages = pipeline.retriever("financial_db").retrieve("Q2 revenue?").await?;
//! ```
//!
//! ## Features
//!
//! - `openai` - [`OpenAIEmbeddingProvider`] for OpenAI-compatible embedding servers

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filestore;
pub mod hashing;
pub mod inmemory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;
pub mod retry;
pub mod vectorstore;

pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveChunker, TextSplit};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use filestore::{FileVectorStore, SCHEMA_VERSION};
pub use hashing::HashEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use retry::RetryPolicy;
pub use vectorstore::{VectorStore, cosine_similarity, validate_collection_name};
