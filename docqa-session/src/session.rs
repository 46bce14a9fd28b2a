//! One document, many questions.
//!
//! A [`DocumentSession`] moves through
//! `Uninitialized → Ingesting → Ready → Closed`. Ingestion happens once per
//! distinct upload: the bytes are fingerprinted, and loading the same bytes
//! again is a no-op. Loading a different document builds a new collection
//! next to the current one and only switches over once it is complete, so a
//! failed upload never disturbs the document already being discussed.
//!
//! Collection names are derived from the document bytes together with the
//! pipeline's [`index_profile`](RagPipeline::index_profile), so a persisted
//! collection is only reused by a pipeline that would have built the same
//! vectors. Sessions sharing a store and a document share its collection; it
//! is deleted only when the last of them lets go.

use std::sync::Arc;

use docqa_extract::{ExtractionError, TextExtractor, Upload};
use docqa_rag::{Document, RagError, RagPipeline, Retriever, SearchResult, VectorStore};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::history::Turn;
use crate::leases::Lease;
use crate::synthesizer::AnswerSynthesizer;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No document has been loaded yet.
    Uninitialized,
    /// A document is being extracted, chunked and embedded.
    Ingesting { file_name: String },
    /// Questions are answered from this document.
    Ready { file_name: String, chunks: usize },
    /// The session has ended.
    Closed,
}

/// What [`DocumentSession::load_document`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The document was extracted, chunked and embedded.
    Ingested { chunks: usize },
    /// A persisted collection for the same bytes was reused.
    Reattached { chunks: usize },
    /// The same bytes are already loaded.
    Unchanged,
}

/// An answer and the passages it was generated from, best first.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
}

struct LoadedDocument {
    fingerprint: String,
    file_name: String,
    collection: String,
    chunks: usize,
    retriever: Retriever,
    lease: Lease,
}

/// A question-answering session over one uploaded document at a time.
///
/// # Example
///
/// ```rust,ignore
/// let mut session = DocumentSession::builder()
///     .pipeline(pipeline)
///     .extractor(Arc::new(LlamaParseExtractor::new(LlamaParseConfig::from_env()?)?))
///     .synthesizer(AnswerSynthesizer::new(llm, PromptTemplate::financial_analyst()?))
///     .build()?;
///
/// session.load_document(Upload::from_path("q2.pdf").await?).await?;
/// let answer = session.ask("What was Q2 revenue?").await?;
/// ```
pub struct DocumentSession {
    config: SessionConfig,
    pipeline: Arc<RagPipeline>,
    extractor: Arc<dyn TextExtractor>,
    synthesizer: AnswerSynthesizer,
    current: Option<LoadedDocument>,
    closed: bool,
    history: Vec<Turn>,
    phase: watch::Sender<SessionPhase>,
}

impl DocumentSession {
    pub fn builder() -> DocumentSessionBuilder {
        DocumentSessionBuilder::default()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase.borrow().clone()
    }

    /// Observe phase changes, e.g. to show a progress indicator.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Conversation so far, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Collection backing the loaded document.
    pub fn collection(&self) -> Option<&str> {
        self.current.as_ref().map(|d| d.collection.as_str())
    }

    /// Name of the loaded document.
    pub fn document_name(&self) -> Option<&str> {
        self.current.as_ref().map(|d| d.file_name.as_str())
    }

    fn ready_phase(&self) -> SessionPhase {
        match &self.current {
            Some(doc) => SessionPhase::Ready { file_name: doc.file_name.clone(), chunks: doc.chunks },
            None => SessionPhase::Uninitialized,
        }
    }

    /// Make `upload` the document questions are answered from.
    ///
    /// # Errors
    ///
    /// Extraction, embedding and storage failures are returned after the
    /// session has been restored to its previous phase; a partially built
    /// collection is removed.
    pub async fn load_document(&mut self, upload: Upload) -> Result<LoadOutcome> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        let fingerprint = fingerprint(&upload.bytes);
        if self.current.as_ref().is_some_and(|doc| doc.fingerprint == fingerprint) {
            info!(file = %upload.file_name, "document already loaded");
            return Ok(LoadOutcome::Unchanged);
        }

        let collection =
            self.config.collection_for(&index_key(&upload.bytes, &self.pipeline.index_profile()));
        self.phase.send_replace(SessionPhase::Ingesting { file_name: upload.file_name.clone() });

        let lease = Lease::acquire(self.pipeline.vector_store(), &collection);
        let built = {
            let _gate = lease.lock().await;
            self.build_collection(&upload, &fingerprint, &collection, &lease).await
        };
        let (outcome, chunks) = match built {
            Ok(done) => done,
            Err(e) => {
                error!(file = %upload.file_name, collection, error = %e, "document load failed");
                self.phase.send_replace(self.ready_phase());
                return Err(e);
            }
        };

        let loaded = LoadedDocument {
            fingerprint,
            file_name: upload.file_name,
            retriever: self.pipeline.retriever(collection.clone()),
            collection,
            chunks,
            lease,
        };
        if let Some(previous) = self.current.replace(loaded) {
            if let Err(e) = self.release(previous).await {
                warn!(error = %e, "failed to delete previous collection");
            }
        }
        self.phase.send_replace(self.ready_phase());

        info!(collection = self.collection(), chunks, ?outcome, "document ready");
        Ok(outcome)
    }

    /// Attach to or build `collection`. Callers hold the lease's gate.
    ///
    /// A collection shared with another live session is attached to even
    /// when persisted reuse is disabled, and is never deleted here.
    async fn build_collection(
        &self,
        upload: &Upload,
        fingerprint: &str,
        collection: &str,
        lease: &Lease,
    ) -> Result<(LoadOutcome, usize)> {
        if lease.is_shared() || self.config.reuse_persisted {
            if let Some(chunks) = self.pipeline.collection_size(collection).await?.filter(|n| *n > 0) {
                // Succeeds only when the stored dimensionality matches the embedder.
                match self.pipeline.create_collection(collection).await {
                    Ok(()) => {
                        info!(collection, chunks, "reattached persisted collection");
                        return Ok((LoadOutcome::Reattached { chunks }, chunks));
                    }
                    Err(RagError::DimensionMismatch { expected, actual, .. }) => {
                        warn!(collection, expected, actual, "persisted collection has other dimensions, rebuilding");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let text = self.extractor.extract_text(upload).await?;
        if text.trim().is_empty() {
            return Err(ExtractionError::Empty(upload.file_name.clone()).into());
        }
        info!(
            file = %upload.file_name,
            extractor = self.extractor.name(),
            chars = text.chars().count(),
            "extracted text"
        );

        // Start from an empty collection; leftovers are from an earlier,
        // unfinished run.
        if !lease.is_shared() {
            self.pipeline.delete_collection(collection).await?;
        }
        self.pipeline.create_collection(collection).await?;

        let document = Document::new(fingerprint, text)
            .with_source_uri(upload.file_name.clone())
            .with_metadata("file_name", upload.file_name.clone());

        match self.pipeline.ingest(collection, &document).await {
            Ok(chunks) => Ok((LoadOutcome::Ingested { chunks: chunks.len() }, chunks.len())),
            Err(e) => {
                if !lease.is_shared() {
                    if let Err(e) = self.pipeline.delete_collection(collection).await {
                        warn!(collection, error = %e, "failed to delete partial collection");
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Let go of `doc`, deleting its collection unless another session still uses it.
    async fn release(&self, doc: LoadedDocument) -> Result<()> {
        let _gate = doc.lease.lock().await;
        if doc.lease.is_shared() {
            info!(collection = %doc.collection, "collection still in use, keeping it");
            return Ok(());
        }
        self.pipeline.delete_collection(&doc.collection).await?;
        Ok(())
    }

    /// Answer `question` from the loaded document.
    ///
    /// Each question is answered independently. Finding no relevant passages
    /// is not an error: the model is asked anyway and answers with its
    /// not-found phrasing.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        let doc = self.current.as_ref().ok_or(SessionError::NotReady)?;

        let sources = doc.retriever.retrieve(question).await?;
        let text = self.synthesizer.answer(question, &sources).await?;

        self.history.push(Turn::user(question));
        self.history.push(Turn::assistant(text.clone()));
        Ok(Answer { text, sources })
    }

    /// End the session. Idempotent.
    ///
    /// With `purge_on_close` the current collection is deleted unless another
    /// live session is using it; otherwise it stays in the store for later
    /// reuse.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let current = self.current.take();
        self.closed = true;
        self.phase.send_replace(SessionPhase::Closed);
        info!(namespace = %self.config.namespace, "session closed");

        match current {
            Some(doc) if self.config.purge_on_close => self.release(doc).await,
            _ => Ok(()),
        }
    }
}

/// Hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hex SHA-256 identifying `bytes` indexed under `profile`.
pub fn index_key(bytes: &[u8], profile: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update([0u8]);
    hasher.update(profile.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Collections created under `config`'s namespace, with their sizes.
pub async fn namespace_collections(
    store: &dyn VectorStore,
    config: &SessionConfig,
) -> Result<Vec<(String, usize)>> {
    let mut owned = Vec::new();
    for name in store.list_collections().await? {
        if config.owns(&name) {
            let count = store.count(&name).await?;
            owned.push((name, count));
        }
    }
    Ok(owned)
}

/// Delete every collection under `config`'s namespace. Returns how many were removed.
pub async fn purge_namespace(store: &dyn VectorStore, config: &SessionConfig) -> Result<usize> {
    let owned = namespace_collections(store, config).await?;
    for (name, _) in &owned {
        store.delete_collection(name).await?;
    }
    info!(namespace = %config.namespace, removed = owned.len(), "purged namespace");
    Ok(owned.len())
}

/// Builder for [`DocumentSession`].
#[derive(Default)]
pub struct DocumentSessionBuilder {
    config: SessionConfig,
    pipeline: Option<Arc<RagPipeline>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    synthesizer: Option<AnswerSynthesizer>,
}

impl DocumentSessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pipeline(mut self, pipeline: Arc<RagPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn synthesizer(mut self, synthesizer: AnswerSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if a component is missing or the
    /// namespace is invalid.
    pub fn build(self) -> Result<DocumentSession> {
        self.config.validate()?;
        let missing = |what: &str| SessionError::Config(format!("{what} is required"));
        let (phase, _) = watch::channel(SessionPhase::Uninitialized);
        Ok(DocumentSession {
            pipeline: self.pipeline.ok_or_else(|| missing("pipeline"))?,
            extractor: self.extractor.ok_or_else(|| missing("extractor"))?,
            synthesizer: self.synthesizer.ok_or_else(|| missing("synthesizer"))?,
            config: self.config,
            current: None,
            closed: false,
            history: Vec::new(),
            phase,
        })
    }
}
