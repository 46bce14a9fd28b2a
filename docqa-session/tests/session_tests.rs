//! End-to-end tests for document sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docqa_extract::{ExtractionError, PlainTextExtractor, TextExtractor, Upload};
use docqa_model::{MockLlm, ModelError};
use docqa_rag::{
    EmbeddingProvider, FileVectorStore, HashEmbeddingProvider, InMemoryVectorStore, RagConfig,
    RagError, RagPipeline, RetryPolicy, VectorStore,
};
use docqa_session::{
    AnswerSynthesizer, DocumentSession, LoadOutcome, NO_CONTEXT_MARKER, PromptTemplate, Role,
    SessionConfig, SessionError, SessionPhase, SynthesizerConfig, namespace_collections,
    purge_namespace,
};
use docqa_telemetry::{CaptureLayer, CapturedEvents};
use tracing_subscriber::prelude::*;

const FALLBACK: &str = "🤔 Hmm, I cannot find the exact information in the P&L tables.";
const REVENUE: &str = "Revenue was $100M in Q1 and $120M in Q2.";

/// Answers from the context slot, or with the not-found phrasing when the
/// slot holds the no-context marker.
fn analyst_llm() -> MockLlm {
    MockLlm::new(|request| {
        let context = request
            .prompt
            .split("Context:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n---").next())
            .unwrap_or_default();
        if context.contains(NO_CONTEXT_MARKER) {
            Ok(FALLBACK.to_string())
        } else {
            Ok(format!("According to the document: {context}"))
        }
    })
}

/// Counts calls, then reads plain text.
#[derive(Default)]
struct CountingExtractor {
    calls: AtomicUsize,
}

#[async_trait]
impl TextExtractor for CountingExtractor {
    fn name(&self) -> &str {
        "counting"
    }

    async fn extract_text(&self, upload: &Upload) -> docqa_extract::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PlainTextExtractor.extract_text(upload).await
    }
}

struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    async fn embed(&self, _text: &str) -> docqa_rag::Result<Vec<f32>> {
        Err(RagError::EmbeddingError { provider: "down".into(), message: "connection refused".into() })
    }

    fn dimensions(&self) -> usize {
        64
    }
}

/// Maps every text to the same vector.
struct ConstantEmbedder;

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    async fn embed(&self, _text: &str) -> docqa_rag::Result<Vec<f32>> {
        Ok(vec![0.125; 64])
    }

    fn dimensions(&self) -> usize {
        64
    }

    fn name(&self) -> &str {
        "constant"
    }
}

struct Harness {
    store: Arc<dyn VectorStore>,
    llm: MockLlm,
    extractor: Arc<CountingExtractor>,
}

impl Harness {
    fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryVectorStore::new()))
    }

    fn with_store(store: Arc<dyn VectorStore>) -> Self {
        Self { store, llm: analyst_llm(), extractor: Arc::default() }
    }

    fn session_with(
        &self,
        embedder: Arc<dyn EmbeddingProvider>,
        rag: RagConfig,
        config: SessionConfig,
    ) -> DocumentSession {
        let pipeline = RagPipeline::builder()
            .config(rag)
            .embedding_provider(embedder)
            .vector_store(self.store.clone())
            .retry_policy(RetryPolicy::single_retry(Duration::from_millis(5)))
            .build()
            .unwrap();
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(self.llm.clone()), PromptTemplate::financial_analyst().unwrap())
                .with_config(
                    SynthesizerConfig::default().with_retry(RetryPolicy::single_retry(Duration::from_millis(5))),
                );
        DocumentSession::builder()
            .config(config)
            .pipeline(Arc::new(pipeline))
            .extractor(self.extractor.clone())
            .synthesizer(synthesizer)
            .build()
            .unwrap()
    }

    fn session(&self) -> DocumentSession {
        self.session_with(
            Arc::new(HashEmbeddingProvider::new(64)),
            RagConfig::default(),
            SessionConfig::default(),
        )
    }
}

fn upload(name: &str, text: &str) -> Upload {
    Upload::new(name, text.as_bytes())
}

#[tokio::test]
async fn answers_revenue_question_from_single_chunk() {
    let harness = Harness::in_memory();
    let mut session = harness.session();
    assert_eq!(session.phase(), SessionPhase::Uninitialized);

    let outcome = session.load_document(upload("q2.md", REVENUE)).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Ingested { chunks: 1 });
    assert_eq!(session.phase(), SessionPhase::Ready { file_name: "q2.md".into(), chunks: 1 });

    let answer = session.ask("What was Q2 revenue?").await.unwrap();
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].chunk.text, REVENUE);
    assert!(answer.text.contains("120"));

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "What was Q2 revenue?");
    assert_eq!(history[1].role, Role::Assistant);
}

#[tokio::test]
async fn blank_document_is_an_extraction_error() {
    let harness = Harness::in_memory();
    let mut session = harness.session();

    let err = session.load_document(upload("blank.md", " \n\n  ")).await.unwrap_err();
    assert!(matches!(err, SessionError::Extraction(ExtractionError::Empty(ref f)) if f == "blank.md"));
    assert_eq!(session.phase(), SessionPhase::Uninitialized);
    assert!(harness.store.list_collections().await.unwrap().is_empty());

    assert!(matches!(session.ask("Anything?").await, Err(SessionError::NotReady)));
}

#[tokio::test]
async fn no_retrieved_passages_yield_fallback_phrasing() {
    let harness = Harness::in_memory();
    let rag = RagConfig::builder().similarity_threshold(0.99).build().unwrap();
    let mut session =
        harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), rag, SessionConfig::default());
    session.load_document(upload("q2.md", REVENUE)).await.unwrap();

    let answer = session.ask("How many employees joined?").await.unwrap();
    assert!(answer.sources.is_empty());
    assert_eq!(answer.text, FALLBACK);
    assert!(harness.llm.requests()[0].prompt.contains(NO_CONTEXT_MARKER));
}

#[tokio::test]
async fn reloading_identical_bytes_is_a_no_op() {
    let harness = Harness::in_memory();
    let mut session = harness.session();

    session.load_document(upload("q2.md", REVENUE)).await.unwrap();
    let outcome = session.load_document(upload("renamed.md", REVENUE)).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Unchanged);
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.document_name(), Some("q2.md"));
}

#[tokio::test]
async fn new_document_replaces_previous_collection() {
    let harness = Harness::in_memory();
    let mut session = harness.session();

    session.load_document(upload("q2.md", REVENUE)).await.unwrap();
    let first = session.collection().unwrap().to_string();

    session.load_document(upload("q3.md", "Revenue was $150M in Q3.")).await.unwrap();
    let second = session.collection().unwrap().to_string();

    assert_ne!(first, second);
    assert_eq!(harness.store.list_collections().await.unwrap(), vec![second]);
    let answer = session.ask("What was Q3 revenue?").await.unwrap();
    assert!(answer.text.contains("150"));
}

#[tokio::test]
async fn failed_reload_keeps_previous_document() {
    let harness = Harness::in_memory();
    let mut session = harness.session();
    session.load_document(upload("q2.md", REVENUE)).await.unwrap();
    let ready = session.phase();

    let err = session.load_document(Upload::new("scan.pdf", b"%PDF-1.7 binary".to_vec())).await.unwrap_err();
    assert!(matches!(err, SessionError::Extraction(ExtractionError::UnsupportedFormat { .. })));

    assert_eq!(session.phase(), ready);
    assert_eq!(harness.store.list_collections().await.unwrap().len(), 1);
    assert!(session.ask("What was Q2 revenue?").await.unwrap().text.contains("120"));
}

#[tokio::test]
async fn embedding_outage_rolls_back_collection() {
    let harness = Harness::in_memory();
    let mut session = harness.session_with(Arc::new(DownEmbedder), RagConfig::default(), SessionConfig::default());

    let err = session.load_document(upload("q2.md", REVENUE)).await.unwrap_err();

    assert!(err.is_retryable());
    assert!(err.user_message().contains("embedding service"));
    assert_eq!(session.phase(), SessionPhase::Uninitialized);
    assert!(harness.store.list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn generation_outage_is_reported_and_session_stays_ready() {
    let harness = Harness::in_memory();
    let mut session = harness.session();
    session.load_document(upload("q2.md", REVENUE)).await.unwrap();

    for _ in 0..2 {
        harness.llm.fail_next(ModelError::Generation { model: "m".into(), message: "503".into() });
    }
    let err = session.ask("What was Q2 revenue?").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(session.history().is_empty());

    assert!(session.ask("What was Q2 revenue?").await.is_ok());
}

#[tokio::test]
async fn persisted_collection_is_reattached_without_extraction() {
    let dir = tempfile::tempdir().unwrap();
    {
        let harness = Harness::with_store(Arc::new(FileVectorStore::open(dir.path()).await.unwrap()));
        let mut session = harness.session();
        session.load_document(upload("q2.md", REVENUE)).await.unwrap();
        session.close().await.unwrap();
    }

    let harness = Harness::with_store(Arc::new(FileVectorStore::open(dir.path()).await.unwrap()));
    let mut session = harness.session();
    let outcome = session.load_document(upload("q2.md", REVENUE)).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Reattached { chunks: 1 });
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 0);
    assert!(session.ask("What was Q2 revenue?").await.unwrap().text.contains("120"));
}

#[tokio::test]
async fn collection_from_another_embedder_is_not_reused() {
    let dir = tempfile::tempdir().unwrap();
    {
        let harness = Harness::with_store(Arc::new(FileVectorStore::open(dir.path()).await.unwrap()));
        let mut session =
            harness.session_with(Arc::new(ConstantEmbedder), RagConfig::default(), SessionConfig::default());
        session.load_document(upload("q2.md", REVENUE)).await.unwrap();
        session.close().await.unwrap();
    }

    let harness = Harness::with_store(Arc::new(FileVectorStore::open(dir.path()).await.unwrap()));
    let mut session = harness.session();
    let outcome = session.load_document(upload("q2.md", REVENUE)).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Ingested { chunks: 1 });
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
    let answer = session.ask(REVENUE).await.unwrap();
    assert!((answer.sources[0].score - 1.0).abs() < 1e-5);
    assert_eq!(harness.store.list_collections().await.unwrap().len(), 2);
}

#[tokio::test]
async fn changed_chunking_rebuilds_the_index() {
    let dir = tempfile::tempdir().unwrap();
    {
        let harness = Harness::with_store(Arc::new(FileVectorStore::open(dir.path()).await.unwrap()));
        let mut session = harness.session();
        session.load_document(upload("q2.md", REVENUE)).await.unwrap();
        session.close().await.unwrap();
    }

    let harness = Harness::with_store(Arc::new(FileVectorStore::open(dir.path()).await.unwrap()));
    let rag = RagConfig::builder().chunk_size(20).chunk_overlap(5).build().unwrap();
    let mut session =
        harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), rag, SessionConfig::default());
    let outcome = session.load_document(upload("q2.md", REVENUE)).await.unwrap();

    assert!(matches!(outcome, LoadOutcome::Ingested { chunks } if chunks > 1));
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn replacing_a_shared_document_keeps_it_for_other_sessions() {
    let harness = Harness::in_memory();
    let mut a = harness.session();
    let mut b = harness.session();

    a.load_document(upload("x.md", REVENUE)).await.unwrap();
    assert_eq!(b.load_document(upload("x.md", REVENUE)).await.unwrap(), LoadOutcome::Reattached { chunks: 1 });
    assert_eq!(a.collection(), b.collection());

    a.load_document(upload("y.md", "Revenue was $150M in Q3.")).await.unwrap();

    assert!(b.ask("What was Q2 revenue?").await.unwrap().text.contains("120"));
    assert_eq!(harness.store.list_collections().await.unwrap().len(), 2);

    b.load_document(upload("z.md", "Dividends were paid in March.")).await.unwrap();
    let mut remaining = harness.store.list_collections().await.unwrap();
    remaining.sort();
    let mut live = vec![a.collection().unwrap().to_string(), b.collection().unwrap().to_string()];
    live.sort();
    assert_eq!(remaining, live);
}

#[tokio::test]
async fn purge_on_close_waits_for_the_last_session() {
    let harness = Harness::in_memory();
    let config = SessionConfig::default().with_purge_on_close(true);
    let mut a = harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), config.clone());
    let mut b = harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), config);
    a.load_document(upload("q2.md", REVENUE)).await.unwrap();
    b.load_document(upload("q2.md", REVENUE)).await.unwrap();

    a.close().await.unwrap();
    assert_eq!(harness.store.list_collections().await.unwrap().len(), 1);
    assert!(b.ask("What was Q2 revenue?").await.unwrap().text.contains("120"));

    b.close().await.unwrap();
    assert!(harness.store.list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn live_collection_is_shared_even_without_reuse() {
    let harness = Harness::in_memory();
    let config = SessionConfig::default().with_reuse_persisted(false);
    let mut a = harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), config.clone());
    let mut b = harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), config);
    a.load_document(upload("q2.md", REVENUE)).await.unwrap();

    assert_eq!(b.load_document(upload("q2.md", REVENUE)).await.unwrap(), LoadOutcome::Reattached { chunks: 1 });
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
    assert!(a.ask("What was Q2 revenue?").await.unwrap().text.contains("120"));
}

#[tokio::test]
async fn reuse_can_be_disabled() {
    let harness = Harness::in_memory();
    let config = SessionConfig::default().with_reuse_persisted(false);
    let mut first =
        harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), config.clone());
    first.load_document(upload("q2.md", REVENUE)).await.unwrap();
    first.close().await.unwrap();

    let mut second = harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), config);
    let outcome = second.load_document(upload("q2.md", REVENUE)).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Ingested { chunks: 1 });
    assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn close_purges_when_configured_and_blocks_further_use() {
    let harness = Harness::in_memory();
    let config = SessionConfig::default().with_purge_on_close(true);
    let mut session = harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), config);
    session.load_document(upload("q2.md", REVENUE)).await.unwrap();

    session.close().await.unwrap();
    session.close().await.unwrap();

    assert_eq!(session.phase(), SessionPhase::Closed);
    assert!(harness.store.list_collections().await.unwrap().is_empty());
    assert!(matches!(session.ask("q?").await, Err(SessionError::Closed)));
    assert!(matches!(session.load_document(upload("a.md", "x")).await, Err(SessionError::Closed)));
}

#[tokio::test]
async fn phase_changes_are_observable() {
    let harness = Harness::in_memory();
    let mut session = harness.session();
    let mut phases = session.subscribe();

    session.load_document(upload("q2.md", REVENUE)).await.unwrap();

    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Ready { file_name: "q2.md".into(), chunks: 1 });
}

#[tokio::test]
async fn questions_are_answered_independently() {
    let harness = Harness::in_memory();
    let mut session = harness.session();
    session.load_document(upload("q2.md", REVENUE)).await.unwrap();

    session.ask("What was Q1 revenue?").await.unwrap();
    session.ask("What was Q2 revenue?").await.unwrap();

    let requests = harness.llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[1].prompt.contains("What was Q1 revenue?"));
    assert_eq!(requests[1].config.temperature, 0.5);
}

#[tokio::test]
async fn empty_question_is_rejected() {
    let harness = Harness::in_memory();
    let mut session = harness.session();
    session.load_document(upload("q2.md", REVENUE)).await.unwrap();
    assert!(matches!(session.ask("   ").await, Err(SessionError::EmptyQuestion)));
}

#[tokio::test]
async fn namespaces_are_isolated_and_purgeable() {
    let harness = Harness::in_memory();
    let alpha = SessionConfig::default().with_namespace("alpha");
    let beta = SessionConfig::default().with_namespace("beta");

    let mut a = harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), alpha.clone());
    let mut b = harness.session_with(Arc::new(HashEmbeddingProvider::new(64)), RagConfig::default(), beta.clone());
    a.load_document(upload("q2.md", REVENUE)).await.unwrap();
    b.load_document(upload("q2.md", REVENUE)).await.unwrap();
    assert_ne!(a.collection(), b.collection());

    let listed = namespace_collections(harness.store.as_ref(), &alpha).await.unwrap();
    assert_eq!(listed, vec![(a.collection().unwrap().to_string(), 1)]);

    assert_eq!(purge_namespace(harness.store.as_ref(), &alpha).await.unwrap(), 1);
    assert_eq!(harness.store.list_collections().await.unwrap(), vec![b.collection().unwrap().to_string()]);
}

#[tokio::test]
async fn ingestion_and_answers_are_logged_with_structured_fields() {
    let events = CapturedEvents::new();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(CaptureLayer::new(events.clone())));

    let harness = Harness::in_memory();
    let mut session = harness.session();
    session.load_document(upload("q2.md", REVENUE)).await.unwrap();
    session.ask("What was Q2 revenue?").await.unwrap();

    let ready = events.with_message("document ready");
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].field("chunks"), Some(&serde_json::json!(1)));
    assert_eq!(
        ready[0].field("collection").and_then(|v| v.as_str()),
        session.collection()
    );
    let answered = events.with_message("answer generated");
    assert_eq!(answered[0].field("sources"), Some(&serde_json::json!(1)));
}

#[test]
fn builder_rejects_missing_parts_and_bad_namespace() {
    assert!(matches!(DocumentSession::builder().build(), Err(SessionError::Config(_))));

    let harness = Harness::in_memory();
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(HashEmbeddingProvider::new(8)))
        .vector_store(harness.store.clone())
        .build()
        .unwrap();
    let result = DocumentSession::builder()
        .config(SessionConfig::default().with_namespace("bad name"))
        .pipeline(Arc::new(pipeline))
        .extractor(Arc::new(PlainTextExtractor))
        .synthesizer(AnswerSynthesizer::new(Arc::new(analyst_llm()), PromptTemplate::financial_analyst().unwrap()))
        .build();
    assert!(matches!(result, Err(SessionError::Config(_))));
}
