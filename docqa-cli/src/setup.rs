//! Wiring of stores, providers and sessions from command-line options.

use std::sync::Arc;

use anyhow::{Context, Result};
use docqa_extract::{LlamaParseConfig, LlamaParseExtractor, PlainTextExtractor, TextExtractor, Upload};
use docqa_model::{GroqClient, GroqConfig, Llm};
use docqa_rag::{
    EmbeddingProvider, FileVectorStore, HashEmbeddingProvider, OpenAIEmbeddingProvider, RagConfig,
    RagPipeline, VectorStore,
};
use docqa_session::{
    AnswerSynthesizer, DocumentSession, PromptTemplate, SessionConfig, SynthesizerConfig,
};
use tracing::info;

use crate::cli::{EmbedderKind, GlobalOpts};

pub fn session_config(opts: &GlobalOpts) -> SessionConfig {
    SessionConfig::default().with_namespace(opts.namespace.clone())
}

pub fn rag_config(opts: &GlobalOpts) -> Result<RagConfig> {
    RagConfig::builder()
        .chunk_size(opts.chunk_size)
        .chunk_overlap(opts.chunk_overlap)
        .top_k(opts.top_k)
        .build()
        .context("invalid retrieval settings")
}

pub async fn open_file_store(opts: &GlobalOpts) -> Result<FileVectorStore> {
    FileVectorStore::open(&opts.store_dir)
        .await
        .with_context(|| format!("cannot open store at {}", opts.store_dir.display()))
}

pub async fn open_store(opts: &GlobalOpts) -> Result<Arc<dyn VectorStore>> {
    Ok(Arc::new(open_file_store(opts).await?))
}

pub fn embedder(opts: &GlobalOpts) -> Result<Arc<dyn EmbeddingProvider>> {
    match opts.embedder {
        EmbedderKind::Hash => Ok(Arc::new(
            opts.embedding_dimensions.map(HashEmbeddingProvider::new).unwrap_or_default(),
        )),
        EmbedderKind::Openai => {
            let mut provider = OpenAIEmbeddingProvider::from_env()?;
            if let Some(url) = &opts.embedding_url {
                provider = provider.with_base_url(url.clone());
            }
            if let Some(model) = &opts.embedding_model {
                provider = provider.with_model(model.clone());
            }
            if let Some(dims) = opts.embedding_dimensions {
                provider = provider.with_dimensions(dims);
            }
            Ok(Arc::new(provider))
        }
    }
}

pub fn llm(opts: &GlobalOpts) -> Result<Arc<dyn Llm>> {
    let mut config = GroqConfig::from_env()?;
    if let Some(model) = &opts.model {
        config = config.with_model(model.clone());
    }
    Ok(Arc::new(GroqClient::new(config)?))
}

pub async fn template(opts: &GlobalOpts) -> Result<PromptTemplate> {
    Ok(match &opts.template {
        Some(path) => PromptTemplate::from_file(path).await?,
        None => PromptTemplate::financial_analyst()?,
    })
}

/// PDFs go through LlamaParse; anything else is read as UTF-8 text.
pub fn extractor_for(upload: &Upload) -> Result<Arc<dyn TextExtractor>> {
    if upload.is_pdf() {
        Ok(Arc::new(LlamaParseExtractor::new(LlamaParseConfig::from_env()?)?))
    } else {
        Ok(Arc::new(PlainTextExtractor))
    }
}

/// Build a session ready to load `upload`.
pub async fn build_session(opts: &GlobalOpts, upload: &Upload) -> Result<DocumentSession> {
    let store = open_store(opts).await?;
    let embedder = embedder(opts)?;
    info!(
        embedder = embedder.name(),
        dimensions = embedder.dimensions(),
        store = %opts.store_dir.display(),
        "retrieval configured"
    );

    let pipeline = RagPipeline::builder()
        .config(rag_config(opts)?)
        .embedding_provider(embedder)
        .vector_store(store)
        .build()?;

    let synth_config = SynthesizerConfig::default().with_temperature(opts.temperature);
    synth_config.validate()?;
    let synthesizer =
        AnswerSynthesizer::new(llm(opts)?, template(opts).await?).with_config(synth_config);

    Ok(DocumentSession::builder()
        .config(session_config(opts))
        .pipeline(Arc::new(pipeline))
        .extractor(extractor_for(upload)?)
        .synthesizer(synthesizer)
        .build()?)
}
