use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use docqa_telemetry::LogFormat;

/// Ask questions about a financial document.
#[derive(Parser, Debug)]
#[command(name = "docqa", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub opts: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a document and ask questions interactively
    Chat {
        /// PDF, markdown or plain-text file
        file: PathBuf,
    },

    /// Load a document and answer a single question
    Ask {
        file: PathBuf,
        question: String,
    },

    /// List persisted collections in the namespace
    Collections,

    /// Delete persisted collections
    Purge {
        /// Delete every collection in the store, not just this namespace's
        #[arg(long)]
        all: bool,
    },
}

/// Which embedding backend to use.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// OpenAI-compatible `/embeddings` endpoint
    Openai,
    /// Offline feature hashing; no server needed
    Hash,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Directory holding persisted collections
    #[arg(long, global = true, env = "DOCQA_STORE_DIR", default_value = "chroma_db")]
    pub store_dir: PathBuf,

    /// Prefix of collection names owned by this tool
    #[arg(long, global = true, env = "DOCQA_NAMESPACE", default_value = "financial_db")]
    pub namespace: String,

    /// Maximum characters per chunk
    #[arg(long, global = true, default_value_t = 3000)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, global = true, default_value_t = 500)]
    pub chunk_overlap: usize,

    /// Passages retrieved per question
    #[arg(long, global = true, default_value_t = 5)]
    pub top_k: usize,

    #[arg(long, global = true, value_enum, env = "DOCQA_EMBEDDER", default_value = "openai")]
    pub embedder: EmbedderKind,

    /// Base URL of the embeddings API
    #[arg(long, global = true, env = "DOCQA_EMBEDDING_URL")]
    pub embedding_url: Option<String>,

    #[arg(long, global = true, env = "DOCQA_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Vector length produced by the embedder
    #[arg(long, global = true)]
    pub embedding_dimensions: Option<usize>,

    /// Groq chat model
    #[arg(long, global = true, env = "DOCQA_MODEL")]
    pub model: Option<String>,

    #[arg(long, global = true, default_value_t = 0.5)]
    pub temperature: f32,

    /// Markdown prompt template with `{context}` and `{question}` slots
    #[arg(long, global = true)]
    pub template: Option<PathBuf>,

    /// `pretty` or `json`
    #[arg(long, global = true, env = "DOCQA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}
