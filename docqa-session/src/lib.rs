//! # docqa-session
//!
//! Question answering over one uploaded document per session.
//!
//! - [`DocumentSession`] - the `Uninitialized → Ingesting → Ready → Closed`
//!   state machine that ingests a document once and answers questions about it
//! - [`AnswerSynthesizer`] - fills a [`PromptTemplate`] with retrieved
//!   passages and calls the model
//! - [`PromptTemplate`] - versioned markdown prompt with `{context}` and
//!   `{question}` slots; [`PromptTemplate::financial_analyst`] is bundled

pub mod config;
pub mod error;
pub mod history;
mod leases;
pub mod prompt;
pub mod session;
pub mod synthesizer;

pub use config::{SessionConfig, SynthesizerConfig};
pub use error::{Result, SessionError};
pub use history::{Role, Turn};
pub use prompt::PromptTemplate;
pub use session::{
    Answer, DocumentSession, DocumentSessionBuilder, LoadOutcome, SessionPhase, fingerprint,
    index_key, namespace_collections, purge_namespace,
};
pub use synthesizer::{AnswerSynthesizer, NO_CONTEXT_MARKER};
