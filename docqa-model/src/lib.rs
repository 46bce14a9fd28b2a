//! # docqa-model
//!
//! Text-generation backends for document question answering.
//!
//! ## Overview
//!
//! - [`Llm`] - one prompt in, one completion out
//! - [`GroqClient`] - Groq's hosted Llama models (feature `groq`, on by default)
//! - [`MockLlm`] - scripted answers for tests and offline runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docqa_model::groq::{GroqClient, GroqConfig};
//! use docqa_model::{GenerationConfig, GenerationRequest, Llm};
//!
//! let llm = GroqClient::new(GroqConfig::from_env()?)?;
//! let request = GenerationRequest::new("Summarise the Q2 results.")
//!     .with_config(GenerationConfig { temperature: 0.5, max_output_tokens: None });
//! let answer = llm.generate(request).await?.text;
//! ```

pub mod error;
#[cfg(feature = "groq")]
pub mod groq;
pub mod llm;
pub mod mock;

pub use error::{ModelError, Result};
#[cfg(feature = "groq")]
pub use groq::{GroqClient, GroqConfig};
pub use llm::{GenerationConfig, GenerationRequest, GenerationResponse, Llm, TokenUsage};
pub use mock::MockLlm;
