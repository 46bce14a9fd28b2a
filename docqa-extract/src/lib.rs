//! # docqa-extract
//!
//! Turns uploaded documents into text for indexing.
//!
//! - [`Upload`] - a file name and its bytes
//! - [`TextExtractor`] - the extraction interface
//! - [`PlainTextExtractor`] - UTF-8 text and markdown, no network
//! - [`LlamaParseExtractor`] - PDF to markdown via LlamaParse (feature `llamaparse`, on by default)

pub mod error;
pub mod extractor;
#[cfg(feature = "llamaparse")]
pub mod llamaparse;
pub mod upload;

pub use error::{ExtractionError, Result};
pub use extractor::{PlainTextExtractor, TextExtractor};
#[cfg(feature = "llamaparse")]
pub use llamaparse::{LlamaParseConfig, LlamaParseExtractor};
pub use upload::Upload;
