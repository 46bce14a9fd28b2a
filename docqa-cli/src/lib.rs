//! # docqa-cli
//!
//! The `docqa` command: load a financial document and ask questions about it
//! from the terminal.

pub mod cli;
pub mod commands;
pub mod setup;

pub use cli::{Cli, Commands, EmbedderKind, GlobalOpts};
pub use commands::execute;
