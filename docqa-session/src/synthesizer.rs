//! Grounded answer generation.

use std::sync::Arc;

use docqa_model::{GenerationRequest, Llm, ModelError};
use docqa_rag::SearchResult;
use tracing::{debug, info};

use crate::config::SynthesizerConfig;
use crate::error::Result;
use crate::prompt::PromptTemplate;

/// Rendered into the context slot when retrieval found nothing, so the model
/// falls back to its not-found phrasing instead of guessing.
pub const NO_CONTEXT_MARKER: &str = "(No passages were retrieved from the document for this question.)";

/// Turns a question and retrieved passages into an answer.
///
/// Directives come from the template and are the same for every question.
pub struct AnswerSynthesizer {
    llm: Arc<dyn Llm>,
    template: PromptTemplate,
    config: SynthesizerConfig,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn Llm>, template: PromptTemplate) -> Self {
        Self { llm, template, config: SynthesizerConfig::default() }
    }

    pub fn with_config(mut self, config: SynthesizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn model_name(&self) -> &str {
        self.llm.name()
    }

    /// The exact prompt sent for `question` with `context`.
    pub fn build_prompt(&self, question: &str, context: &[SearchResult]) -> String {
        self.template.render(&format_context(context), question.trim())
    }

    /// Generate an answer grounded in `context`.
    ///
    /// An empty `context` still reaches the model, with [`NO_CONTEXT_MARKER`]
    /// in place of passages.
    ///
    /// # Errors
    ///
    /// Returns the model's error once the retry policy is exhausted.
    pub async fn answer(&self, question: &str, context: &[SearchResult]) -> Result<String> {
        let request = GenerationRequest::new(self.build_prompt(question, context))
            .with_config(self.config.generation);
        debug!(
            template = self.template.name(),
            template_version = self.template.version(),
            prompt_len = request.prompt.len(),
            "rendered prompt"
        );

        let llm = self.llm.as_ref();
        let request = &request;
        let response = self
            .config
            .retry
            .run("generate", ModelError::is_retryable, move || llm.generate(request.clone()))
            .await?;

        info!(model = %response.model, sources = context.len(), answer_len = response.text.len(), "answer generated");
        Ok(response.text)
    }
}

/// Number each passage so the model can cite it.
pub fn format_context(context: &[SearchResult]) -> String {
    if context.is_empty() {
        return NO_CONTEXT_MARKER.to_string();
    }
    context
        .iter()
        .enumerate()
        .map(|(i, result)| format!("[Source {}]\n{}", i + 1, result.chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
