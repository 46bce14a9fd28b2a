//! Scripted model for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ModelError, Result};
use crate::llm::{GenerationRequest, GenerationResponse, Llm};

type Responder = Arc<dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync>;

/// A [`Llm`] whose answers come from a closure.
///
/// Every request is recorded and can be inspected with
/// [`requests`](MockLlm::requests). Failures queued with
/// [`fail_next`](MockLlm::fail_next) are returned before the responder runs.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_model::{GenerationRequest, Llm, MockLlm};
///
/// let llm = MockLlm::with_response("42");
/// let response = llm.generate(GenerationRequest::new("meaning?")).await?;
/// assert_eq!(response.text, "42");
/// ```
#[derive(Clone)]
pub struct MockLlm {
    name: String,
    responder: Responder,
    failures: Arc<Mutex<VecDeque<ModelError>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockLlm {
    /// A mock that answers every prompt with the text `responder` returns.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: "mock-llm".to_string(),
            responder: Arc::new(responder),
            failures: Arc::default(),
            requests: Arc::default(),
        }
    }

    /// A mock that always answers `text`.
    pub fn with_response(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Rename the mock; the name is reported by [`Llm::name`].
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make the next call fail with `error` instead of answering.
    pub fn fail_next(&self, error: ModelError) {
        lock(&self.failures).push_back(error);
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl std::fmt::Debug for MockLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlm").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        lock(&self.requests).push(request.clone());
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        let text = (self.responder)(&request)?;
        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse(self.name.clone()));
        }
        Ok(GenerationResponse { text, model: self.name.clone(), usage: None })
    }
}
