//! Session and synthesizer settings.

use std::time::Duration;

use docqa_model::GenerationConfig;
use docqa_rag::{RetryPolicy, validate_collection_name};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Hex characters of the document fingerprint used in collection names.
pub const FINGERPRINT_PREFIX_LEN: usize = 16;

/// How a [`DocumentSession`](crate::DocumentSession) names, reuses and
/// cleans up its collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Prefix of every collection this session creates. Sessions with
    /// different namespaces never see each other's documents.
    pub namespace: String,
    /// Reattach to a non-empty persisted collection for the same document
    /// instead of extracting and embedding it again.
    pub reuse_persisted: bool,
    /// Delete the current collection when the session closes.
    pub purge_on_close: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { namespace: "financial_db".to_string(), reuse_persisted: true, purge_on_close: false }
    }
}

impl SessionConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_reuse_persisted(mut self, reuse: bool) -> Self {
        self.reuse_persisted = reuse;
        self
    }

    pub fn with_purge_on_close(mut self, purge: bool) -> Self {
        self.purge_on_close = purge;
        self
    }

    /// Collection name for a document with the given hex fingerprint.
    pub fn collection_for(&self, fingerprint: &str) -> String {
        let end = fingerprint.len().min(FINGERPRINT_PREFIX_LEN);
        format!("{}_{}", self.namespace, &fingerprint[..end])
    }

    /// Whether `collection` was created under this namespace.
    pub fn owns(&self, collection: &str) -> bool {
        collection
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|suffix| {
                suffix.len() == FINGERPRINT_PREFIX_LEN && suffix.chars().all(|c| c.is_ascii_hexdigit())
            })
    }

    /// Check that collection names derived from the namespace are valid.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an empty namespace or one that
    /// cannot form a valid collection name.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(SessionError::Config("namespace must not be empty".into()));
        }
        let sample = self.collection_for(&"0".repeat(FINGERPRINT_PREFIX_LEN));
        validate_collection_name(&sample).map_err(|_| {
            SessionError::Config(format!(
                "namespace '{}' must be at most {} characters of [A-Za-z0-9_-]",
                self.namespace,
                63 - FINGERPRINT_PREFIX_LEN - 1
            ))
        })
    }
}

/// How answers are generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    /// Sampling settings sent with every request.
    pub generation: GenerationConfig,
    /// Retry policy for transient model failures.
    pub retry: RetryPolicy,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig { temperature: 0.5, max_output_tokens: None },
            retry: RetryPolicy::single_retry(Duration::from_secs(1)),
        }
    }
}

impl SynthesizerConfig {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max: Option<u32>) -> Self {
        self.generation.max_output_tokens = max;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for a temperature outside `0.0..=2.0`.
    pub fn validate(&self) -> Result<()> {
        let t = self.generation.temperature;
        if !(0.0..=2.0).contains(&t) {
            return Err(SessionError::Config(format!("temperature must be within 0.0..=2.0, got {t}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_use_fingerprint_prefix() {
        let config = SessionConfig::default();
        let name = config.collection_for("abcdef0123456789abcdef0123456789");
        assert_eq!(name, "financial_db_abcdef0123456789");
        assert!(config.owns(&name));
        assert!(!config.owns("financial_db"));
        assert!(!config.owns("other_abcdef0123456789"));
        assert!(!SessionConfig::default().with_namespace("fin").owns(&name));
    }

    #[test]
    fn namespace_must_form_valid_names() {
        assert!(SessionConfig::default().validate().is_ok());
        assert!(SessionConfig::default().with_namespace("").validate().is_err());
        assert!(SessionConfig::default().with_namespace("has space").validate().is_err());
        assert!(SessionConfig::default().with_namespace("x".repeat(47)).validate().is_err());
        assert!(SessionConfig::default().with_namespace("x".repeat(46)).validate().is_ok());
    }

    #[test]
    fn synthesizer_defaults() {
        let config = SynthesizerConfig::default();
        assert_eq!(config.generation.temperature, 0.5);
        assert_eq!(config.retry.max_attempts, 2);
        assert!(config.with_temperature(3.0).validate().is_err());
    }
}
