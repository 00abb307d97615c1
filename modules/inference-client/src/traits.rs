use async_trait::async_trait;

use crate::error::InferenceError;
use crate::huggingface::{EntitySpan, LabelScore};

// =============================================================================
// InferenceBackend Trait
// =============================================================================

/// Synchronous request/response text transformations against a hosted model.
///
/// Every call is a single remote request. Retry, backoff and bisection are
/// the caller's concern; implementations only classify failures.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Translate `text` with a sequence-to-sequence model.
    async fn translate(&self, model: &str, text: &str) -> Result<String, InferenceError>;

    /// Zero-shot classify `text` against `labels`, highest score first.
    async fn zero_shot(
        &self,
        model: &str,
        text: &str,
        labels: &[String],
    ) -> Result<Vec<LabelScore>, InferenceError>;

    /// Named-entity spans, aggregated into groups.
    async fn token_classification(
        &self,
        model: &str,
        text: &str,
    ) -> Result<Vec<EntitySpan>, InferenceError>;

    /// Single-label classification (e.g. sentiment), highest score first.
    async fn text_classification(
        &self,
        model: &str,
        text: &str,
    ) -> Result<Vec<LabelScore>, InferenceError>;
}
