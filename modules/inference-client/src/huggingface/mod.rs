mod client;
pub(crate) mod types;

pub use types::{EntitySpan, LabelScore};

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::InferenceError;
use crate::traits::InferenceBackend;
use crate::util::strip_control_chars;
use client::HuggingFaceClient;
use types::{ClassificationWire, InferenceRequest, OneOrMany, TranslationOutput, ZeroShotWire};

// =============================================================================
// HuggingFace Backend
// =============================================================================

/// Inference backend for the Hugging Face router (`hf-inference` provider).
pub struct HuggingFace {
    client: HuggingFaceClient,
}

impl HuggingFace {
    pub fn new(api_key: impl AsRef<str>, timeout: Duration) -> Result<Self, InferenceError> {
        let api_key = api_key.as_ref();
        if api_key.trim().is_empty() {
            return Err(InferenceError::Config("API token is empty".to_string()));
        }
        Ok(Self {
            client: HuggingFaceClient::new(api_key, timeout)?,
        })
    }

    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.client = self.client.with_base_url(url.as_ref());
        self
    }
}

fn prepare(text: &str) -> String {
    strip_control_chars(text.trim())
}

// =============================================================================
// InferenceBackend Implementation
// =============================================================================

#[async_trait]
impl InferenceBackend for HuggingFace {
    async fn translate(&self, model: &str, text: &str) -> Result<String, InferenceError> {
        let input = prepare(text);
        if input.is_empty() {
            return Ok(String::new());
        }

        let request = InferenceRequest {
            inputs: &input,
            parameters: None,
        };
        let output: OneOrMany<TranslationOutput> = self.client.infer(model, &request).await?;

        output
            .into_first()
            .map(|o| o.translation_text)
            .ok_or_else(|| InferenceError::Parse("empty translation response".to_string()))
    }

    async fn zero_shot(
        &self,
        model: &str,
        text: &str,
        labels: &[String],
    ) -> Result<Vec<LabelScore>, InferenceError> {
        let input = prepare(text);
        if input.is_empty() || labels.is_empty() {
            return Ok(Vec::new());
        }

        let request = InferenceRequest {
            inputs: &input,
            parameters: Some(json!({
                "candidate_labels": labels,
                "multi_label": false,
            })),
        };
        let output: ZeroShotWire = self.client.infer(model, &request).await?;
        Ok(output.into_ranked())
    }

    async fn token_classification(
        &self,
        model: &str,
        text: &str,
    ) -> Result<Vec<EntitySpan>, InferenceError> {
        let input = prepare(text);
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let request = InferenceRequest {
            inputs: &input,
            parameters: Some(json!({ "aggregation_strategy": "simple" })),
        };
        self.client.infer(model, &request).await
    }

    async fn text_classification(
        &self,
        model: &str,
        text: &str,
    ) -> Result<Vec<LabelScore>, InferenceError> {
        let input = prepare(text);
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let request = InferenceRequest {
            inputs: &input,
            parameters: None,
        };
        let output: ClassificationWire = self.client.infer(model, &request).await?;
        Ok(output.into_ranked())
    }
}
