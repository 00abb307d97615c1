use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::InferenceRequest;
use crate::error::InferenceError;
use crate::util::truncate_to_char_boundary;

pub(crate) const HF_ROUTER_URL: &str = "https://router.huggingface.co/hf-inference/models";

/// Error bodies are logged and carried in errors; keep them short.
const MAX_ERROR_BODY_BYTES: usize = 150;

pub(crate) struct HuggingFaceClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl HuggingFaceClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.to_string(),
            http,
            base_url: HF_ROUTER_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, InferenceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| InferenceError::Config(format!("invalid API token: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// POST one request to a model and decode the success body.
    /// Non-success statuses are classified by [`InferenceError::from_status`].
    pub async fn infer<T: DeserializeOwned>(
        &self,
        model: &str,
        request: &InferenceRequest<'_>,
    ) -> Result<T, InferenceError> {
        let url = format!("{}/{}", self.base_url, model);

        debug!(model, chars = request.inputs.chars().count(), "Inference request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let error_text = truncate_to_char_boundary(&error_text, MAX_ERROR_BODY_BYTES);
            return Err(InferenceError::from_status(status.as_u16(), error_text));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
