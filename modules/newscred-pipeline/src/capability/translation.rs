use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use inference_client::InferenceBackend;
use newscred_common::config::{InferenceConfig, TranslationConfig};
use newscred_common::{Pacing, TransformResult, WorkItem};

use super::{Capability, ItemOutcome, ItemTally};
use crate::segmenter::segment;
use crate::source::Eligibility;
use crate::transform::{RetryPolicy, Translate, TransformClient};

pub struct TranslationCapability {
    client: TransformClient,
    op: Translate,
    provider: String,
    max_chars: usize,
    min_text_chars: usize,
    pacing: Pacing,
}

impl TranslationCapability {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        inference: &InferenceConfig,
        config: &TranslationConfig,
    ) -> Self {
        let policy = RetryPolicy::new(inference.max_retries, config.max_chars_per_chunk)
            .with_max_bisect_depth(inference.max_bisect_depth);
        Self {
            client: TransformClient::new(policy),
            op: Translate::new(backend, config.model.clone()),
            provider: inference.provider.clone(),
            max_chars: config.max_chars_per_chunk,
            min_text_chars: config.min_text_chars,
            pacing: config.pacing(),
        }
    }
}

#[async_trait]
impl Capability for TranslationCapability {
    fn name(&self) -> &'static str {
        "translation"
    }

    fn eligibility(&self) -> Eligibility {
        Eligibility::Translation {
            min_chars: self.min_text_chars,
        }
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    async fn process(&self, item: &WorkItem) -> ItemOutcome {
        let text = item.base_text();
        let chars = text.chars().count();
        if chars == 0 || chars < self.min_text_chars {
            return ItemOutcome::Skipped(format!("text too short ({chars} chars)"));
        }

        let segments = segment(text, self.max_chars);
        let mut translated = Vec::with_capacity(segments.len());
        let mut failed = 0usize;

        for (i, seg) in segments.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing.between_requests).await;
            }
            match self.client.run(&self.op, seg).await {
                Some(out) if !out.trim().is_empty() => translated.push(out.trim().to_string()),
                Some(_) => debug!(article_id = item.article_id, segment = i, "Empty translation"),
                None => failed += 1,
            }
        }

        info!(
            article_id = item.article_id,
            chars,
            segments = segments.len(),
            failed_segments = failed,
            "Translated"
        );

        let text_en = translated.join("\n").trim().to_string();
        if text_en.is_empty() {
            return ItemOutcome::Failed("no segment translated".to_string());
        }

        ItemOutcome::Ready {
            result: TransformResult::Translation {
                text: text_en,
                provider: self.provider.clone(),
                translated_at: Utc::now(),
            },
            tally: ItemTally::default(),
        }
    }
}
