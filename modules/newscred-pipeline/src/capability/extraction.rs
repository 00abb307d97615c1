use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use inference_client::InferenceBackend;
use newscred_common::config::{ExtractionConfig, InferenceConfig};
use newscred_common::{
    ClaimRecord, CompanyIndex, CompanySentiment, Pacing, TransformResult, WorkItem,
};

use super::{Capability, ItemOutcome, ItemTally};
use crate::segmenter::split_sentences;
use crate::source::Eligibility;
use crate::transform::{ClassifySentiment, DetectClaim, ExtractEntities, RetryPolicy, TransformClient};

/// Claims, entities and company sentiment from an article's English text
/// (falling back to the base text when no translation exists).
pub struct ExtractionCapability {
    client: TransformClient,
    detect: DetectClaim,
    entities: ExtractEntities,
    sentiment: ClassifySentiment,
    companies: Arc<CompanyIndex>,
    company_sentiment: bool,
    min_text_chars: usize,
    min_claim_words: usize,
    max_claim_chars: usize,
    max_sentiment_chars: usize,
    pacing: Pacing,
}

impl ExtractionCapability {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        companies: Arc<CompanyIndex>,
        inference: &InferenceConfig,
        config: &ExtractionConfig,
    ) -> Self {
        let policy = RetryPolicy::new(inference.max_retries, config.max_chars_per_chunk)
            .with_max_bisect_depth(inference.max_bisect_depth);
        Self {
            client: TransformClient::new(policy),
            detect: DetectClaim::new(
                backend.clone(),
                config.nli_model.clone(),
                config.nli_labels.clone(),
                config.nli_target_labels.clone(),
            ),
            entities: ExtractEntities::new(
                backend.clone(),
                config.ner_model.clone(),
                config.entity_types.clone(),
            ),
            sentiment: ClassifySentiment::new(backend, config.sentiment_model.clone()),
            companies,
            company_sentiment: config.company_sentiment,
            min_text_chars: config.min_text_chars,
            min_claim_words: config.min_claim_words,
            max_claim_chars: config.max_claim_chars,
            max_sentiment_chars: config.max_sentiment_chars,
            pacing: config.pacing(),
        }
    }

    fn is_candidate(&self, sentence: &str) -> bool {
        sentence.split_whitespace().count() >= self.min_claim_words
            && sentence.chars().count() <= self.max_claim_chars
    }

    async fn pace(&self, first: &mut bool) {
        if !std::mem::take(first) {
            tokio::time::sleep(self.pacing.between_requests).await;
        }
    }

    async fn sentiment_for(&self, claim: &str) -> Option<CompanySentiment> {
        if !self.company_sentiment || claim.chars().count() > self.max_sentiment_chars {
            return None;
        }
        let company = self.companies.find_in(claim)?;
        let sentiment = self.client.run(&self.sentiment, claim).await?;
        Some(CompanySentiment {
            company_id: company.id,
            mention: company.name.clone(),
            sentiment,
        })
    }
}

#[async_trait]
impl Capability for ExtractionCapability {
    fn name(&self) -> &'static str {
        "extraction"
    }

    fn eligibility(&self) -> Eligibility {
        Eligibility::Extraction {
            min_chars: self.min_text_chars,
        }
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    async fn process(&self, item: &WorkItem) -> ItemOutcome {
        let text = item.english_text();
        let chars = text.chars().count();
        if chars <= self.min_text_chars {
            return ItemOutcome::Skipped(format!("text too short ({chars} chars)"));
        }

        let candidates: Vec<&str> = split_sentences(text)
            .into_iter()
            .filter(|s| self.is_candidate(s))
            .collect();

        let mut first = true;
        let mut claims = Vec::new();
        for sentence in &candidates {
            self.pace(&mut first).await;
            if self.client.run(&self.detect, sentence).await == Some(true) {
                claims.push(*sentence);
            }
        }

        if claims.is_empty() {
            return ItemOutcome::Skipped(format!(
                "no claims among {} candidate sentences",
                candidates.len()
            ));
        }

        let mut tally = ItemTally::default();
        let mut records = Vec::with_capacity(claims.len());
        for claim in claims {
            self.pace(&mut first).await;
            let entities = self
                .client
                .run(&self.entities, claim)
                .await
                .unwrap_or_default();

            let sentiment = self.sentiment_for(claim).await;
            if let Some(s) = &sentiment {
                debug!(
                    article_id = item.article_id,
                    company_id = s.company_id,
                    sentiment = s.sentiment.as_str(),
                    "Company sentiment"
                );
            }

            tally.claims += 1;
            tally.entities += entities.len() as u64;
            tally.sentiments += u64::from(sentiment.is_some());
            records.push(ClaimRecord::new(item.article_id, claim, entities, sentiment));
        }

        info!(
            article_id = item.article_id,
            candidates = candidates.len(),
            claims = tally.claims,
            entities = tally.entities,
            sentiments = tally.sentiments,
            "Extracted"
        );

        ItemOutcome::Ready {
            result: TransformResult::Claims(records),
            tally,
        }
    }
}
