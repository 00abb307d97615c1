use std::sync::Arc;

use async_trait::async_trait;
use inference_client::{InferenceBackend, InferenceError};
use newscred_common::{Entity, EntityType, Sentiment};

use super::Transform;

/// Hungarian to English machine translation.
pub struct Translate {
    backend: Arc<dyn InferenceBackend>,
    model: String,
}

impl Translate {
    pub fn new(backend: Arc<dyn InferenceBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transform for Translate {
    type Output = String;

    fn name(&self) -> &'static str {
        "translate"
    }

    async fn call(&self, input: &str) -> Result<String, InferenceError> {
        self.backend.translate(&self.model, input).await
    }

    fn merge(&self, left: String, right: String, _left_chars: usize) -> Option<String> {
        let joined = [left.trim(), right.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Some(joined)
    }
}

/// Zero-shot check that a sentence reads as one of the target labels.
pub struct DetectClaim {
    backend: Arc<dyn InferenceBackend>,
    model: String,
    labels: Vec<String>,
    targets: Vec<String>,
}

impl DetectClaim {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        model: impl Into<String>,
        labels: Vec<String>,
        targets: Vec<String>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            labels,
            targets,
        }
    }
}

#[async_trait]
impl Transform for DetectClaim {
    type Output = bool;

    fn name(&self) -> &'static str {
        "detect_claim"
    }

    async fn call(&self, input: &str) -> Result<bool, InferenceError> {
        let ranked = self.backend.zero_shot(&self.model, input, &self.labels).await?;
        Ok(ranked
            .first()
            .is_some_and(|top| self.targets.iter().any(|t| t == &top.label)))
    }
}

/// Named-entity recognition restricted to the configured entity types.
pub struct ExtractEntities {
    backend: Arc<dyn InferenceBackend>,
    model: String,
    allowed: Vec<EntityType>,
}

impl ExtractEntities {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        model: impl Into<String>,
        allowed: Vec<EntityType>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            allowed,
        }
    }
}

#[async_trait]
impl Transform for ExtractEntities {
    type Output = Vec<Entity>;

    fn name(&self) -> &'static str {
        "extract_entities"
    }

    async fn call(&self, input: &str) -> Result<Vec<Entity>, InferenceError> {
        let spans = self.backend.token_classification(&self.model, input).await?;
        // The backend trims its input; offsets come back relative to that.
        let lead = input.chars().take_while(|c| c.is_whitespace()).count();

        Ok(spans
            .into_iter()
            .filter_map(|span| {
                let entity_type: EntityType = span.entity_group.parse().ok()?;
                if !self.allowed.contains(&entity_type) {
                    return None;
                }
                let text = span.word.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                let start = span.start.unwrap_or(0);
                let end = span.end.unwrap_or(start + text.chars().count());
                Some(Entity {
                    entity_type,
                    text,
                    score: Entity::normalize_score(span.score),
                    start: start + lead,
                    end: end + lead,
                })
            })
            .collect())
    }

    fn merge(
        &self,
        mut left: Vec<Entity>,
        right: Vec<Entity>,
        left_chars: usize,
    ) -> Option<Vec<Entity>> {
        left.extend(right.into_iter().map(|mut e| {
            e.start += left_chars;
            e.end += left_chars;
            e
        }));
        Some(left)
    }
}

/// Three-way sentiment of a short text.
pub struct ClassifySentiment {
    backend: Arc<dyn InferenceBackend>,
    model: String,
}

impl ClassifySentiment {
    pub fn new(backend: Arc<dyn InferenceBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transform for ClassifySentiment {
    type Output = Sentiment;

    fn name(&self) -> &'static str {
        "classify_sentiment"
    }

    async fn call(&self, input: &str) -> Result<Sentiment, InferenceError> {
        let ranked = self.backend.text_classification(&self.model, input).await?;
        ranked
            .first()
            .map(|top| Sentiment::from_label(&top.label))
            .ok_or_else(|| InferenceError::Parse("no sentiment labels returned".to_string()))
    }
}
