use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct InferenceRequest<'a> {
    pub inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Pipelines answer with either a bare object or a one-element list
/// depending on the model revision.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) => items.into_iter().next(),
            OneOrMany::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranslationOutput {
    pub translation_text: String,
}

/// A single label with its probability.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Zero-shot output: the legacy pipeline shape (`labels` + `scores`) or the
/// router's ranked list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ZeroShotWire {
    Ranked(Vec<LabelScore>),
    Legacy(LegacyZeroShot),
    LegacyList(Vec<LegacyZeroShot>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct LegacyZeroShot {
    pub labels: Vec<String>,
    pub scores: Vec<f32>,
}

impl ZeroShotWire {
    /// Flatten into label/score pairs, highest score first.
    pub fn into_ranked(self) -> Vec<LabelScore> {
        let mut ranked = match self {
            ZeroShotWire::Ranked(items) => items,
            ZeroShotWire::Legacy(legacy) => legacy.into_pairs(),
            ZeroShotWire::LegacyList(list) => list
                .into_iter()
                .next()
                .map(LegacyZeroShot::into_pairs)
                .unwrap_or_default(),
        };
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

impl LegacyZeroShot {
    fn into_pairs(self) -> Vec<LabelScore> {
        self.labels
            .into_iter()
            .zip(self.scores)
            .map(|(label, score)| LabelScore { label, score })
            .collect()
    }
}

/// One aggregated entity group from a token-classification pipeline.
/// Offsets are character positions in the input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntitySpan {
    #[serde(alias = "entity")]
    pub entity_group: String,
    #[serde(default)]
    pub word: String,
    pub score: f32,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

/// Text classification returns `[[{label, score}, ..]]` from most models and
/// a flat list from a few.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ClassificationWire {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ClassificationWire {
    pub fn into_ranked(self) -> Vec<LabelScore> {
        let mut ranked = match self {
            ClassificationWire::Nested(rows) => rows.into_iter().next().unwrap_or_default(),
            ClassificationWire::Flat(items) => items,
        };
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}
