use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// --- WorkItem ---------------------------------------------------------------

/// Whitespace the store's eligibility queries strip with
/// `btrim(x, E' \t\n\r\f')`. Length checks in Rust and SQL both measure text
/// trimmed of exactly this set.
pub fn trim_stored(text: &str) -> &str {
    text.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0C'))
}

/// An article picked up by a worker. Created by ingestion, never deleted here.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub article_id: i64,
    /// Base text as fetched.
    pub text: String,
    /// Existing English translation, if the translation worker got there first.
    pub translation: Option<String>,
}

impl WorkItem {
    pub fn new(article_id: i64, text: impl Into<String>) -> Self {
        Self {
            article_id,
            text: text.into(),
            translation: None,
        }
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Base text, trimmed.
    pub fn base_text(&self) -> &str {
        trim_stored(&self.text)
    }

    /// Trimmed English text when a translation exists, otherwise the trimmed
    /// base text. Mirrors `COALESCE(NULLIF(btrim(text_en), ''), text)`.
    pub fn english_text(&self) -> &str {
        match self.translation.as_deref().map(trim_stored) {
            Some(t) if !t.is_empty() => t,
            _ => self.base_text(),
        }
    }
}

// --- Entities ---------------------------------------------------------------

/// Entity groups the extractor keeps. Anything else a model emits is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "ORG")]
    Org,
    #[serde(rename = "PER")]
    Per,
    #[serde(rename = "LOC")]
    Loc,
    #[serde(rename = "MISC")]
    Misc,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Org,
        EntityType::Per,
        EntityType::Loc,
        EntityType::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Org => "ORG",
            EntityType::Per => "PER",
            EntityType::Loc => "LOC",
            EntityType::Misc => "MISC",
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ORG" => Ok(EntityType::Org),
            "PER" => Ok(EntityType::Per),
            "LOC" => Ok(EntityType::Loc),
            "MISC" => Ok(EntityType::Misc),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// A typed span inside a claim. Offsets are character positions in the claim text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub text: String,
    pub score: f32,
    pub start: usize,
    pub end: usize,
}

impl Entity {
    /// Confidence clamped to [0, 1] and rounded to three decimals.
    pub fn normalize_score(score: f32) -> f32 {
        (score.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
    }
}

// --- Sentiment --------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Map a model label onto the three-way vocabulary. Unknown labels are neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// Sentiment toward one catalog company mentioned in a claim.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanySentiment {
    pub company_id: i64,
    pub mention: String,
    pub sentiment: Sentiment,
}

// --- Claims -----------------------------------------------------------------

/// Trim, collapse whitespace runs, lowercase.
pub fn normalize_for_hash(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Natural key of a claim: SHA-256 over `"{article_id}|{normalized claim}"`.
pub fn claim_hash(article_id: i64, claim_text: &str) -> [u8; 32] {
    let base = format!("{}|{}", article_id, normalize_for_hash(claim_text));
    Sha256::digest(base.as_bytes()).into()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRecord {
    pub article_id: i64,
    pub text: String,
    pub hash: [u8; 32],
    pub entities: Vec<Entity>,
    pub company_sentiment: Option<CompanySentiment>,
}

impl ClaimRecord {
    pub fn new(
        article_id: i64,
        text: impl Into<String>,
        entities: Vec<Entity>,
        company_sentiment: Option<CompanySentiment>,
    ) -> Self {
        let text = text.into();
        Self {
            article_id,
            hash: claim_hash(article_id, &text),
            text,
            entities,
            company_sentiment,
        }
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Entities as stored on the claim row: `{"entities": [...]}`.
    pub fn entities_json(&self) -> serde_json::Value {
        serde_json::json!({ "entities": self.entities })
    }
}

// --- Results ----------------------------------------------------------------

/// What one capability produced for one item.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformResult {
    Translation {
        text: String,
        provider: String,
        translated_at: DateTime<Utc>,
    },
    Claims(Vec<ClaimRecord>),
}

// --- CompanyIndex -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: i64,
    pub name: String,
    needle: String,
}

/// Snapshot of active catalog companies, loaded once per worker start.
#[derive(Debug, Clone, Default)]
pub struct CompanyIndex {
    companies: Vec<Company>,
}

impl CompanyIndex {
    /// Build from `(id, name)` rows. Blank names are ignored; a repeated
    /// name keeps the last id seen.
    pub fn from_rows(rows: impl IntoIterator<Item = (i64, String)>) -> Self {
        let mut companies: Vec<Company> = Vec::new();
        for (id, name) in rows {
            let needle = name.trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            match companies.iter_mut().find(|c| c.needle == needle) {
                Some(existing) => existing.id = id,
                None => companies.push(Company {
                    id,
                    name: name.trim().to_string(),
                    needle,
                }),
            }
        }
        // Longest first so "OTP Bank Nyrt" wins over "OTP Bank".
        companies.sort_by(|a, b| {
            b.needle
                .chars()
                .count()
                .cmp(&a.needle.chars().count())
                .then_with(|| a.needle.cmp(&b.needle))
        });
        Self { companies }
    }

    /// First company whose lowercase name occurs in `text`.
    pub fn find_in(&self, text: &str) -> Option<&Company> {
        let haystack = text.to_lowercase();
        self.companies.iter().find(|c| haystack.contains(&c.needle))
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}
