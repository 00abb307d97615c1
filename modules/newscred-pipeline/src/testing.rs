// Test mocks for the worker pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockStore (ArticleStore): stateful in-memory tables
// - MockSampler (LoadSampler): scripted CPU readings
// - ScriptedBackend (InferenceBackend): substring-keyed canned responses

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use inference_client::{EntitySpan, InferenceBackend, InferenceError, LabelScore};
use newscred_common::{trim_stored, ClaimRecord, CompanySentiment, Entity, WorkItem};

use crate::governor::LoadSampler;
use crate::store::{ArticleStore, StoreHealth};

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ArticleRow {
    status: i16,
    text: String,
    text_en: Option<String>,
}

/// Claim-side tables. Cloned to stage a commit so a failure part way
/// through leaves them untouched, like a rolled-back transaction.
#[derive(Clone)]
struct ClaimTables {
    /// claim_hash -> (claim id, article id, entities json)
    claims: HashMap<[u8; 32], (i64, i64, serde_json::Value)>,
    next_claim_id: i64,
    entities: HashMap<(i64, &'static str, usize, usize), Entity>,
    sentiments: HashMap<(i64, i64), String>,
}

impl Default for ClaimTables {
    fn default() -> Self {
        Self {
            claims: HashMap::new(),
            next_claim_id: 1,
            entities: HashMap::new(),
            sentiments: HashMap::new(),
        }
    }
}

impl ClaimTables {
    fn upsert_claim(&mut self, claim: &ClaimRecord) -> i64 {
        let entities = claim.entities_json();
        if let Some(existing) = self.claims.get_mut(&claim.hash) {
            existing.2 = entities;
            return existing.0;
        }
        let id = self.next_claim_id;
        self.next_claim_id += 1;
        self.claims.insert(claim.hash, (id, claim.article_id, entities));
        id
    }

    fn upsert_entities(&mut self, claim_id: i64, entities: &[Entity]) -> u64 {
        for e in entities {
            self.entities
                .insert((claim_id, e.entity_type.as_str(), e.start, e.end), e.clone());
        }
        entities.len() as u64
    }

    fn upsert_company_sentiment(&mut self, claim_id: i64, sentiment: &CompanySentiment) -> u64 {
        self.sentiments.insert(
            (claim_id, sentiment.company_id),
            sentiment.sentiment.as_str().to_string(),
        );
        1
    }
}

#[derive(Default)]
struct MockStoreInner {
    articles: BTreeMap<i64, ArticleRow>,
    companies: Vec<(i64, String)>,
    tables: ClaimTables,
    closed: bool,
}

/// Row counts and contents that must not change when a result is re-committed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub claims: usize,
    pub entities: usize,
    pub sentiments: usize,
    pub claim_ids: Vec<i64>,
    pub translations: Vec<(i64, Option<String>)>,
}

/// In-memory article store. Builder pattern: `.with_article()`,
/// `.with_translated_article()`, `.with_companies()`, `.failing_fetch()`,
/// `.failing_commit()`, `.failing_commit_for()`, `.failing_claim_at()`.
pub struct MockStore {
    inner: Mutex<MockStoreInner>,
    fail_fetch: bool,
    fail_commit: bool,
    fail_commit_for: HashSet<i64>,
    fail_claim_at: Option<usize>,
    fetch_calls: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockStoreInner::default()),
            fail_fetch: false,
            fail_commit: false,
            fail_commit_for: HashSet::new(),
            fail_claim_at: None,
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_article(self, id: i64, text: &str) -> Self {
        self.inner.lock().unwrap().articles.insert(
            id,
            ArticleRow {
                status: 0,
                text: text.to_string(),
                text_en: None,
            },
        );
        self
    }

    pub fn with_status(self, id: i64, status: i16) -> Self {
        if let Some(a) = self.inner.lock().unwrap().articles.get_mut(&id) {
            a.status = status;
        }
        self
    }

    pub fn with_translated_article(self, id: i64, text: &str, text_en: &str) -> Self {
        self.inner.lock().unwrap().articles.insert(
            id,
            ArticleRow {
                status: 0,
                text: text.to_string(),
                text_en: Some(text_en.to_string()),
            },
        );
        self
    }

    pub fn with_companies(self, companies: Vec<(i64, &str)>) -> Self {
        self.inner.lock().unwrap().companies = companies
            .into_iter()
            .map(|(id, name)| (id, name.to_string()))
            .collect();
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_commit_for(mut self, article_id: i64) -> Self {
        self.fail_commit_for.insert(article_id);
        self
    }

    /// Reject the `n`th claim (1-based) of every `commit_claims` call.
    pub fn failing_claim_at(mut self, n: usize) -> Self {
        self.fail_claim_at = Some(n);
        self
    }

    /// Article ids that have at least one stored claim.
    pub fn articles_with_claims(&self) -> Vec<i64> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<i64> = inner.tables.claims.values().map(|(_, a, _)| *a).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn translation(&self, article_id: i64) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .articles
            .get(&article_id)
            .and_then(|a| a.text_en.clone())
    }

    pub fn status(&self, article_id: i64) -> Option<i16> {
        self.inner
            .lock()
            .unwrap()
            .articles
            .get(&article_id)
            .map(|a| a.status)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock().unwrap();
        let tables = &inner.tables;
        let mut claim_ids: Vec<i64> = tables.claims.values().map(|(id, _, _)| *id).collect();
        claim_ids.sort_unstable();
        StoreSnapshot {
            claims: tables.claims.len(),
            entities: tables.entities.len(),
            sentiments: tables.sentiments.len(),
            claim_ids,
            translations: inner
                .articles
                .iter()
                .map(|(id, a)| (*id, a.text_en.clone()))
                .collect(),
        }
    }

    fn check_commit(&self, article_id: i64) -> Result<()> {
        if self.fail_commit || self.fail_commit_for.contains(&article_id) {
            bail!("MockStore: commit failure injected for article {article_id}");
        }
        Ok(())
    }

    fn pending(
        &self,
        limit: i64,
        eligible: impl Fn(&MockStoreInner, i64, &ArticleRow) -> bool,
    ) -> Result<Vec<WorkItem>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            bail!("MockStore: fetch failure injected");
        }
        let guard = self.inner.lock().unwrap();
        let inner: &MockStoreInner = &guard;
        Ok(inner
            .articles
            .iter()
            .rev()
            .filter(|(id, a)| eligible(inner, **id, *a))
            .take(limit.max(0) as usize)
            .map(|(id, a)| row_to_item(*id, a))
            .collect())
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

fn row_to_item(id: i64, row: &ArticleRow) -> WorkItem {
    let item = WorkItem::new(id, row.text.clone());
    match &row.text_en {
        Some(t) if !trim_stored(t).is_empty() => item.with_translation(t.clone()),
        _ => item,
    }
}

fn has_claims(inner: &MockStoreInner, article_id: i64) -> bool {
    inner.tables.claims.values().any(|(_, a, _)| *a == article_id)
}

fn has_translation(row: &ArticleRow) -> bool {
    row.text_en.as_deref().is_some_and(|t| !trim_stored(t).is_empty())
}

#[async_trait]
impl ArticleStore for MockStore {
    async fn pending_translations(&self, limit: i64, min_chars: usize) -> Result<Vec<WorkItem>> {
        self.pending(limit, |_, _, a| {
            a.status == 0
                && trim_stored(&a.text).chars().count() >= min_chars.max(1)
                && !has_translation(a)
        })
    }

    async fn pending_extractions(&self, limit: i64, min_chars: usize) -> Result<Vec<WorkItem>> {
        self.pending(limit, |inner, id, a| {
            a.status == 0
                && row_to_item(id, a).english_text().chars().count() > min_chars
                && !has_claims(inner, id)
        })
    }

    async fn active_companies(&self) -> Result<Vec<(i64, String)>> {
        Ok(self.inner.lock().unwrap().companies.clone())
    }

    async fn upsert_translation(
        &self,
        article_id: i64,
        text: &str,
        _provider: &str,
        _translated_at: DateTime<Utc>,
    ) -> Result<u64> {
        self.check_commit(article_id)?;
        let mut inner = self.inner.lock().unwrap();
        match inner.articles.get_mut(&article_id) {
            Some(a) => {
                a.text_en = Some(text.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn commit_claims(&self, article_id: i64, claims: &[ClaimRecord]) -> Result<u64> {
        self.check_commit(article_id)?;
        let mut inner = self.inner.lock().unwrap();
        let mut staged = inner.tables.clone();
        let mut rows = 0;
        for (n, claim) in claims.iter().enumerate() {
            if self.fail_claim_at == Some(n + 1) {
                bail!("MockStore: claim {} of article {article_id} rejected", n + 1);
            }
            let claim_id = staged.upsert_claim(claim);
            rows += 1 + staged.upsert_entities(claim_id, &claim.entities);
            if let Some(sentiment) = &claim.company_sentiment {
                rows += staged.upsert_company_sentiment(claim_id, sentiment);
            }
        }
        inner.tables = staged;
        Ok(rows)
    }

    async fn reset_article(&self, article_id: i64) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.articles.get_mut(&article_id) {
            Some(a) => {
                a.status = 0;
                1
            }
            None => 0,
        })
    }

    async fn clear_translation(&self, article_id: i64) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.articles.get_mut(&article_id) {
            Some(a) => {
                a.text_en = None;
                1
            }
            None => 0,
        })
    }

    async fn health(
        &self,
        min_translation_chars: usize,
        min_extraction_chars: usize,
    ) -> Result<StoreHealth> {
        let pending_translation = self
            .pending_translations(i64::MAX, min_translation_chars)
            .await?
            .len() as i64;
        let pending_extraction = self
            .pending_extractions(i64::MAX, min_extraction_chars)
            .await?
            .len() as i64;
        let inner = self.inner.lock().unwrap();
        Ok(StoreHealth {
            articles: inner.articles.len() as i64,
            texts: inner.articles.len() as i64,
            translated: inner.articles.values().filter(|a| has_translation(a)).count() as i64,
            claims: inner.tables.claims.len() as i64,
            entities: inner.tables.entities.len() as i64,
            sentiments: inner.tables.sentiments.len() as i64,
            pending_translation,
            pending_extraction,
        })
    }

    async fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }
}

// ---------------------------------------------------------------------------
// MockSampler
// ---------------------------------------------------------------------------

/// Plays back CPU readings in order, repeating the last one. `None` entries
/// are sampling failures.
pub struct MockSampler {
    readings: Vec<Option<f32>>,
    calls: AtomicUsize,
}

impl MockSampler {
    pub fn fixed(cpu: f32) -> Self {
        Self::sequence(vec![Some(cpu)])
    }

    pub fn failing() -> Self {
        Self::sequence(vec![None])
    }

    pub fn sequence(readings: Vec<Option<f32>>) -> Self {
        Self {
            readings,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoadSampler for MockSampler {
    async fn sample(&self) -> Result<f32> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let reading = self
            .readings
            .get(n)
            .or_else(|| self.readings.last())
            .copied()
            .flatten();
        match reading {
            Some(cpu) => Ok(cpu),
            None => bail!("MockSampler: sampling failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedBackend
// ---------------------------------------------------------------------------

type TranslateFn = Box<dyn Fn(&str) -> Result<String, InferenceError> + Send + Sync>;

/// Inference backend answering from canned responses. Rules match when the
/// input contains the key (an empty key matches everything); the first
/// registered match wins. Unmatched classification calls return no labels.
pub struct ScriptedBackend {
    translate: Option<TranslateFn>,
    zero_shot: Vec<(String, Vec<LabelScore>)>,
    entities: Vec<(String, Vec<EntitySpan>)>,
    sentiment: Vec<(String, Vec<LabelScore>)>,
    calls: AtomicUsize,
    sentiment_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            translate: None,
            zero_shot: Vec::new(),
            entities: Vec::new(),
            sentiment: Vec::new(),
            calls: AtomicUsize::new(0),
            sentiment_calls: AtomicUsize::new(0),
        }
    }

    pub fn translate_with(
        mut self,
        f: impl Fn(&str) -> Result<String, InferenceError> + Send + Sync + 'static,
    ) -> Self {
        self.translate = Some(Box::new(f));
        self
    }

    pub fn on_zero_shot(mut self, key: &str, labels: Vec<LabelScore>) -> Self {
        self.zero_shot.push((key.to_string(), labels));
        self
    }

    pub fn on_entities(mut self, key: &str, spans: Vec<EntitySpan>) -> Self {
        self.entities.push((key.to_string(), spans));
        self
    }

    pub fn on_sentiment(mut self, key: &str, labels: Vec<LabelScore>) -> Self {
        self.sentiment.push((key.to_string(), labels));
        self
    }

    /// Remote calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sentiment_calls(&self) -> usize {
        self.sentiment_calls.load(Ordering::SeqCst)
    }

    fn lookup<T: Clone>(rules: &[(String, Vec<T>)], input: &str) -> Vec<T> {
        rules
            .iter()
            .find(|(key, _)| input.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn translate(&self, _model: &str, text: &str) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.translate {
            Some(f) => f(text),
            None => Err(InferenceError::Api {
                status: 404,
                body: "ScriptedBackend: no translation registered".to_string(),
            }),
        }
    }

    async fn zero_shot(
        &self,
        _model: &str,
        text: &str,
        _labels: &[String],
    ) -> Result<Vec<LabelScore>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::lookup(&self.zero_shot, text))
    }

    async fn token_classification(
        &self,
        _model: &str,
        text: &str,
    ) -> Result<Vec<EntitySpan>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::lookup(&self.entities, text))
    }

    async fn text_classification(
        &self,
        _model: &str,
        text: &str,
    ) -> Result<Vec<LabelScore>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sentiment_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::lookup(&self.sentiment, text))
    }
}
