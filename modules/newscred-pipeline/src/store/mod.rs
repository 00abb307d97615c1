// Persistence boundary for both workers and the admin tool.
//
// ArticleStore: everything a worker reads or writes. Postgres in production,
//   MockStore (crate::testing) in unit tests.

pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use newscred_common::{ClaimRecord, WorkItem};

pub use postgres::PgStore;

/// Row counts for the admin `health` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreHealth {
    pub articles: i64,
    pub texts: i64,
    pub translated: i64,
    pub claims: i64,
    pub entities: i64,
    pub sentiments: i64,
    pub pending_translation: i64,
    pub pending_extraction: i64,
}

impl std::fmt::Display for StoreHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "articles:            {}", self.articles)?;
        writeln!(f, "article texts:       {}", self.texts)?;
        writeln!(f, "translated:          {}", self.translated)?;
        writeln!(f, "claims:              {}", self.claims)?;
        writeln!(f, "entities:            {}", self.entities)?;
        writeln!(f, "company sentiments:  {}", self.sentiments)?;
        writeln!(f, "pending translation: {}", self.pending_translation)?;
        write!(f, "pending extraction:  {}", self.pending_extraction)
    }
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Articles whose trimmed base text has at least `min_chars` characters
    /// (and is never empty) and that have no translation, newest first.
    async fn pending_translations(&self, limit: i64, min_chars: usize) -> Result<Vec<WorkItem>>;

    /// Articles with no claims whose trimmed English-or-base text is longer
    /// than `min_chars`, newest first. A blank translation counts as none.
    async fn pending_extractions(&self, limit: i64, min_chars: usize) -> Result<Vec<WorkItem>>;

    /// `(id, name)` of active catalog companies.
    async fn active_companies(&self) -> Result<Vec<(i64, String)>>;

    /// Write the translation keyed by article id. Returns rows affected.
    async fn upsert_translation(
        &self,
        article_id: i64,
        text: &str,
        provider: &str,
        translated_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Upsert every claim of one article with its entities and company
    /// sentiment, all or nothing. Claims are keyed by hash, entities by
    /// (claim, type, span), sentiment by (claim, company). Returns rows
    /// affected. On error nothing is written and the article stays eligible.
    async fn commit_claims(&self, article_id: i64, claims: &[ClaimRecord]) -> Result<u64>;

    /// Put an article back into the fetch queue.
    async fn reset_article(&self, article_id: i64) -> Result<u64>;

    /// Drop an article's translation so the translation worker picks it up again.
    async fn clear_translation(&self, article_id: i64) -> Result<u64>;

    /// Row counts plus pending work, using the same predicates as the two
    /// pending queries.
    async fn health(
        &self,
        min_translation_chars: usize,
        min_extraction_chars: usize,
    ) -> Result<StoreHealth>;

    async fn close(&self) {}
}
