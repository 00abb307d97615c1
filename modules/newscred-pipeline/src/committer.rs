use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use newscred_common::{TransformResult, WorkItem};

use crate::store::ArticleStore;

/// Result Committer: idempotent upserts keyed on natural identity.
///
/// Translations are keyed by article id, claims by their content hash.
/// Re-committing the same result rewrites the same rows. An article's claims
/// land together or not at all, so a failed commit leaves it eligible.
#[derive(Clone)]
pub struct ResultCommitter {
    store: Arc<dyn ArticleStore>,
}

impl ResultCommitter {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Returns rows affected across every statement issued for the item.
    pub async fn commit(&self, item: &WorkItem, result: &TransformResult) -> Result<u64> {
        match result {
            TransformResult::Translation {
                text,
                provider,
                translated_at,
            } => self
                .store
                .upsert_translation(item.article_id, text, provider, *translated_at)
                .await
                .with_context(|| format!("saving translation for article {}", item.article_id)),
            TransformResult::Claims(claims) => {
                let rows = self
                    .store
                    .commit_claims(item.article_id, claims)
                    .await
                    .with_context(|| {
                        format!(
                            "saving {} claims for article {}",
                            claims.len(),
                            item.article_id
                        )
                    })?;
                debug!(article_id = item.article_id, claims = claims.len(), rows, "Claims committed");
                Ok(rows)
            }
        }
    }
}
