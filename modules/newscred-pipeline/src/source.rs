use std::sync::Arc;

use tracing::warn;

use newscred_common::WorkItem;

use crate::store::ArticleStore;

/// Which prerequisite state makes an article eligible. Lengths are counted
/// on trimmed text, the same way the capability measures it, so every
/// fetched item is one the capability will actually work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Base text of at least `min_chars` (and never empty), no translation yet.
    Translation { min_chars: usize },
    /// English-or-base text longer than `min_chars`, no claims yet.
    Extraction { min_chars: usize },
}

/// Work Source: bounded, newest-first batches of eligible articles.
#[derive(Clone)]
pub struct WorkSource {
    store: Arc<dyn ArticleStore>,
    eligibility: Eligibility,
}

impl WorkSource {
    pub fn new(store: Arc<dyn ArticleStore>, eligibility: Eligibility) -> Self {
        Self { store, eligibility }
    }

    /// Pure read. A store error is logged and reads as an empty batch, so the
    /// caller idles and retries on the next iteration.
    pub async fn fetch_batch(&self, limit: i64) -> Vec<WorkItem> {
        let result = match self.eligibility {
            Eligibility::Translation { min_chars } => {
                self.store.pending_translations(limit, min_chars).await
            }
            Eligibility::Extraction { min_chars } => {
                self.store.pending_extractions(limit, min_chars).await
            }
        };

        match result {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, eligibility = ?self.eligibility, "Failed to fetch batch");
                Vec::new()
            }
        }
    }
}
