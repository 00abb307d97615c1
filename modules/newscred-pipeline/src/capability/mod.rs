// One job the generic worker loop can run.
//
// TranslationCapability: Hungarian base text to English.
// ExtractionCapability: claims, entities and company sentiment.

pub mod extraction;
pub mod translation;

use async_trait::async_trait;

use newscred_common::{Pacing, TransformResult, WorkItem};

use crate::source::Eligibility;

pub use extraction::ExtractionCapability;
pub use translation::TranslationCapability;

/// Capability-specific counters for one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemTally {
    pub claims: u64,
    pub entities: u64,
    pub sentiments: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Nothing to do for this item. It is not an error.
    Skipped(String),
    /// Processing produced nothing usable. Nothing is committed.
    Failed(String),
    /// Ready to commit.
    Ready {
        result: TransformResult,
        tally: ItemTally,
    },
}

#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;

    fn eligibility(&self) -> Eligibility;

    fn pacing(&self) -> Pacing;

    /// Segment, transform and assemble one item. Remote failures are
    /// absorbed per segment; this never touches the store.
    async fn process(&self, item: &WorkItem) -> ItemOutcome;
}
