//! Worker Orchestrator: the admission → fetch → process → commit loop
//! shared by every capability.
//!
//! States: `Idle → FetchGate → Fetching → ItemGate → Processing → Committing
//! → (loop) → Draining → Stopped`. Every sleep races the cancellation token;
//! remote calls and commits for the current item do not, so an item that has
//! started is always finished before the worker stops.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use newscred_common::{NewscredError, WorkItem};

use crate::capability::{Capability, ItemOutcome, ItemTally};
use crate::committer::ResultCommitter;
use crate::governor::LoadGovernor;
use crate::source::WorkSource;
use crate::store::ArticleStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    FetchGate,
    Fetching,
    ItemGate,
    Processing,
    Committing,
    Draining,
    Stopped,
}

/// Stats from a worker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub iterations: u64,
    pub batches: u64,
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub claims: u64,
    pub entities: u64,
    pub sentiments: u64,
}

impl RunStats {
    fn record(&mut self, tally: ItemTally) {
        self.processed += 1;
        self.claims += tally.claims;
        self.entities += tally.entities;
        self.sentiments += tally.sentiments;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iterations={} batches={} processed={} skipped={} failed={} claims={} entities={} sentiments={}",
            self.iterations, self.batches, self.processed, self.skipped,
            self.failed, self.claims, self.entities, self.sentiments,
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// How a batch ended.
enum BatchEnd {
    Completed,
    /// Load went over the ceiling before an item.
    Throttled,
    Cancelled,
}

pub struct Worker<C: Capability> {
    capability: C,
    source: WorkSource,
    committer: ResultCommitter,
    store: Arc<dyn ArticleStore>,
    governor: LoadGovernor,
    cancel: CancellationToken,
    state: WorkerState,
    stats: RunStats,
}

impl<C: Capability> Worker<C> {
    pub fn new(
        capability: C,
        store: Arc<dyn ArticleStore>,
        governor: LoadGovernor,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source: WorkSource::new(store.clone(), capability.eligibility()),
            committer: ResultCommitter::new(store.clone()),
            capability,
            store,
            governor,
            cancel,
            state: WorkerState::Idle,
            stats: RunStats::default(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, next: WorkerState) {
        if self.state != next {
            debug!(capability = self.capability.name(), from = ?self.state, to = ?next, "State");
            self.state = next;
        }
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Run until cancelled, then release the store.
    pub async fn run(mut self) -> RunStats {
        let pacing = self.capability.pacing();
        info!(
            capability = self.capability.name(),
            batch_size = pacing.batch_size,
            "Worker starting"
        );

        while !self.cancel.is_cancelled() {
            self.stats.iterations += 1;

            self.transition(WorkerState::FetchGate);
            if !self.governor.admit().await {
                if !self.pause(pacing.cooldown).await {
                    break;
                }
                continue;
            }

            self.transition(WorkerState::Fetching);
            let batch = self.source.fetch_batch(pacing.batch_size).await;
            if batch.is_empty() {
                self.transition(WorkerState::Idle);
                info!(
                    capability = self.capability.name(),
                    idle_secs = pacing.idle.as_secs(),
                    "No eligible items, idling"
                );
                if !self.pause(pacing.idle).await {
                    break;
                }
                continue;
            }

            self.stats.batches += 1;
            info!(capability = self.capability.name(), items = batch.len(), "Processing batch");

            match self.run_batch(&batch).await {
                BatchEnd::Cancelled => break,
                BatchEnd::Throttled => {
                    info!(capability = self.capability.name(), "Batch cut short by load");
                }
                BatchEnd::Completed => {}
            }

            info!(capability = self.capability.name(), "Batch complete. {}", self.stats);
            if !self.pause(pacing.between_batches).await {
                break;
            }
        }

        self.transition(WorkerState::Draining);
        self.store.close().await;
        self.transition(WorkerState::Stopped);
        info!(capability = self.capability.name(), "Worker stopped. {}", self.stats);
        self.stats
    }

    async fn run_batch(&mut self, batch: &[WorkItem]) -> BatchEnd {
        let pacing = self.capability.pacing();
        for item in batch {
            if self.cancel.is_cancelled() {
                return BatchEnd::Cancelled;
            }

            self.transition(WorkerState::ItemGate);
            if !self.governor.admit().await {
                return BatchEnd::Throttled;
            }

            self.handle_item(item).await;

            if !self.pause(pacing.between_requests).await {
                return BatchEnd::Cancelled;
            }
        }
        BatchEnd::Completed
    }

    /// Process and commit one item. Never propagates a failure.
    async fn handle_item(&mut self, item: &WorkItem) {
        let article_id = item.article_id;
        self.transition(WorkerState::Processing);

        let outcome = match AssertUnwindSafe(self.capability.process(item))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let err = NewscredError::ItemPanicked {
                    article_id,
                    message: panic_message(payload.as_ref()),
                };
                error!(capability = self.capability.name(), article_id, error = %err, "Item failed");
                self.stats.failed += 1;
                return;
            }
        };

        match outcome {
            ItemOutcome::Skipped(reason) => {
                debug!(capability = self.capability.name(), article_id, reason = reason.as_str(), "Skipped");
                self.stats.skipped += 1;
            }
            ItemOutcome::Failed(reason) => {
                warn!(capability = self.capability.name(), article_id, reason = reason.as_str(), "Item failed");
                self.stats.failed += 1;
            }
            ItemOutcome::Ready { result, tally } => {
                self.transition(WorkerState::Committing);
                match AssertUnwindSafe(self.committer.commit(item, &result))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(rows)) => {
                        info!(capability = self.capability.name(), article_id, rows, "Committed");
                        self.stats.record(tally);
                    }
                    Ok(Err(e)) => {
                        error!(
                            capability = self.capability.name(),
                            article_id,
                            error = %format!("{e:#}"),
                            "Commit failed"
                        );
                        self.stats.failed += 1;
                    }
                    Err(payload) => {
                        let err = NewscredError::ItemPanicked {
                            article_id,
                            message: panic_message(payload.as_ref()),
                        };
                        error!(capability = self.capability.name(), article_id, error = %err, "Commit panicked");
                        self.stats.failed += 1;
                    }
                }
            }
        }
    }
}
