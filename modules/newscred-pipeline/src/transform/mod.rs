//! Transform Client: one remote capability call per segment with retry,
//! backoff and bisection.
//!
//! Failure handling follows the backend's [`FailureClass`]:
//! - overloaded and timeout are retried with an attempt-scaled backoff up to
//!   `max_retries`;
//! - input-rejected bisects the segment when it is longer than
//!   `bisect_above_chars` and merges both halves, otherwise gives up;
//! - anything else gives up immediately.
//!
//! Giving up is per segment. Callers skip that segment's contribution.

pub mod ops;

use std::time::Duration;

use async_trait::async_trait;
use inference_client::{FailureClass, InferenceError};
use tracing::{debug, warn};

pub use ops::{ClassifySentiment, DetectClaim, ExtractEntities, Translate};

/// One remote text transformation.
#[async_trait]
pub trait Transform: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    /// A single remote call. No retries here.
    async fn call(&self, input: &str) -> Result<Self::Output, InferenceError>;

    /// Combine the outputs of two bisected halves. `left_chars` is the
    /// character length of the left half. `None` means this output cannot be
    /// assembled from halves, so input-rejected is terminal.
    fn merge(
        &self,
        _left: Self::Output,
        _right: Self::Output,
        _left_chars: usize,
    ) -> Option<Self::Output> {
        None
    }
}

/// `base + step * attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub step: Duration,
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base + self.step * attempt
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub overloaded: Backoff,
    pub timeout: Backoff,
    pub bisect_above_chars: usize,
    pub max_bisect_depth: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, bisect_above_chars: usize) -> Self {
        Self {
            max_retries,
            overloaded: Backoff {
                base: Duration::from_secs(1),
                step: Duration::from_secs(1),
            },
            timeout: Backoff {
                base: Duration::from_millis(500),
                step: Duration::from_millis(500),
            },
            bisect_above_chars,
            max_bisect_depth: 12,
        }
    }

    pub fn with_max_bisect_depth(mut self, depth: u32) -> Self {
        self.max_bisect_depth = depth;
        self
    }
}

enum Attempt<O> {
    Done(O),
    Rejected { attempt: u32 },
    Failed,
}

enum Frame<'a> {
    Visit {
        text: &'a str,
        attempt: u32,
        depth: u32,
    },
    Merge {
        left_chars: usize,
    },
}

/// Split at the character midpoint.
fn bisect(text: &str) -> (&str, &str) {
    let half = text.chars().count() / 2;
    let mid = text
        .char_indices()
        .nth(half)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_at(mid)
}

#[derive(Debug, Clone)]
pub struct TransformClient {
    policy: RetryPolicy,
}

impl TransformClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Transform one segment. `None` means this segment contributes nothing.
    ///
    /// Bisection runs on an explicit stack: halves are visited left to right
    /// and merged in post-order, so the output preserves input order. Both
    /// halves must succeed for the parent to succeed.
    pub async fn run<T: Transform + ?Sized>(&self, op: &T, input: &str) -> Option<T::Output> {
        let mut stack = vec![Frame::Visit {
            text: input,
            attempt: 0,
            depth: 0,
        }];
        let mut done: Vec<T::Output> = Vec::new();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Visit {
                    text,
                    attempt,
                    depth,
                } => match self.attempt(op, text, attempt).await {
                    Attempt::Done(output) => done.push(output),
                    Attempt::Rejected { attempt } => {
                        let chars = text.chars().count();
                        if chars <= self.policy.bisect_above_chars {
                            warn!(op = op.name(), chars, "Input rejected and too short to split");
                            return None;
                        }
                        if depth >= self.policy.max_bisect_depth {
                            warn!(op = op.name(), chars, depth, "Input rejected at bisection depth limit");
                            return None;
                        }
                        debug!(op = op.name(), chars, depth, "Input rejected, splitting");
                        let (left, right) = bisect(text);
                        stack.push(Frame::Merge {
                            left_chars: left.chars().count(),
                        });
                        stack.push(Frame::Visit {
                            text: right,
                            attempt,
                            depth: depth + 1,
                        });
                        stack.push(Frame::Visit {
                            text: left,
                            attempt,
                            depth: depth + 1,
                        });
                    }
                    Attempt::Failed => return None,
                },
                Frame::Merge { left_chars } => {
                    let right = done.pop()?;
                    let left = done.pop()?;
                    match op.merge(left, right, left_chars) {
                        Some(merged) => done.push(merged),
                        None => {
                            warn!(op = op.name(), "Rejected input cannot be assembled from halves");
                            return None;
                        }
                    }
                }
            }
        }

        done.pop()
    }

    /// Call until success, rejection, or a terminal failure.
    async fn attempt<T: Transform + ?Sized>(
        &self,
        op: &T,
        input: &str,
        mut attempt: u32,
    ) -> Attempt<T::Output> {
        loop {
            if attempt > self.policy.max_retries {
                warn!(
                    op = op.name(),
                    chars = input.chars().count(),
                    max_retries = self.policy.max_retries,
                    "Max retries exceeded"
                );
                return Attempt::Failed;
            }

            let err = match op.call(input).await {
                Ok(output) => return Attempt::Done(output),
                Err(err) => err,
            };

            let wait = match err.class() {
                FailureClass::Overloaded => self.policy.overloaded.delay(attempt),
                FailureClass::Timeout => self.policy.timeout.delay(attempt),
                FailureClass::InputRejected => return Attempt::Rejected { attempt },
                FailureClass::Other => {
                    warn!(op = op.name(), error = %err, "Inference failed");
                    return Attempt::Failed;
                }
            };

            warn!(
                op = op.name(),
                error = %err,
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                wait_ms = wait.as_millis() as u64,
                "Retrying"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}
