//! Indexer-first provider strategy.
//!
//! A [`FallbackChain`] is an ordered list of named provider steps. Steps run
//! one at a time; results accumulate (first-seen hash wins) and evaluation
//! stops as soon as the accumulated qualifying count reaches the
//! sufficiency threshold. A failing step contributes nothing and the next
//! step runs.

use crate::error::FeedResult;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, warn};
use whale_core::{sort_by_usd_desc, Transfer};

type StepFn<'a> = Box<dyn FnOnce() -> BoxFuture<'a, FeedResult<Vec<Transfer>>> + Send + 'a>;

struct Step<'a> {
    name: &'static str,
    run: StepFn<'a>,
}

/// Result of evaluating a [`FallbackChain`].
#[derive(Debug, Default)]
pub struct ChainOutcome {
    /// Qualifying, deduplicated transfers sorted by USD value descending
    pub items: Vec<Transfer>,
    /// Names of the steps that were executed, in order
    pub attempted: Vec<&'static str>,
    /// Steps that returned an error
    pub failed: Vec<&'static str>,
}

/// Ordered provider steps evaluated short-circuit-on-sufficiency.
pub struct FallbackChain<'a> {
    adapter: &'static str,
    min_usd: f64,
    sufficient_at: usize,
    steps: Vec<Step<'a>>,
}

impl<'a> FallbackChain<'a> {
    /// Create an empty chain. Results are filtered at `min_usd`; evaluation
    /// stops once `sufficient_at` qualifying transfers have accumulated.
    pub fn new(adapter: &'static str, min_usd: f64, sufficient_at: usize) -> Self {
        Self {
            adapter,
            min_usd,
            sufficient_at,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step<F, Fut>(mut self, name: &'static str, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = FeedResult<Vec<Transfer>>> + Send + 'a,
    {
        self.steps.push(Step {
            name,
            run: Box::new(move || f().boxed()),
        });
        self
    }

    /// Evaluate the chain.
    pub async fn run(self) -> ChainOutcome {
        let FallbackChain {
            adapter,
            min_usd,
            sufficient_at,
            steps,
        } = self;

        let mut outcome = ChainOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();

        for step in steps {
            outcome.attempted.push(step.name);
            match (step.run)().await {
                Ok(found) => {
                    let total = found.len();
                    let before = outcome.items.len();
                    for transfer in found {
                        if transfer.qualifies(min_usd) && seen.insert(transfer.tx_hash.clone()) {
                            outcome.items.push(transfer);
                        }
                    }
                    debug!(
                        adapter,
                        step = step.name,
                        decoded = total,
                        added = outcome.items.len() - before,
                        "Provider step finished"
                    );
                }
                Err(e) => {
                    warn!(adapter, step = step.name, error = %e, "Provider step failed");
                    outcome.failed.push(step.name);
                }
            }

            if outcome.items.len() >= sufficient_at {
                break;
            }
        }

        sort_by_usd_desc(&mut outcome.items);
        outcome
    }
}
