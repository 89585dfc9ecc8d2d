//! Transfer aggregator for merging results from all chain adapters.
//!
//! Runs the enabled adapters concurrently and provides a unified, ranked view.

use crate::adapter::{AdapterKind, ChainAdapter};
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use whale_core::{sort_by_usd_desc, AdapterQuery, Transfer, TransferFeed};

/// Maximum transfers in a merged feed.
pub const DEFAULT_FEED_LIMIT: usize = 50;

/// Wall-clock bound on a single adapter's fetch.
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(25);

/// Merge adapter batches into one ranked list.
///
/// Batches are flattened in order, duplicates by hash keep the first
/// occurrence, the result is stably sorted by USD value descending and
/// truncated to `limit`. Merging an already merged list is a no-op.
pub fn merge_transfers<I>(batches: I, limit: usize) -> Vec<Transfer>
where
    I: IntoIterator<Item = Vec<Transfer>>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for batch in batches {
        for transfer in batch {
            if seen.insert(transfer.tx_hash.clone()) {
                merged.push(transfer);
            }
        }
    }

    sort_by_usd_desc(&mut merged);
    merged.truncate(limit);
    merged
}

/// Per-adapter outcome of one poll, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterReport {
    pub adapter: AdapterKind,
    /// Qualifying transfers returned by the adapter
    pub count: usize,
    /// Largest transfer returned, if any
    pub sample: Option<Transfer>,
    pub note: Option<String>,
    pub elapsed_ms: u64,
    pub timed_out: bool,
}

/// Result of polling all enabled adapters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedFeed {
    pub items: Vec<Transfer>,
    pub notes: Vec<String>,
    pub reports: Vec<AdapterReport>,
}

/// Concurrent poller over a fixed set of adapters.
#[derive(Clone)]
pub struct FeedAggregator {
    adapters: Vec<Arc<dyn ChainAdapter>>,
    adapter_timeout: Duration,
    limit: usize,
    /// Latest report per adapter
    last_reports: Arc<DashMap<AdapterKind, AdapterReport>>,
}

impl FeedAggregator {
    /// Create an aggregator. Adapter order is the merge order.
    pub fn new(adapters: Vec<Arc<dyn ChainAdapter>>) -> Self {
        Self {
            adapters,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            limit: DEFAULT_FEED_LIMIT,
            last_reports: Arc::new(DashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn adapter_timeout(&self) -> Duration {
        self.adapter_timeout
    }

    /// Poll the enabled adapters concurrently and merge their results.
    ///
    /// An adapter that exceeds the timeout contributes nothing but a note.
    pub async fn poll(&self, enabled: &[AdapterKind], query: &AdapterQuery) -> AggregatedFeed {
        let started = Instant::now();
        let selected: Vec<&Arc<dyn ChainAdapter>> = self
            .adapters
            .iter()
            .filter(|a| enabled.contains(&a.kind()))
            .collect();

        let fetches = selected.iter().map(|adapter| async move {
            let start = Instant::now();
            let kind = adapter.kind();
            match tokio::time::timeout(self.adapter_timeout, adapter.fetch(query)).await {
                Ok(feed) => (kind, feed, start.elapsed(), false),
                Err(_) => {
                    warn!(adapter = kind.as_str(), timeout = ?self.adapter_timeout, "Adapter timed out");
                    let note = format!(
                        "{} adapter timed out after {}s",
                        kind,
                        self.adapter_timeout.as_secs()
                    );
                    (kind, TransferFeed::empty_with_note(note), start.elapsed(), true)
                }
            }
        });
        let results = join_all(fetches).await;

        let mut notes = Vec::new();
        let mut reports = Vec::with_capacity(results.len());
        let mut batches = Vec::with_capacity(results.len());

        for (kind, feed, elapsed, timed_out) in results {
            let report = AdapterReport {
                adapter: kind,
                count: feed.items.len(),
                sample: feed.items.first().cloned(),
                note: feed.note.clone(),
                elapsed_ms: elapsed.as_millis() as u64,
                timed_out,
            };
            self.last_reports.insert(kind, report.clone());
            reports.push(report);

            if let Some(note) = feed.note {
                notes.push(note);
            }
            batches.push(feed.items);
        }

        let items = merge_transfers(batches, self.limit);
        info!(
            adapters = reports.len(),
            items = items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Poll merged"
        );

        AggregatedFeed {
            items,
            notes,
            reports,
        }
    }

    /// Latest report of one adapter.
    pub fn last_report(&self, kind: AdapterKind) -> Option<AdapterReport> {
        self.last_reports.get(&kind).map(|r| r.value().clone())
    }

    /// Latest reports in adapter order.
    pub fn last_reports(&self) -> Vec<AdapterReport> {
        AdapterKind::all()
            .iter()
            .filter_map(|kind| self.last_report(*kind))
            .collect()
    }
}
