//! Application state management.

use crate::prices::PriceCache;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use whale_core::units::now_secs;
use whale_core::{PriceMap, Transfer};
use whale_feeds::{AdapterReport, AggregatedFeed};

/// Counters for the running process.
#[derive(Debug, Default)]
pub struct WatcherStats {
    /// Completed poll cycles.
    pub polls: AtomicU64,
    /// Poll cycles skipped because prices were not loaded.
    pub polls_skipped: AtomicU64,
    /// Transfers in merged feeds, summed over polls.
    pub transfers_seen: AtomicU64,
    /// Webhook calls that succeeded.
    pub alerts_sent: AtomicU64,
    /// Webhook calls that failed.
    pub alerts_failed: AtomicU64,
    /// Start time in unix seconds.
    pub started_at: AtomicU64,
}

impl WatcherStats {
    pub fn new() -> Self {
        Self {
            started_at: AtomicU64::new(now_secs()),
            ..Default::default()
        }
    }

    pub fn record_poll(&self, transfers: usize) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.transfers_seen
            .fetch_add(transfers as u64, Ordering::Relaxed);
    }

    pub fn record_skipped_poll(&self) {
        self.polls_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alerts(&self, delivered: usize, failed: usize) {
        self.alerts_sent.fetch_add(delivered as u64, Ordering::Relaxed);
        self.alerts_failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        now_secs().saturating_sub(self.started_at.load(Ordering::Relaxed))
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            uptime_secs: self.uptime_secs(),
            polls: self.polls.load(Ordering::Relaxed),
            polls_skipped: self.polls_skipped.load(Ordering::Relaxed),
            transfers_seen: self.transfers_seen.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            alerts_failed: self.alerts_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WatcherStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub uptime_secs: u64,
    pub polls: u64,
    pub polls_skipped: u64,
    pub transfers_seen: u64,
    pub alerts_sent: u64,
    pub alerts_failed: u64,
}

/// Result of the latest poll cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    pub items: Vec<Transfer>,
    pub notes: Vec<String>,
    pub adapters: Vec<AdapterReport>,
    pub prices: PriceMap,
    pub polled_at: DateTime<Utc>,
}

impl PollSnapshot {
    pub fn new(feed: AggregatedFeed, prices: PriceMap) -> Self {
        Self {
            items: feed.items,
            notes: feed.notes,
            adapters: feed.reports,
            prices,
            polled_at: Utc::now(),
        }
    }
}

/// Indexer keys found at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderKeys {
    pub alchemy: bool,
    pub helius: bool,
}

/// Shared application state.
pub struct AppState {
    pub stats: WatcherStats,
    pub prices: PriceCache,
    pub keys: ProviderKeys,
    latest: RwLock<Option<PollSnapshot>>,
    running: AtomicBool,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(keys: ProviderKeys) -> Self {
        Self {
            stats: WatcherStats::new(),
            prices: PriceCache::new(),
            keys,
            latest: RwLock::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub async fn set_snapshot(&self, snapshot: PollSnapshot) {
        *self.latest.write().await = Some(snapshot);
    }

    pub async fn snapshot(&self) -> Option<PollSnapshot> {
        self.latest.read().await.clone()
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Create shared state.
pub fn create_state(keys: ProviderKeys) -> SharedState {
    Arc::new(AppState::new(keys))
}
