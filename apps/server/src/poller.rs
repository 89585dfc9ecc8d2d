//! Poll loop: settings and prices in, merged feed and alerts out.

use crate::config::SettingsStore;
use crate::state::{PollSnapshot, SharedState};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use whale_alerts::{AlertDispatcher, DispatchReport};
use whale_feeds::FeedAggregator;

/// Result of one poll cycle that ran.
pub struct PollOutcome {
    /// Transfers in the merged feed
    pub items: usize,
    /// Background alert dispatch for this cycle
    pub dispatch: JoinHandle<DispatchReport>,
}

/// Drives the aggregator on a fixed cadence.
pub struct Poller {
    state: SharedState,
    settings: SettingsStore,
    aggregator: FeedAggregator,
    dispatcher: AlertDispatcher,
}

impl Poller {
    pub fn new(
        state: SharedState,
        settings: SettingsStore,
        aggregator: FeedAggregator,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            state,
            settings,
            aggregator,
            dispatcher,
        }
    }

    /// Run one poll cycle.
    ///
    /// Returns None when skipped because no prices have loaded yet. Alert
    /// dispatch is spawned so a slow webhook never delays the next poll.
    pub async fn poll_once(&self) -> Option<PollOutcome> {
        if !self.state.prices.is_loaded().await {
            debug!("Skipping poll: prices not loaded");
            self.state.stats.record_skipped_poll();
            return None;
        }

        let settings = self.settings.load().await;
        let prices = self.state.prices.get().await;
        let query = settings.query(prices.clone());
        let enabled = settings.enabled_adapters();

        let feed = self.aggregator.poll(&enabled, &query).await;
        let items = feed.items.len();
        let transfers = feed.items.clone();

        self.state.stats.record_poll(items);
        self.state.set_snapshot(PollSnapshot::new(feed, prices)).await;

        let dispatcher = self.dispatcher.clone();
        let state = self.state.clone();
        let rule = settings.alert_rule();
        let dispatch = tokio::spawn(async move {
            let report = dispatcher.dispatch(&transfers, &rule).await;
            state.stats.record_alerts(report.delivered, report.failed);
            if report.candidates > 0 {
                info!(
                    "Alerts: {} candidates, {} delivered, {} failed",
                    report.candidates, report.delivered, report.failed
                );
            }
            report
        });

        Some(PollOutcome { items, dispatch })
    }

    /// Poll every `interval` until the app stops.
    pub async fn run(self, interval: Duration) {
        info!("Poller started (every {}s)", interval.as_secs());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while self.state.is_running() {
            ticker.tick().await;
            if !self.state.is_running() {
                break;
            }
            if let Some(outcome) = self.poll_once().await {
                info!("Poll complete: {} transfers", outcome.items);
            }
        }

        info!("Poller stopped");
    }
}
