//! USD price cache refreshed from the price oracle.

use crate::state::SharedState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use whale_core::units::now_secs;
use whale_core::{Asset, PriceMap};
use whale_feeds::{FeedResult, PriceSource};

/// Latest known prices.
#[derive(Debug, Default)]
pub struct PriceCache {
    prices: RwLock<PriceMap>,
    /// Unix seconds of the last successful refresh, 0 if never.
    updated_at: AtomicU64,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> PriceMap {
        self.prices.read().await.clone()
    }

    pub async fn set(&self, prices: PriceMap) {
        *self.prices.write().await = prices;
        self.updated_at.store(now_secs(), Ordering::Relaxed);
    }

    /// Whether any positive price has been stored yet.
    pub async fn is_loaded(&self) -> bool {
        self.prices.read().await.is_loaded()
    }

    pub fn updated_at(&self) -> u64 {
        self.updated_at.load(Ordering::Relaxed)
    }

    /// Fetch prices from the source and store them.
    ///
    /// A response without any market price leaves the cache untouched, and
    /// assets missing from a partial response keep their previous price.
    pub async fn refresh(&self, source: &dyn PriceSource) -> FeedResult<()> {
        let mut prices = source.fetch_prices().await?;
        if !prices.is_loaded() {
            warn!("Price oracle returned no usable prices");
            return Ok(());
        }

        let previous = self.get().await;
        for asset in Asset::all() {
            if prices.get(*asset) <= 0.0 && previous.get(*asset) > 0.0 {
                prices.set(*asset, previous.get(*asset));
            }
        }

        debug!(?prices, "Prices refreshed");
        self.set(prices).await;
        Ok(())
    }
}

/// Refresh the state's price cache until the app stops.
pub async fn run_price_updater(
    state: SharedState,
    source: Arc<dyn PriceSource>,
    interval: Duration,
) {
    info!("Price updater started (every {}s)", interval.as_secs());
    let mut ticker = tokio::time::interval(interval);

    while state.is_running() {
        ticker.tick().await;
        if let Err(e) = state.prices.refresh(source.as_ref()).await {
            warn!(error = %e, transient = e.is_transient(), "Price refresh failed");
        }
    }

    info!("Price updater stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use whale_feeds::{CoinGeckoOracle, MockTransport, PriceOracleConfig, StaticPrices};

    fn oracle(body: serde_json::Value) -> CoinGeckoOracle {
        let transport = Arc::new(MockTransport::new(move |_| Ok(body.clone())));
        CoinGeckoOracle::new(transport, PriceOracleConfig::default())
    }

    async fn seeded_cache() -> PriceCache {
        let cache = PriceCache::new();
        cache
            .set(
                PriceMap::new()
                    .with(Asset::Eth, 4000.0)
                    .with(Asset::Btc, 60_000.0)
                    .with(Asset::Sol, 150.0),
            )
            .await;
        cache
    }

    #[tokio::test]
    async fn test_refresh_stores_prices() {
        let cache = PriceCache::new();
        assert!(!cache.is_loaded().await);
        assert_eq!(cache.updated_at(), 0);

        let source = StaticPrices(PriceMap::new().with(Asset::Btc, 60_000.0));
        cache.refresh(&source).await.unwrap();

        assert!(cache.is_loaded().await);
        assert_eq!(cache.get().await.get(Asset::Btc), 60_000.0);
        assert!(cache.updated_at() > 0);
    }

    #[tokio::test]
    async fn test_empty_response_keeps_previous_prices() {
        let cache = PriceCache::new();
        cache.set(PriceMap::new().with(Asset::Eth, 4000.0)).await;

        cache.refresh(&StaticPrices(PriceMap::new())).await.unwrap();
        assert_eq!(cache.get().await.get(Asset::Eth), 4000.0);
    }

    #[tokio::test]
    async fn test_rate_limited_oracle_keeps_cached_prices() {
        let cache = seeded_cache().await;
        let source = oracle(json!({ "status": { "error_code": 429 } }));

        assert!(cache.refresh(&source).await.is_err());

        let prices = cache.get().await;
        assert_eq!(prices.get(Asset::Eth), 4000.0);
        assert_eq!(prices.get(Asset::Btc), 60_000.0);
        assert_eq!(prices.get(Asset::Sol), 150.0);
    }

    #[tokio::test]
    async fn test_partial_response_keeps_missing_prices() {
        let cache = seeded_cache().await;
        let source = oracle(json!({ "ethereum": { "usd": 4200.0 } }));

        cache.refresh(&source).await.unwrap();

        let prices = cache.get().await;
        assert_eq!(prices.get(Asset::Eth), 4200.0);
        assert_eq!(prices.get(Asset::Btc), 60_000.0);
        assert_eq!(prices.get(Asset::Sol), 150.0);
        assert_eq!(prices.get(Asset::Usdc), 1.0);
    }
}
