//! USD price sources.
//!
//! Prices come from a CoinGecko-style `simple/price` endpoint. Stablecoins
//! default to 1.0 when the oracle omits them.

use crate::config::PriceOracleConfig;
use crate::error::{FeedError, FeedResult};
use crate::transport::HttpTransport;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use whale_core::{Asset, PriceMap};

/// Source of USD prices per asset.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch prices for every tracked asset.
    async fn fetch_prices(&self) -> FeedResult<PriceMap>;

    /// Fetch the price of one asset. Zero means unknown.
    async fn fetch_price(&self, asset: Asset) -> FeedResult<f64> {
        Ok(self.fetch_prices().await?.get(asset))
    }
}

/// Oracle id used in the `ids` query parameter.
pub fn oracle_id(asset: Asset) -> &'static str {
    match asset {
        Asset::Eth => "ethereum",
        Asset::Btc => "bitcoin",
        Asset::Sol => "solana",
        Asset::Usdc => "usd-coin",
        Asset::Usdt => "tether",
    }
}

/// CoinGecko `simple/price` client.
pub struct CoinGeckoOracle {
    transport: Arc<dyn HttpTransport>,
    config: PriceOracleConfig,
}

impl CoinGeckoOracle {
    pub fn new(transport: Arc<dyn HttpTransport>, config: PriceOracleConfig) -> Self {
        Self { transport, config }
    }

    fn request_url(&self) -> FeedResult<String> {
        let ids = Asset::all()
            .iter()
            .map(|a| oracle_id(*a))
            .collect::<Vec<_>>()
            .join(",");
        let url = url::Url::parse_with_params(
            &self.config.url,
            &[("ids", ids.as_str()), ("vs_currencies", "usd")],
        )?;
        Ok(url.to_string())
    }
}

/// Parse a `{"ethereum": {"usd": 3000.0}, ...}` response.
///
/// Fails when no non-stablecoin price is present, since the stablecoin par
/// defaults alone would pass for a loaded map.
pub fn parse_simple_price(body: &Value) -> FeedResult<PriceMap> {
    let obj = body
        .as_object()
        .ok_or_else(|| FeedError::ParseError("price response is not an object".into()))?;

    let mut prices = PriceMap::new();
    for asset in Asset::all() {
        let price = obj
            .get(oracle_id(*asset))
            .and_then(|entry| entry.get("usd"))
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite() && *p > 0.0);

        match price {
            Some(p) => prices.set(*asset, p),
            None if asset.is_stablecoin() => prices.set(*asset, 1.0),
            None => {}
        }
    }

    if !prices.is_loaded() {
        return Err(FeedError::ParseError(
            "price response has no ETH, BTC or SOL price".into(),
        ));
    }
    Ok(prices)
}

#[async_trait]
impl PriceSource for CoinGeckoOracle {
    async fn fetch_prices(&self) -> FeedResult<PriceMap> {
        let url = self.request_url()?;
        let body = self.transport.get_json(&url).await?;
        let prices = parse_simple_price(&body)?;
        debug!(
            eth = prices.get(Asset::Eth),
            btc = prices.get(Asset::Btc),
            sol = prices.get(Asset::Sol),
            "Fetched USD prices"
        );
        Ok(prices)
    }
}

/// Fixed prices, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPrices(pub PriceMap);

#[async_trait]
impl PriceSource for StaticPrices {
    async fn fetch_prices(&self) -> FeedResult<PriceMap> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{http_status, MockTransport};
    use serde_json::json;

    #[test]
    fn test_parse_simple_price() {
        let body = json!({
            "ethereum": { "usd": 3000.5 },
            "bitcoin": { "usd": 60000.0 },
            "solana": { "usd": 150.0 },
            "tether": { "usd": 0.999 }
        });
        let prices = parse_simple_price(&body).unwrap();
        assert_eq!(prices.get(Asset::Eth), 3000.5);
        assert_eq!(prices.get(Asset::Btc), 60000.0);
        assert_eq!(prices.get(Asset::Usdt), 0.999);
        // Missing stablecoin defaults to par
        assert_eq!(prices.get(Asset::Usdc), 1.0);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_simple_price(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_parse_rejects_stablecoins_only() {
        assert!(parse_simple_price(&json!({})).is_err());
        assert!(parse_simple_price(&json!({ "status": { "error_code": 429 } })).is_err());
        assert!(parse_simple_price(&json!({ "usd-coin": { "usd": 1.0 } })).is_err());
        assert!(parse_simple_price(&json!({ "solana": { "usd": 150.0 } })).is_ok());
    }

    #[tokio::test]
    async fn test_oracle_requests_all_ids() {
        let transport = Arc::new(MockTransport::new(|req| {
            assert!(req.url.contains("vs_currencies=usd"));
            Ok(json!({ "ethereum": { "usd": 2500.0 } }))
        }));
        let oracle = CoinGeckoOracle::new(transport.clone(), PriceOracleConfig::default());

        let price = oracle.fetch_price(Asset::Eth).await.unwrap();
        assert_eq!(price, 2500.0);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].url.contains("usd-coin"));
        assert!(calls[0].url.contains("solana"));
    }

    #[tokio::test]
    async fn test_oracle_propagates_http_errors() {
        let transport = Arc::new(MockTransport::new(|req| Err(http_status(429, &req.url))));
        let oracle = CoinGeckoOracle::new(transport, PriceOracleConfig::default());
        assert!(oracle.fetch_prices().await.is_err());
    }
}
