//! ERC-20 stablecoin transfers (USDC, USDT).

use super::evm::{self, first_live_endpoint, parse_hex_u128, topic_to_address, IndexedTransfer};
use super::{AdapterKind, ChainAdapter};
use crate::config::{Erc20Config, TokenContract, TRANSFER_TOPIC};
use crate::error::FeedResult;
use crate::price::PriceSource;
use crate::strategy::FallbackChain;
use crate::transport::{rpc_call, HttpTransport};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;
use whale_core::units::now_secs;
use whale_core::{AdapterQuery, Asset, Chain, PriceMap, Transfer, TransferFeed};

/// Stablecoin adapter: indexer first, chunked `eth_getLogs` as fallback.
pub struct Erc20Adapter {
    transport: Arc<dyn HttpTransport>,
    config: Erc20Config,
    price_source: Option<Arc<dyn PriceSource>>,
}

impl Erc20Adapter {
    pub fn new(transport: Arc<dyn HttpTransport>, config: Erc20Config) -> Self {
        Self {
            transport,
            config,
            price_source: None,
        }
    }

    /// Source consulted when the caller passes no price for a token.
    pub fn with_price_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.price_source = Some(source);
        self
    }

    /// Caller price when nonzero, else the price source, else par.
    async fn resolve_price(&self, asset: Asset, prices: &PriceMap) -> f64 {
        let given = prices.get(asset);
        if given > 0.0 {
            return given;
        }
        if let Some(source) = &self.price_source {
            match source.fetch_price(asset).await {
                Ok(price) if price > 0.0 => return price,
                Ok(_) => debug!(%asset, "Price source returned no price"),
                Err(e) => debug!(%asset, error = %e, "Price source failed"),
            }
        }
        1.0
    }

    fn token_for_contract(&self, contract: &str) -> Option<&TokenContract> {
        self.config.tokens.iter().find(|t| t.address == contract)
    }

    async fn fetch_indexed(&self, url: &str, prices: &PriceMap) -> FeedResult<Vec<Transfer>> {
        let contracts: Vec<&str> = self.config.tokens.iter().map(|t| t.address.as_str()).collect();
        let mut filter = Map::new();
        filter.insert("category".into(), json!(["erc20"]));
        filter.insert("contractAddresses".into(), json!(contracts));

        let records =
            evm::fetch_asset_transfers(self.transport.as_ref(), &self.config.indexer, url, filter)
                .await?;

        Ok(records
            .iter()
            .filter_map(IndexedTransfer::parse)
            .filter_map(|record| {
                let token = self.token_for_contract(&record.contract()?)?;
                record.into_transfer(token.asset, token.decimals, prices.get(token.asset))
            })
            .collect())
    }

    async fn scan_logs(&self, prices: &PriceMap) -> FeedResult<Vec<Transfer>> {
        let (url, head) =
            first_live_endpoint(self.transport.as_ref(), &self.config.rpc_endpoints).await?;

        let start = head.saturating_sub(self.config.scan_blocks);
        let chunk = self.config.chunk_size.max(1);
        let observed_at = now_secs();

        let mut transfers = Vec::new();
        for token in &self.config.tokens {
            let price = prices.get(token.asset);
            let mut from = start;
            while from <= head {
                let to = from.saturating_add(chunk - 1).min(head);
                let filter = json!([{
                    "fromBlock": evm::to_hex(from),
                    "toBlock": evm::to_hex(to),
                    "address": token.address,
                    "topics": [TRANSFER_TOPIC],
                }]);

                match rpc_call(self.transport.as_ref(), url, "eth_getLogs", filter).await {
                    Ok(logs) => {
                        if let Some(logs) = logs.as_array() {
                            transfers.extend(
                                logs.iter()
                                    .filter_map(|log| parse_log(log, token, price, observed_at)),
                            );
                        }
                    }
                    Err(e) => {
                        debug!(token = %token.asset, from, to, error = %e, "Skipping log chunk")
                    }
                }
                from = to + 1;
            }
        }
        Ok(transfers)
    }
}

/// Decode a `Transfer(address,address,uint256)` log.
/// Logs have no timestamp, so the observation time is used.
pub fn parse_log(log: &Value, token: &TokenContract, price: f64, timestamp: u64) -> Option<Transfer> {
    let topics = log.get("topics")?.as_array()?;
    if topics.len() < 3 {
        return None;
    }
    if !topics[0].as_str()?.eq_ignore_ascii_case(TRANSFER_TOPIC) {
        return None;
    }
    let from = topic_to_address(topics[1].as_str()?)?;
    let to = topic_to_address(topics[2].as_str()?)?;
    let raw = parse_hex_u128(log.get("data")?.as_str()?)?;
    let hash = log.get("transactionHash")?.as_str()?;

    Transfer::from_raw(
        Chain::Ethereum,
        token.asset,
        raw,
        token.decimals,
        price,
        from,
        to,
        hash,
        timestamp,
    )
}

#[async_trait]
impl ChainAdapter for Erc20Adapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Erc20
    }

    async fn fetch(&self, query: &AdapterQuery) -> TransferFeed {
        let mut prices = PriceMap::new();
        for token in &self.config.tokens {
            let price = self.resolve_price(token.asset, &query.prices).await;
            prices.set(token.asset, price);
        }
        let prices = &prices;

        let mut chain = FallbackChain::new(
            self.name(),
            query.min_usd,
            self.config.min_primary_results,
        );
        if let Some(url) = self.config.indexer.url.as_deref() {
            chain = chain.step("alchemy", move || self.fetch_indexed(url, prices));
        }
        let outcome = chain
            .step("log-scan", move || self.scan_logs(prices))
            .run()
            .await;

        TransferFeed::new(outcome.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexerConfig, PriceOracleConfig};
    use crate::price::{CoinGeckoOracle, StaticPrices};
    use crate::transport::{rpc_error, rpc_result, MockTransport};

    const FROM_TOPIC: &str = "0x0000000000000000000000001111111111111111111111111111111111111111";
    const TO_TOPIC: &str = "0x0000000000000000000000002222222222222222222222222222222222222222";

    fn usdc_log(hash: &str, raw: u128) -> Value {
        json!({
            "address": TokenContract::usdc().address,
            "topics": [TRANSFER_TOPIC, FROM_TOPIC, TO_TOPIC],
            "data": format!("0x{:064x}", raw),
            "transactionHash": hash,
        })
    }

    fn scan_config(scan_blocks: u64, chunk_size: u64) -> Erc20Config {
        Erc20Config {
            rpc_endpoints: vec!["http://node".to_string()],
            scan_blocks,
            chunk_size,
            ..Erc20Config::default()
        }
    }

    #[test]
    fn test_parse_log() {
        let log = usdc_log("0xhash", 12_345_500_000);
        let transfer = parse_log(&log, &TokenContract::usdc(), 1.0, 7).unwrap();
        assert_eq!(transfer.asset, Asset::Usdc);
        assert_eq!(transfer.amount, 12_345.5);
        assert_eq!(transfer.from, "0x1111111111111111111111111111111111111111");
        assert_eq!(transfer.to, "0x2222222222222222222222222222222222222222");
        assert_eq!(transfer.timestamp, 7);
    }

    #[test]
    fn test_parse_log_rejects_malformed() {
        let mut log = usdc_log("0xhash", 1);
        log["topics"] = json!([TRANSFER_TOPIC, FROM_TOPIC]);
        assert!(parse_log(&log, &TokenContract::usdc(), 1.0, 0).is_none());

        let zero = usdc_log("0xhash", 0);
        assert!(parse_log(&zero, &TokenContract::usdc(), 1.0, 0).is_none());
    }

    #[tokio::test]
    async fn test_log_scan_walks_chunks_per_token() {
        let transport = Arc::new(MockTransport::new(|req| match req.rpc_method() {
            Some("eth_blockNumber") => Ok(rpc_result(json!("0x2710"))),
            Some("eth_getLogs") => {
                let filter = &req.rpc_params()[0];
                if filter["address"] == json!(TokenContract::usdc().address)
                    && filter["toBlock"] == json!("0x2710")
                {
                    Ok(rpc_result(json!([usdc_log("0xbig", 2_000_000_000_000)])))
                } else {
                    Ok(rpc_result(json!([])))
                }
            }
            _ => Ok(rpc_error(-32601, "method not found")),
        }));
        let adapter = Erc20Adapter::new(transport.clone(), scan_config(2500, 1000));

        let query = AdapterQuery::new(1_000_000.0, PriceMap::new().with(Asset::Usdc, 1.0));
        let feed = adapter.fetch(&query).await;

        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].amount, 2_000_000.0);
        // 2501 blocks in chunks of 1000 is 3 requests, for each of 2 tokens
        assert_eq!(transport.count_rpc("eth_getLogs"), 6);

        let first = transport
            .calls()
            .into_iter()
            .find(|c| c.rpc_method() == Some("eth_getLogs"))
            .unwrap();
        // 0x2710 = 10000, window starts at 7500
        assert_eq!(first.rpc_params()[0]["fromBlock"], json!("0x1d4c"));
        assert_eq!(first.rpc_params()[0]["toBlock"], json!("0x2133"));
    }

    #[tokio::test]
    async fn test_failed_chunk_is_skipped() {
        let transport = Arc::new(MockTransport::new(|req| match req.rpc_method() {
            Some("eth_blockNumber") => Ok(rpc_result(json!("0x64"))),
            Some("eth_getLogs") => {
                if req.rpc_params()[0]["fromBlock"] == json!("0x0") {
                    Ok(rpc_error(-32005, "query returned more than 10000 results"))
                } else {
                    Ok(rpc_result(json!([usdc_log("0xlate", 5_000_000_000)])))
                }
            }
            _ => Ok(rpc_error(-32601, "method not found")),
        }));
        let config = Erc20Config {
            tokens: vec![TokenContract::usdc()],
            ..scan_config(100, 50)
        };
        let adapter = Erc20Adapter::new(transport.clone(), config);

        let feed = adapter.fetch(&AdapterQuery::new(1_000.0, PriceMap::new())).await;
        assert_eq!(transport.count_rpc("eth_getLogs"), 3);
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].tx_hash, "0xlate");
    }

    #[tokio::test]
    async fn test_zero_price_uses_source_then_par() {
        let transport = Arc::new(MockTransport::unreachable());
        let source = Arc::new(StaticPrices(PriceMap::new().with(Asset::Usdt, 0.998)));
        let adapter = Erc20Adapter::new(transport, Erc20Config::default()).with_price_source(source);

        let given = PriceMap::new().with(Asset::Usdc, 1.01);
        assert_eq!(adapter.resolve_price(Asset::Usdc, &given).await, 1.01);
        assert_eq!(adapter.resolve_price(Asset::Usdt, &given).await, 0.998);

        let bare = Erc20Adapter::new(Arc::new(MockTransport::unreachable()), Erc20Config::default());
        assert_eq!(bare.resolve_price(Asset::Usdt, &PriceMap::new()).await, 1.0);
    }

    #[tokio::test]
    async fn test_failing_price_source_falls_back_to_par() {
        let oracle = Arc::new(CoinGeckoOracle::new(
            Arc::new(MockTransport::unreachable()),
            PriceOracleConfig::default(),
        ));
        let adapter = Erc20Adapter::new(Arc::new(MockTransport::unreachable()), Erc20Config::default())
            .with_price_source(oracle);
        assert_eq!(adapter.resolve_price(Asset::Usdc, &PriceMap::new()).await, 1.0);

        let zero = Arc::new(StaticPrices(PriceMap::new().with(Asset::Usdt, 0.0)));
        let adapter = Erc20Adapter::new(Arc::new(MockTransport::unreachable()), Erc20Config::default())
            .with_price_source(zero);
        assert_eq!(adapter.resolve_price(Asset::Usdt, &PriceMap::new()).await, 1.0);
    }

    #[tokio::test]
    async fn test_indexer_maps_contracts_to_tokens() {
        let transport = Arc::new(MockTransport::new(|req| match req.rpc_method() {
            Some("eth_blockNumber") => Ok(rpc_result(json!("0x1000"))),
            Some("alchemy_getAssetTransfers") => Ok(rpc_result(json!({
                "transfers": [
                    {
                        "hash": "0xusdt",
                        "from": "0x1",
                        "to": "0x2",
                        "value": 3000000.0,
                        "rawContract": {
                            "value": "0x2ba7def3000",
                            "address": "0xdAC17F958D2ee523a2206206994597C13D831ec7",
                            "decimal": "0x6"
                        }
                    },
                    {
                        "hash": "0xother",
                        "value": 9000000.0,
                        "rawContract": { "value": "0x1", "address": "0xdeadbeef", "decimal": "0x6" }
                    }
                ]
            }))),
            _ => Ok(rpc_error(-32601, "method not found")),
        }));
        let config = Erc20Config {
            indexer: IndexerConfig {
                url: Some("http://alchemy".to_string()),
                ..IndexerConfig::default()
            },
            ..scan_config(100, 50)
        };
        let adapter = Erc20Adapter::new(transport.clone(), config);

        let feed = adapter.fetch(&AdapterQuery::new(1_000_000.0, PriceMap::new())).await;
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].asset, Asset::Usdt);
        assert_eq!(feed.items[0].amount, 3_000_000.0);
        assert_eq!(transport.count_rpc("eth_getLogs"), 0);
    }
}
