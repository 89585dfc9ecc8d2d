//! Native ETH transfers.

use super::evm::{self, first_live_endpoint, parse_hex_u128, parse_hex_u64, IndexedTransfer};
use super::{AdapterKind, ChainAdapter};
use crate::config::EthConfig;
use crate::error::FeedResult;
use crate::strategy::FallbackChain;
use crate::transport::{rpc_call, HttpTransport};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;
use whale_core::units::now_secs;
use whale_core::{AdapterQuery, Asset, Chain, Transfer, TransferFeed};

const ETH_DECIMALS: u32 = 18;

/// Native ETH adapter: indexer first, recent-block scan as fallback.
pub struct EthAdapter {
    transport: Arc<dyn HttpTransport>,
    config: EthConfig,
}

impl EthAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, config: EthConfig) -> Self {
        Self { transport, config }
    }

    async fn fetch_indexed(&self, url: &str, price: f64) -> FeedResult<Vec<Transfer>> {
        let mut filter = Map::new();
        filter.insert("category".into(), json!(["external", "internal"]));

        let records =
            evm::fetch_asset_transfers(self.transport.as_ref(), &self.config.indexer, url, filter)
                .await?;

        Ok(records
            .iter()
            .filter_map(IndexedTransfer::parse)
            .filter_map(|r| r.into_transfer(Asset::Eth, ETH_DECIMALS, price))
            .collect())
    }

    async fn scan_blocks(&self, price: f64) -> FeedResult<Vec<Transfer>> {
        let (url, head) =
            first_live_endpoint(self.transport.as_ref(), &self.config.rpc_endpoints).await?;

        let mut transfers = Vec::new();
        for offset in 0..self.config.scan_blocks {
            let Some(number) = head.checked_sub(offset) else {
                break;
            };
            let params = json!([evm::to_hex(number), true]);
            match rpc_call(self.transport.as_ref(), url, "eth_getBlockByNumber", params).await {
                Ok(block) => transfers.extend(parse_block(&block, price)),
                Err(e) => debug!(block = number, error = %e, "Skipping block"),
            }
        }
        Ok(transfers)
    }
}

/// Decode value transfers from a full `eth_getBlockByNumber` result.
pub fn parse_block(block: &Value, price: f64) -> Vec<Transfer> {
    let timestamp = block
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_hex_u64)
        .unwrap_or_else(now_secs);

    let Some(txs) = block.get("transactions").and_then(Value::as_array) else {
        return Vec::new();
    };

    txs.iter()
        .filter_map(|tx| {
            let raw = parse_hex_u128(tx.get("value")?.as_str()?)?;
            let hash = tx.get("hash")?.as_str()?;
            let from = tx.get("from").and_then(Value::as_str).unwrap_or_default();
            // Contract creations have a null recipient
            let to = tx.get("to").and_then(Value::as_str).unwrap_or_default();
            Transfer::from_raw(
                Chain::Ethereum,
                Asset::Eth,
                raw,
                ETH_DECIMALS,
                price,
                from,
                to,
                hash,
                timestamp,
            )
        })
        .collect()
}

#[async_trait]
impl ChainAdapter for EthAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Eth
    }

    async fn fetch(&self, query: &AdapterQuery) -> TransferFeed {
        let price = query.prices.get(Asset::Eth);

        let mut chain = FallbackChain::new(
            self.name(),
            query.min_usd,
            self.config.min_primary_results,
        );
        if let Some(url) = self.config.indexer.url.as_deref() {
            chain = chain.step("alchemy", move || self.fetch_indexed(url, price));
        }
        let outcome = chain
            .step("block-scan", move || self.scan_blocks(price))
            .run()
            .await;

        TransferFeed::new(outcome.items)
    }
}
