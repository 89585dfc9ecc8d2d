//! Native BTC transfers from an Esplora-style explorer API.
//!
//! Bitcoin has no single sender/recipient, so transfers are reported as the
//! total output value of a transaction with `to = "multiple"`.

use super::{AdapterKind, ChainAdapter};
use crate::config::BtcConfig;
use crate::error::FeedResult;
use crate::strategy::FallbackChain;
use crate::transport::HttpTransport;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use whale_core::units::now_secs;
use whale_core::{AdapterQuery, Asset, Chain, Transfer, TransferFeed};

const BTC_DECIMALS: u32 = 8;
const MULTIPLE: &str = "multiple";

/// Strategies run until one produces a qualifying transfer.
const SUFFICIENT_AT: usize = 1;

/// Bitcoin adapter: mempool txids, then recent mempool, then recent blocks.
pub struct BtcAdapter {
    transport: Arc<dyn HttpTransport>,
    config: BtcConfig,
}

impl BtcAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, config: BtcConfig) -> Self {
        Self { transport, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn mempool_txids(&self, price: f64) -> FeedResult<Vec<Transfer>> {
        let ids: Vec<String> =
            serde_json::from_value(self.transport.get_json(&self.url("/mempool/txids")).await?)?;

        let observed_at = now_secs();
        let fetched: Vec<(String, FeedResult<Value>)> = stream::iter(
            ids.into_iter().take(self.config.max_mempool_txids),
        )
        .map(move |txid| async move {
            let tx = self.transport.get_json(&self.url(&format!("/tx/{}", txid))).await;
            (txid, tx)
        })
        .buffered(self.config.tx_fetch_concurrency.max(1))
        .collect()
        .await;

        let mut transfers = Vec::new();
        for (txid, tx) in fetched {
            match tx {
                Ok(tx) => {
                    let timestamp = tx
                        .pointer("/status/block_time")
                        .and_then(Value::as_u64)
                        .unwrap_or(observed_at);
                    transfers.extend(tx_transfer(&tx, Some(&txid), "mempool", price, timestamp));
                }
                Err(e) => debug!(%txid, error = %e, "Skipping mempool tx"),
            }
        }
        Ok(transfers)
    }

    async fn mempool_recent(&self, price: f64) -> FeedResult<Vec<Transfer>> {
        let recent = self.transport.get_json(&self.url("/mempool/recent")).await?;
        let observed_at = now_secs();

        Ok(recent
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let sats = entry.get("value")?.as_u64()?;
                        let txid = entry.get("txid")?.as_str()?;
                        Transfer::from_raw(
                            Chain::Bitcoin,
                            Asset::Btc,
                            u128::from(sats),
                            BTC_DECIMALS,
                            price,
                            "mempool",
                            MULTIPLE,
                            txid,
                            observed_at,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn recent_blocks(&self, price: f64) -> FeedResult<Vec<Transfer>> {
        let blocks = self.transport.get_json(&self.url("/blocks")).await?;
        let observed_at = now_secs();

        let mut transfers = Vec::new();
        let Some(blocks) = blocks.as_array() else {
            return Ok(transfers);
        };

        for block in blocks.iter().take(self.config.recent_blocks) {
            let Some(id) = block.get("id").and_then(Value::as_str) else {
                continue;
            };
            let timestamp = block
                .get("timestamp")
                .and_then(Value::as_u64)
                .unwrap_or(observed_at);

            match self.transport.get_json(&self.url(&format!("/block/{}/txs", id))).await {
                Ok(txs) => {
                    for tx in txs.as_array().into_iter().flatten() {
                        transfers.extend(tx_transfer(tx, None, "block", price, timestamp));
                    }
                }
                Err(e) => debug!(block = id, error = %e, "Skipping block"),
            }
        }
        Ok(transfers)
    }
}

/// Sum of `vout[].value` (sats) as a transfer.
fn tx_transfer(
    tx: &Value,
    txid: Option<&str>,
    from: &str,
    price: f64,
    timestamp: u64,
) -> Option<Transfer> {
    let txid = txid.or_else(|| tx.get("txid")?.as_str())?;
    let sats = tx
        .get("vout")?
        .as_array()?
        .iter()
        .filter_map(|out| out.get("value").and_then(Value::as_u64))
        .map(u128::from)
        .sum::<u128>();

    Transfer::from_raw(
        Chain::Bitcoin,
        Asset::Btc,
        sats,
        BTC_DECIMALS,
        price,
        from,
        MULTIPLE,
        txid,
        timestamp,
    )
}

#[async_trait]
impl ChainAdapter for BtcAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Btc
    }

    async fn fetch(&self, query: &AdapterQuery) -> TransferFeed {
        let price = query.prices.get(Asset::Btc);

        let outcome = FallbackChain::new(self.name(), query.min_usd, SUFFICIENT_AT)
            .step("mempool-txids", move || self.mempool_txids(price))
            .step("mempool-recent", move || self.mempool_recent(price))
            .step("recent-blocks", move || self.recent_blocks(price))
            .run()
            .await;

        TransferFeed::new(outcome.items)
    }
}
