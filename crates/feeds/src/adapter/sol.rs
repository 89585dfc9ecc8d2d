//! Solana transfers: native SOL and USDC (stablecoin-only mode).
//!
//! With a Helius key the enhanced transactions API is the primary source.
//! Without one, native SOL falls back to decoding System Program transfer
//! instructions from the most recent slots; stablecoin-only mode has no
//! keyless source and returns a note instead.

use super::{AdapterKind, ChainAdapter};
use crate::config::{InstructionEncoding, SolConfig, SYSTEM_PROGRAM_ID};
use crate::error::{FeedError, FeedResult};
use crate::strategy::FallbackChain;
use crate::transport::{rpc_call, HttpTransport};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use whale_core::units::now_secs;
use whale_core::{AdapterQuery, Asset, Chain, Transfer, TransferFeed};

const SOL_DECIMALS: u32 = 9;

/// System Program instruction index for `Transfer`.
const SYSTEM_TRANSFER: u32 = 2;

/// Returned in stablecoin-only mode when no indexer key is configured.
pub const STABLECOIN_INDEXER_NOTE: &str = "Solana stablecoin-only mode requires an indexer \
     (set HELIUS_API_KEY). No items are returned in this mode.";

/// Solana adapter.
pub struct SolAdapter {
    transport: Arc<dyn HttpTransport>,
    config: SolConfig,
}

impl SolAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, config: SolConfig) -> Self {
        Self { transport, config }
    }

    fn helius_key(&self) -> Option<&str> {
        self.config
            .helius_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
    }

    fn helius_url(&self, address: &str, key: &str, before: Option<&str>) -> FeedResult<String> {
        let base = self.config.helius_base_url.trim_end_matches('/');
        let mut url = url::Url::parse(&format!("{}/v0/addresses/{}/transactions", base, address))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-key", key);
            query.append_pair("type", "TRANSFER");
            query.append_pair("limit", &self.config.page_size.to_string());
            if let Some(before) = before {
                query.append_pair("before", before);
            }
        }
        Ok(url.to_string())
    }

    /// Enhanced transactions for an address, newest first, paginated by
    /// the `before` signature.
    async fn helius_pages(&self, address: &str, key: &str) -> FeedResult<Vec<Value>> {
        let mut txs = Vec::new();
        let mut before: Option<String> = None;

        for page in 0..self.config.max_pages {
            let url = self.helius_url(address, key, before.as_deref())?;
            let body = match self.transport.get_json(&url).await {
                Ok(body) => body,
                Err(e) if page > 0 => {
                    debug!(page, error = %e, "Helius page failed, keeping earlier pages");
                    break;
                }
                Err(e) => return Err(e),
            };
            let items = body
                .as_array()
                .ok_or_else(|| FeedError::ParseError("Helius response is not an array".into()))?;
            if items.is_empty() {
                break;
            }

            before = items
                .last()
                .and_then(|tx| tx.get("signature"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let full_page = items.len() >= self.config.page_size as usize;
            txs.extend(items.iter().cloned());

            if before.is_none() || !full_page {
                break;
            }
        }
        Ok(txs)
    }

    async fn fetch_helius_native(&self, key: &str, price: f64) -> FeedResult<Vec<Transfer>> {
        let txs = self.helius_pages(SYSTEM_PROGRAM_ID, key).await?;
        Ok(txs
            .iter()
            .filter_map(|tx| helius_native_transfer(tx, price))
            .collect())
    }

    async fn fetch_helius_usdc(&self, key: &str, price: f64) -> FeedResult<Vec<Transfer>> {
        let mint = self.config.usdc_mint.as_str();
        let txs = self.helius_pages(mint, key).await?;
        Ok(txs
            .iter()
            .filter_map(|tx| helius_token_transfer(tx, mint, price))
            .collect())
    }

    async fn scan_slots(&self, price: f64) -> FeedResult<Vec<Transfer>> {
        let url = self.config.rpc_url.as_str();
        let slot = rpc_call(self.transport.as_ref(), url, "getSlot", json!([])).await?;
        let head = slot
            .as_u64()
            .ok_or_else(|| FeedError::ParseError(format!("getSlot: bad slot {}", slot)))?;

        let mut transfers = Vec::new();
        for offset in 0..self.config.slots_to_scan {
            let Some(slot) = head.checked_sub(offset) else {
                break;
            };
            let params = json!([slot, {
                "encoding": "json",
                "maxSupportedTransactionVersion": 0,
                "transactionDetails": "full",
                "rewards": false,
            }]);
            match rpc_call(self.transport.as_ref(), url, "getBlock", params).await {
                Ok(block) => {
                    transfers.extend(parse_block(&block, self.config.instruction_encoding, price))
                }
                // Skipped and pruned slots answer with an RPC error
                Err(e) => debug!(slot, error = %e, "Skipping slot"),
            }
        }
        Ok(transfers)
    }
}

/// Decode a System Program `Transfer` instruction, returning lamports.
///
/// Layout: u32 LE instruction index (2), then u64 LE lamports.
pub fn decode_system_transfer(data: &[u8]) -> Option<u64> {
    if data.len() < 12 {
        return None;
    }
    let index = u32::from_le_bytes(data[0..4].try_into().ok()?);
    if index != SYSTEM_TRANSFER {
        return None;
    }
    Some(u64::from_le_bytes(data[4..12].try_into().ok()?))
}

fn decode_instruction_data(data: &str, encoding: InstructionEncoding) -> Option<Vec<u8>> {
    match encoding {
        InstructionEncoding::Base58 => bs58::decode(data).into_vec().ok(),
        InstructionEncoding::Base64 => base64::engine::general_purpose::STANDARD.decode(data).ok(),
    }
}

/// Decode native transfers from a `getBlock` result.
pub fn parse_block(block: &Value, encoding: InstructionEncoding, price: f64) -> Vec<Transfer> {
    let timestamp = block
        .get("blockTime")
        .and_then(Value::as_u64)
        .unwrap_or_else(now_secs);

    let Some(txs) = block.get("transactions").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut transfers = Vec::new();
    for tx in txs {
        let Some(meta) = tx.get("meta").filter(|m| !m.is_null()) else {
            continue;
        };
        if meta.get("err").is_some_and(|e| !e.is_null()) {
            continue;
        }
        let Some(message) = tx.pointer("/transaction/message") else {
            continue;
        };
        let Some(signature) = tx.pointer("/transaction/signatures/0").and_then(Value::as_str) else {
            continue;
        };

        // Versioned transactions append lookup-table addresses after the static keys
        let keys: Vec<&str> = [
            message.get("accountKeys"),
            meta.pointer("/loadedAddresses/writable"),
            meta.pointer("/loadedAddresses/readonly"),
        ]
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .collect();

        let instructions = message.get("instructions").and_then(Value::as_array);
        for ix in instructions.into_iter().flatten() {
            let decoded = decode_instruction(ix, &keys, encoding);
            if let Some((from, to, lamports)) = decoded {
                transfers.extend(Transfer::from_raw(
                    Chain::Solana,
                    Asset::Sol,
                    u128::from(lamports),
                    SOL_DECIMALS,
                    price,
                    from,
                    to,
                    signature,
                    timestamp,
                ));
            }
        }
    }
    transfers
}

fn decode_instruction<'a>(
    ix: &Value,
    keys: &[&'a str],
    encoding: InstructionEncoding,
) -> Option<(&'a str, &'a str, u64)> {
    let program_index = usize::try_from(ix.get("programIdIndex")?.as_u64()?).ok()?;
    if *keys.get(program_index)? != SYSTEM_PROGRAM_ID {
        return None;
    }
    let data = decode_instruction_data(ix.get("data")?.as_str()?, encoding)?;
    let lamports = decode_system_transfer(&data)?;

    let accounts = ix.get("accounts")?.as_array()?;
    let key_at = |pos: usize| -> Option<&'a str> {
        let index = usize::try_from(accounts.get(pos)?.as_u64()?).ok()?;
        keys.get(index).copied()
    };
    Some((key_at(0)?, key_at(1)?, lamports))
}

fn helius_failed(tx: &Value) -> bool {
    tx.get("transactionError").is_some_and(|e| !e.is_null())
}

fn helius_timestamp(tx: &Value) -> u64 {
    tx.get("timestamp")
        .and_then(Value::as_u64)
        .unwrap_or_else(now_secs)
}

/// Largest native transfer of an enhanced transaction.
fn helius_native_transfer(tx: &Value, price: f64) -> Option<Transfer> {
    if helius_failed(tx) {
        return None;
    }
    let signature = tx.get("signature")?.as_str()?;
    let (from, to, lamports) = tx
        .get("nativeTransfers")?
        .as_array()?
        .iter()
        .filter_map(|t| {
            Some((
                t.get("fromUserAccount")?.as_str()?,
                t.get("toUserAccount")?.as_str()?,
                t.get("amount")?.as_u64()?,
            ))
        })
        .max_by_key(|(_, _, lamports)| *lamports)?;

    Transfer::from_raw(
        Chain::Solana,
        Asset::Sol,
        u128::from(lamports),
        SOL_DECIMALS,
        price,
        from,
        to,
        signature,
        helius_timestamp(tx),
    )
}

/// Largest token transfer of `mint` in an enhanced transaction.
/// Helius reports `tokenAmount` already in whole units.
fn helius_token_transfer(tx: &Value, mint: &str, price: f64) -> Option<Transfer> {
    if helius_failed(tx) {
        return None;
    }
    let signature = tx.get("signature")?.as_str()?;
    let (from, to, amount) = tx
        .get("tokenTransfers")?
        .as_array()?
        .iter()
        .filter(|t| t.get("mint").and_then(Value::as_str) == Some(mint))
        .filter_map(|t| {
            Some((
                t.get("fromUserAccount")?.as_str()?,
                t.get("toUserAccount")?.as_str()?,
                t.get("tokenAmount")?.as_f64()?,
            ))
        })
        .max_by(|a, b| a.2.total_cmp(&b.2))?;

    Transfer::from_amount(
        Chain::Solana,
        Asset::Usdc,
        amount,
        price,
        from,
        to,
        signature,
        helius_timestamp(tx),
    )
}

#[async_trait]
impl ChainAdapter for SolAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Sol
    }

    async fn fetch(&self, query: &AdapterQuery) -> TransferFeed {
        let key = self.helius_key();

        if query.stablecoin_only {
            let Some(key) = key else {
                return TransferFeed::empty_with_note(STABLECOIN_INDEXER_NOTE);
            };
            let price = match query.prices.get(Asset::Usdc) {
                p if p > 0.0 => p,
                _ => 1.0,
            };
            let outcome = FallbackChain::new(self.name(), query.min_usd, 1)
                .step("helius-usdc", move || self.fetch_helius_usdc(key, price))
                .run()
                .await;
            return TransferFeed::new(outcome.items);
        }

        let price = query.prices.get(Asset::Sol);
        let mut chain = FallbackChain::new(
            self.name(),
            query.min_usd,
            self.config.min_primary_results,
        );
        if let Some(key) = key {
            chain = chain.step("helius", move || self.fetch_helius_native(key, price));
        }
        let outcome = chain
            .step("slot-scan", move || self.scan_slots(price))
            .run()
            .await;

        TransferFeed::new(outcome.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{rpc_error, rpc_result, MockTransport};
    use pretty_assertions::assert_eq;
    use whale_core::PriceMap;

    const ALICE: &str = "A1iceA1iceA1iceA1iceA1iceA1iceA1iceA1iceA1ic";
    const BOB: &str = "BobBobBobBobBobBobBobBobBobBobBobBobBobBobBo";
    const VOTE_PROGRAM: &str = "Vote111111111111111111111111111111111111111";
    const THOUSAND_SOL: u64 = 1_000_000_000_000;

    fn transfer_data(lamports: u64) -> Vec<u8> {
        let mut data = SYSTEM_TRANSFER.to_le_bytes().to_vec();
        data.extend_from_slice(&lamports.to_le_bytes());
        data
    }

    fn block_tx(sig: &str, program_index: u64, data: &str, err: Value) -> Value {
        json!({
            "meta": { "err": err },
            "transaction": {
                "signatures": [sig],
                "message": {
                    "accountKeys": [ALICE, BOB, SYSTEM_PROGRAM_ID, VOTE_PROGRAM],
                    "instructions": [{ "programIdIndex": program_index, "accounts": [0, 1], "data": data }]
                }
            }
        })
    }

    fn sample_block(encode: impl Fn(&[u8]) -> String) -> Value {
        let data = encode(&transfer_data(THOUSAND_SOL));
        json!({
            "blockTime": 1_700_000_000u64,
            "transactions": [
                block_tx("ok", 2, &data, Value::Null),
                block_tx("failed", 2, &data, json!({ "InstructionError": [0, "Custom"] })),
                block_tx("vote", 3, &data, Value::Null),
                block_tx("out-of-bounds", 9, &data, Value::Null),
                { "meta": null, "transaction": { "signatures": ["nometa"], "message": {} } }
            ]
        })
    }

    fn sol_query(min_usd: f64) -> AdapterQuery {
        AdapterQuery::new(min_usd, PriceMap::new().with(Asset::Sol, 150.0))
    }

    #[test]
    fn test_decode_system_transfer() {
        assert_eq!(decode_system_transfer(&transfer_data(42)), Some(42));

        let mut other = transfer_data(42);
        other[0] = 3;
        assert_eq!(decode_system_transfer(&other), None);
        assert_eq!(decode_system_transfer(&[2, 0, 0, 0, 1]), None);
    }

    #[test]
    fn test_parse_block_base58() {
        let block = sample_block(|b| bs58::encode(b).into_string());
        let transfers = parse_block(&block, InstructionEncoding::Base58, 150.0);

        assert_eq!(transfers.len(), 1);
        let t = &transfers[0];
        assert_eq!(t.tx_hash, "ok");
        assert_eq!(t.amount, 1_000.0);
        assert_eq!(t.usd_value, 150_000.0);
        assert_eq!(t.from, ALICE);
        assert_eq!(t.to, BOB);
        assert_eq!(t.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_parse_block_base64() {
        let block = sample_block(|b| base64::engine::general_purpose::STANDARD.encode(b));
        let transfers = parse_block(&block, InstructionEncoding::Base64, 150.0);
        assert_eq!(transfers.len(), 1);

        // Wrong encoding decodes to garbage and is skipped
        let transfers = parse_block(&block, InstructionEncoding::Base58, 150.0);
        assert!(transfers.is_empty());
    }

    #[tokio::test]
    async fn test_stablecoin_only_without_indexer_returns_note() {
        let transport = Arc::new(MockTransport::unreachable());
        let adapter = SolAdapter::new(transport.clone(), SolConfig::default());

        let query = sol_query(0.0).with_stablecoin_only(true);
        let feed = adapter.fetch(&query).await;

        assert!(feed.items.is_empty());
        assert_eq!(feed.note.as_deref(), Some(STABLECOIN_INDEXER_NOTE));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_slot_scan_skips_missing_slots() {
        let data = bs58::encode(transfer_data(THOUSAND_SOL)).into_string();
        let transport = Arc::new(MockTransport::new(move |req| match req.rpc_method() {
            Some("getSlot") => Ok(rpc_result(json!(100))),
            Some("getBlock") => {
                let slot = req.rpc_params()[0].as_u64().unwrap_or_default();
                if slot == 100 {
                    Ok(rpc_error(-32007, "Slot 100 was skipped"))
                } else {
                    Ok(rpc_result(json!({
                        "blockTime": 1_700_000_000u64,
                        "transactions": [block_tx(&format!("sig-{}", slot), 2, &data, Value::Null)]
                    })))
                }
            }
            _ => Ok(rpc_error(-32601, "method not found")),
        }));
        let adapter = SolAdapter::new(transport.clone(), SolConfig::default());

        let feed = adapter.fetch(&sol_query(100_000.0)).await;
        assert_eq!(feed.items.len(), 3);
        assert_eq!(transport.count_rpc("getBlock"), 4);
        assert!(feed.note.is_none());
    }

    fn helius_config() -> SolConfig {
        SolConfig {
            helius_api_key: Some("key".to_string()),
            helius_base_url: "http://helius".to_string(),
            page_size: 2,
            ..SolConfig::default()
        }
    }

    #[tokio::test]
    async fn test_helius_native_paginates_and_skips_scan() {
        let transport = Arc::new(MockTransport::new(|req| {
            assert!(req.url.contains("api-key=key"));
            let page = if req.url.contains("before=s2") {
                json!([
                    { "signature": "s3", "timestamp": 5, "nativeTransfers": [
                        { "fromUserAccount": ALICE, "toUserAccount": BOB, "amount": THOUSAND_SOL }
                    ]}
                ])
            } else {
                json!([
                    { "signature": "s1", "timestamp": 7, "nativeTransfers": [
                        { "fromUserAccount": ALICE, "toUserAccount": BOB, "amount": 1_000u64 },
                        { "fromUserAccount": BOB, "toUserAccount": ALICE, "amount": THOUSAND_SOL * 2 }
                    ]},
                    { "signature": "s2", "transactionError": { "error": "x" }, "nativeTransfers": [
                        { "fromUserAccount": ALICE, "toUserAccount": BOB, "amount": THOUSAND_SOL }
                    ]}
                ])
            };
            Ok(page)
        }));
        let adapter = SolAdapter::new(transport.clone(), helius_config());

        let feed = adapter.fetch(&sol_query(100_000.0)).await;
        let hashes: Vec<&str> = feed.items.iter().map(|t| t.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["s1", "s3"]);
        assert_eq!(feed.items[0].from, BOB);
        assert_eq!(feed.items[0].amount, 2_000.0);
        assert_eq!(transport.count_url("/v0/addresses/"), 2);
        assert_eq!(transport.count_rpc("getSlot"), 0);
    }

    #[tokio::test]
    async fn test_helius_usdc_filters_mint() {
        let mint = SolConfig::default().usdc_mint;
        let transport = Arc::new(MockTransport::new(move |req| {
            assert!(req.url.contains(&mint));
            Ok(json!([
                { "signature": "u1", "timestamp": 1, "tokenTransfers": [
                    { "fromUserAccount": ALICE, "toUserAccount": BOB, "tokenAmount": 2_500_000.5, "mint": mint }
                ]},
                { "signature": "u2", "timestamp": 1, "tokenTransfers": [
                    { "fromUserAccount": ALICE, "toUserAccount": BOB, "tokenAmount": 9_000_000.0, "mint": "OtherMint" }
                ]}
            ]))
        }));
        let adapter = SolAdapter::new(transport, helius_config());

        let query = AdapterQuery::new(1_000_000.0, PriceMap::new()).with_stablecoin_only(true);
        let feed = adapter.fetch(&query).await;

        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].asset, Asset::Usdc);
        assert_eq!(feed.items[0].amount, 2_500_000.5);
        assert_eq!(feed.items[0].usd_value, 2_500_000.5);
        assert!(feed.note.is_none());
    }
}
