//! Helpers shared by the Ethereum adapters: hex quantities, public node
//! liveness and indexer pagination.

use crate::config::IndexerConfig;
use crate::error::{FeedError, FeedResult};
use crate::transport::{redact, rpc_call, HttpTransport};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use whale_core::units::{now_secs, raw_to_amount};
use whale_core::{Asset, Chain, Transfer};

/// Format a block number as a JSON-RPC quantity.
pub fn to_hex(n: u64) -> String {
    format!("0x{:x}", n)
}

fn hex_digits(s: &str) -> Option<&str> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let trimmed = digits.trim_start_matches('0');
    if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(trimmed)
}

/// Parse a hex quantity (`0x1b4`) into u64.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let digits = hex_digits(s)?;
    if digits.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Parse a hex quantity or 32-byte word into u128.
/// Values wider than 128 bits are rejected.
pub fn parse_hex_u128(s: &str) -> Option<u128> {
    let digits = hex_digits(s)?;
    if digits.is_empty() {
        return Some(0);
    }
    if digits.len() > 32 {
        return None;
    }
    u128::from_str_radix(digits, 16).ok()
}

/// Extract the address from an indexed log topic (last 20 bytes).
pub fn topic_to_address(topic: &str) -> Option<String> {
    let digits = topic.strip_prefix("0x")?;
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", digits[24..].to_lowercase()))
}

/// Latest block number from `eth_blockNumber`.
pub async fn block_number(transport: &dyn HttpTransport, url: &str) -> FeedResult<u64> {
    let result = rpc_call(transport, url, "eth_blockNumber", json!([])).await?;
    result
        .as_str()
        .and_then(parse_hex_u64)
        .ok_or_else(|| FeedError::ParseError(format!("eth_blockNumber: bad quantity {}", result)))
}

/// First endpoint that answers `eth_blockNumber`, with its head block.
pub async fn first_live_endpoint<'a>(
    transport: &dyn HttpTransport,
    endpoints: &'a [String],
) -> FeedResult<(&'a str, u64)> {
    for url in endpoints {
        match block_number(transport, url).await {
            Ok(head) => return Ok((url.as_str(), head)),
            Err(e) => debug!(endpoint = %redact(url), error = %e, "Endpoint not live"),
        }
    }
    Err(FeedError::NoLiveEndpoint(endpoints.len()))
}

/// Run a paginated `alchemy_getAssetTransfers` query over the lookback window.
///
/// `filter` supplies `category` and optionally `contractAddresses`. Pages are
/// followed via `pageKey` until none is returned or `max_pages` is reached.
/// A failing first page is an error; a failing later page ends pagination
/// with what was already collected.
pub async fn fetch_asset_transfers(
    transport: &dyn HttpTransport,
    indexer: &IndexerConfig,
    url: &str,
    filter: Map<String, Value>,
) -> FeedResult<Vec<Value>> {
    let head = block_number(transport, url).await?;
    let from_block = head.saturating_sub(indexer.lookback_blocks);

    let mut transfers = Vec::new();
    let mut page_key: Option<String> = None;

    for page in 0..indexer.max_pages {
        let mut params = filter.clone();
        params.insert("fromBlock".into(), json!(to_hex(from_block)));
        params.insert("toBlock".into(), json!("latest"));
        params.insert("withMetadata".into(), json!(true));
        params.insert("excludeZeroValue".into(), json!(true));
        params.insert("maxCount".into(), json!(to_hex(indexer.page_size)));
        params.insert("order".into(), json!("desc"));
        if let Some(key) = &page_key {
            params.insert("pageKey".into(), json!(key));
        }

        let result = match rpc_call(
            transport,
            url,
            "alchemy_getAssetTransfers",
            json!([Value::Object(params)]),
        )
        .await
        {
            Ok(result) => result,
            Err(e) if page > 0 => {
                debug!(page, error = %e, "Indexer page failed, keeping earlier pages");
                break;
            }
            Err(e) => return Err(e),
        };

        if let Some(items) = result.get("transfers").and_then(Value::as_array) {
            transfers.extend(items.iter().cloned());
        }

        page_key = result
            .get("pageKey")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        if page_key.is_none() {
            break;
        }
    }

    debug!(count = transfers.len(), from_block, "Indexer transfers fetched");
    Ok(transfers)
}

/// One record of an `alchemy_getAssetTransfers` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedTransfer {
    pub hash: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// Decimal amount as computed by the indexer
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub raw_contract: Option<RawContract>,
    #[serde(default)]
    pub metadata: Option<TransferMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContract {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub decimal: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    #[serde(default)]
    pub block_timestamp: Option<String>,
}

impl IndexedTransfer {
    /// Decode one record, None when malformed.
    pub fn parse(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Lowercase contract address, if the record is a token transfer.
    pub fn contract(&self) -> Option<String> {
        self.raw_contract
            .as_ref()?
            .address
            .as_ref()
            .map(|a| a.to_lowercase())
    }

    /// Amount in whole units. Prefers the exact raw value, falls back to
    /// the indexer's decimal value.
    pub fn amount(&self, default_decimals: u32) -> Option<f64> {
        let exact = self.raw_contract.as_ref().and_then(|raw| {
            let value = parse_hex_u128(raw.value.as_deref()?)?;
            let decimals = raw
                .decimal
                .as_deref()
                .and_then(parse_hex_u64)
                .map(|d| d as u32)
                .unwrap_or(default_decimals);
            Some(raw_to_amount(value, decimals))
        });
        exact.or(self.value)
    }

    /// Block timestamp in unix seconds, observation time if unknown.
    pub fn timestamp(&self) -> u64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.block_timestamp.as_deref())
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .and_then(|dt| u64::try_from(dt.timestamp()).ok())
            .unwrap_or_else(now_secs)
    }

    /// Convert into a normalized transfer.
    pub fn into_transfer(self, asset: Asset, decimals: u32, price: f64) -> Option<Transfer> {
        let amount = self.amount(decimals)?;
        let timestamp = self.timestamp();
        Transfer::from_amount(
            Chain::Ethereum,
            asset,
            amount,
            price,
            self.from.unwrap_or_default(),
            self.to.unwrap_or_default(),
            self.hash,
            timestamp,
        )
    }
}
