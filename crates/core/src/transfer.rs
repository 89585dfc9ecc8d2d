//! Normalized transfer records and adapter query/response types.

use crate::units::{raw_to_amount, usd_value};
use crate::{Asset, Chain, PriceMap};
use serde::{Deserialize, Serialize};

/// A single large value transfer, normalized across chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Chain the transfer happened on
    pub chain: Chain,
    /// Asset moved
    pub asset: Asset,
    /// Amount in whole units of the asset (not base units)
    pub amount: f64,
    /// amount × USD price of the asset
    pub usd_value: f64,
    /// Sender address ("mempool" / "block" for Bitcoin)
    pub from: String,
    /// Recipient address ("multiple" for Bitcoin batch outputs)
    pub to: String,
    /// Transaction hash or signature; identity key for dedup and alerts
    pub tx_hash: String,
    /// Unix seconds, block time when known, else observation time
    pub timestamp: u64,
}

impl Transfer {
    /// Build a transfer from chain-native base units.
    /// Returns None for zero-value records (approvals, failed calls).
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw(
        chain: Chain,
        asset: Asset,
        raw: u128,
        decimals: u32,
        price: f64,
        from: impl Into<String>,
        to: impl Into<String>,
        tx_hash: impl Into<String>,
        timestamp: u64,
    ) -> Option<Self> {
        if raw == 0 {
            return None;
        }
        let amount = raw_to_amount(raw, decimals);
        Self::from_amount(chain, asset, amount, price, from, to, tx_hash, timestamp)
    }

    /// Build a transfer from an already-decimal amount (indexers that report
    /// token amounts in whole units). Returns None unless amount > 0.
    #[allow(clippy::too_many_arguments)]
    pub fn from_amount(
        chain: Chain,
        asset: Asset,
        amount: f64,
        price: f64,
        from: impl Into<String>,
        to: impl Into<String>,
        tx_hash: impl Into<String>,
        timestamp: u64,
    ) -> Option<Self> {
        if amount <= 0.0 || !amount.is_finite() {
            return None;
        }
        let tx_hash = tx_hash.into();
        if tx_hash.is_empty() {
            return None;
        }
        Some(Self {
            chain,
            asset,
            amount,
            usd_value: usd_value(amount, price),
            from: from.into(),
            to: to.into(),
            tx_hash,
            timestamp,
        })
    }

    /// Check if this transfer meets a USD threshold.
    #[inline]
    pub fn qualifies(&self, min_usd: f64) -> bool {
        self.amount > 0.0 && self.usd_value >= min_usd
    }

    /// Block explorer URL for this transfer.
    pub fn explorer_url(&self) -> String {
        self.chain.explorer_tx_url(&self.tx_hash)
    }
}

/// Input to every chain adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterQuery {
    /// Minimum USD value for a transfer to be reported
    pub min_usd: f64,
    /// USD price per asset
    pub prices: PriceMap,
    /// Solana only: report USDC token transfers instead of native SOL
    #[serde(default)]
    pub stablecoin_only: bool,
}

impl AdapterQuery {
    pub fn new(min_usd: f64, prices: PriceMap) -> Self {
        Self {
            min_usd,
            prices,
            stablecoin_only: false,
        }
    }

    pub fn with_stablecoin_only(mut self, stablecoin_only: bool) -> Self {
        self.stablecoin_only = stablecoin_only;
        self
    }
}

/// Output of an adapter or the aggregator.
///
/// `note` carries a human-readable capability caveat and is never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferFeed {
    pub items: Vec<Transfer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TransferFeed {
    pub fn new(items: Vec<Transfer>) -> Self {
        Self { items, note: None }
    }

    /// Empty result explained by a note.
    pub fn empty_with_note(note: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            note: Some(note.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Sort transfers by USD value, largest first. Stable, so equal values keep
/// their relative order.
pub fn sort_by_usd_desc(items: &mut [Transfer]) {
    items.sort_by(|a, b| b.usd_value.total_cmp(&a.usd_value));
}
