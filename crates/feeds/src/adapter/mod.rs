//! Chain adapter trait and implementations.
//!
//! Each chain has its own provider APIs and wire encodings.
//! Adapters normalize these into our internal [`Transfer`] format.
//!
//! [`Transfer`]: whale_core::Transfer

mod btc;
mod erc20;
mod eth;
pub mod evm;
mod sol;

pub use btc::BtcAdapter;
pub use erc20::Erc20Adapter;
pub use eth::EthAdapter;
pub use sol::{decode_system_transfer, SolAdapter, STABLECOIN_INDEXER_NOTE};

use crate::config::FeedsConfig;
use crate::price::PriceSource;
use crate::transport::HttpTransport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use whale_core::{AdapterQuery, Chain, TransferFeed};

/// Adapter identifiers, one per asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Eth,
    Erc20,
    Btc,
    Sol,
}

impl AdapterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterKind::Eth => "eth",
            AdapterKind::Erc20 => "erc20",
            AdapterKind::Btc => "btc",
            AdapterKind::Sol => "sol",
        }
    }

    pub fn chain(self) -> Chain {
        match self {
            AdapterKind::Eth | AdapterKind::Erc20 => Chain::Ethereum,
            AdapterKind::Btc => Chain::Bitcoin,
            AdapterKind::Sol => Chain::Solana,
        }
    }

    /// All adapters in merge order.
    pub fn all() -> &'static [AdapterKind] {
        &[AdapterKind::Eth, AdapterKind::Erc20, AdapterKind::Btc, AdapterKind::Sol]
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eth" => Ok(AdapterKind::Eth),
            "erc20" => Ok(AdapterKind::Erc20),
            "btc" => Ok(AdapterKind::Btc),
            "sol" => Ok(AdapterKind::Sol),
            other => Err(format!("Unknown adapter: {}", other)),
        }
    }
}

/// Trait for per-chain transfer sources.
///
/// `fetch` is infallible: provider and decode failures degrade to an empty
/// list, capability gaps to an empty list plus a note. Output is filtered at
/// `query.min_usd`, unique by hash and sorted by USD value descending.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Short name used in logs and diagnostics
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn kind(&self) -> AdapterKind;

    fn chain(&self) -> Chain {
        self.kind().chain()
    }

    async fn fetch(&self, query: &AdapterQuery) -> TransferFeed;
}

/// Build all four adapters over one transport.
///
/// `price_source` lets the ERC-20 adapter fill in missing stablecoin prices.
pub fn build_adapters(
    config: &FeedsConfig,
    transport: Arc<dyn HttpTransport>,
    price_source: Option<Arc<dyn PriceSource>>,
) -> Vec<Arc<dyn ChainAdapter>> {
    let mut erc20 = Erc20Adapter::new(transport.clone(), config.erc20.clone());
    if let Some(source) = price_source {
        erc20 = erc20.with_price_source(source);
    }

    vec![
        Arc::new(EthAdapter::new(transport.clone(), config.eth.clone())),
        Arc::new(erc20),
        Arc::new(BtcAdapter::new(transport.clone(), config.btc.clone())),
        Arc::new(SolAdapter::new(transport, config.sol.clone())),
    ]
}
