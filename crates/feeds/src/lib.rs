//! Transfer collection from blockchain indexers, public nodes and explorers.
//!
//! This crate provides per-chain adapters that find large value transfers
//! and an aggregator that merges them into one ranked feed.
//!
//! ## Architecture
//!
//! - `adapter/` - Chain-specific provider calls and decoding (`ChainAdapter`)
//! - `strategy` - Indexer-first provider ordering (`FallbackChain`)
//! - `aggregator` - Concurrent polling and merge (`FeedAggregator`, `merge_transfers`)
//! - `transport` - HTTP seam shared by every provider client

pub mod adapter;
pub mod aggregator;
pub mod config;
pub mod error;
pub mod price;
pub mod strategy;
pub mod transport;

pub use adapter::{
    build_adapters, AdapterKind, BtcAdapter, ChainAdapter, Erc20Adapter, EthAdapter, SolAdapter,
    STABLECOIN_INDEXER_NOTE,
};
pub use aggregator::*;
pub use config::*;
pub use error::*;
pub use price::{CoinGeckoOracle, PriceSource, StaticPrices};
pub use strategy::{ChainOutcome, FallbackChain};
pub use transport::{HttpTransport, MockTransport, ReqwestTransport, DEFAULT_REQUEST_TIMEOUT};
