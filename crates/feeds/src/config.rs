//! Provider configuration injected into the chain adapters.
//!
//! Windows, chunk sizes, page caps and endpoints live here rather than in
//! module constants so tests can shrink them without touching adapter logic.

use serde::{Deserialize, Serialize};
use whale_core::Asset;

/// ERC-20 `Transfer(address,address,uint256)` event topic.
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Solana System Program id.
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// USDC mint on Solana mainnet.
pub const SOLANA_USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Alchemy mainnet endpoint for a key.
pub fn alchemy_url(key: &str) -> String {
    format!("https://eth-mainnet.g.alchemy.com/v2/{}", key)
}

/// Tracked ERC-20 token contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenContract {
    pub asset: Asset,
    /// Lowercase hex contract address
    pub address: String,
    pub decimals: u32,
}

impl TokenContract {
    pub fn new(asset: Asset, address: &str, decimals: u32) -> Self {
        Self {
            asset,
            address: address.to_lowercase(),
            decimals,
        }
    }

    /// USDC on Ethereum mainnet.
    pub fn usdc() -> Self {
        Self::new(Asset::Usdc, "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", 6)
    }

    /// USDT on Ethereum mainnet.
    pub fn usdt() -> Self {
        Self::new(Asset::Usdt, "0xdac17f958d2ee523a2206206994597c13d831ec7", 6)
    }
}

/// Indexer pagination settings shared by the EVM adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// JSON-RPC URL of the indexer, None when no key is configured
    pub url: Option<String>,
    /// Blocks behind head where the indexer window starts
    pub lookback_blocks: u64,
    /// Maximum pages to follow per query
    pub max_pages: usize,
    /// Page size requested from the indexer
    pub page_size: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: None,
            lookback_blocks: 300,
            max_pages: 3,
            page_size: 1000,
        }
    }
}

/// Default public Ethereum nodes, tried in order.
pub fn default_eth_endpoints() -> Vec<String> {
    vec![
        "https://cloudflare-eth.com".to_string(),
        "https://ethereum-rpc.publicnode.com".to_string(),
        "https://rpc.ankr.com/eth".to_string(),
    ]
}

/// Native ETH adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthConfig {
    pub indexer: IndexerConfig,
    /// Public nodes for the fallback scan, first live one wins
    pub rpc_endpoints: Vec<String>,
    /// Blocks scanned by the fallback, newest first
    pub scan_blocks: u64,
    /// Primary results below this count are merged with the fallback
    pub min_primary_results: usize,
}

impl Default for EthConfig {
    fn default() -> Self {
        Self {
            // Recent window only; the block scan reaches further back
            indexer: IndexerConfig {
                lookback_blocks: 10,
                ..IndexerConfig::default()
            },
            rpc_endpoints: default_eth_endpoints(),
            scan_blocks: 20,
            min_primary_results: 1,
        }
    }
}

/// ERC-20 stablecoin adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Erc20Config {
    pub indexer: IndexerConfig,
    pub rpc_endpoints: Vec<String>,
    pub tokens: Vec<TokenContract>,
    /// Blocks covered by the log fallback (~8-10 hours)
    pub scan_blocks: u64,
    /// Maximum block range per `eth_getLogs` request
    pub chunk_size: u64,
    pub min_primary_results: usize,
}

impl Default for Erc20Config {
    fn default() -> Self {
        Self {
            indexer: IndexerConfig::default(),
            rpc_endpoints: default_eth_endpoints(),
            tokens: vec![TokenContract::usdc(), TokenContract::usdt()],
            scan_blocks: 2500,
            chunk_size: 1000,
            min_primary_results: 1,
        }
    }
}

/// Bitcoin explorer adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcConfig {
    /// Esplora-style REST base URL
    pub base_url: String,
    /// Mempool transactions fetched individually by strategy (a)
    pub max_mempool_txids: usize,
    /// Concurrent `/tx/{id}` requests
    pub tx_fetch_concurrency: usize,
    /// Confirmed blocks scanned by strategy (c)
    pub recent_blocks: usize,
}

impl Default for BtcConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mempool.space/api".to_string(),
            max_mempool_txids: 250,
            tx_fetch_concurrency: 8,
            recent_blocks: 3,
        }
    }
}

/// Wire encoding of compiled instruction data in `getBlock` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionEncoding {
    /// What `getBlock` returns with `encoding: "json"`
    #[default]
    Base58,
    Base64,
}

/// Solana adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolConfig {
    /// Public JSON-RPC node for the slot scan
    pub rpc_url: String,
    /// Helius API key; enables the indexer path
    pub helius_api_key: Option<String>,
    /// Helius REST base URL
    pub helius_base_url: String,
    /// Most recent slots scanned without an indexer
    pub slots_to_scan: u64,
    pub max_pages: usize,
    pub page_size: u32,
    pub min_primary_results: usize,
    pub usdc_mint: String,
    pub instruction_encoding: InstructionEncoding,
}

impl Default for SolConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            helius_api_key: None,
            helius_base_url: "https://api.helius.xyz".to_string(),
            slots_to_scan: 4,
            max_pages: 3,
            page_size: 100,
            min_primary_results: 1,
            usdc_mint: SOLANA_USDC_MINT.to_string(),
            instruction_encoding: InstructionEncoding::Base58,
        }
    }
}

/// USD price oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceOracleConfig {
    pub url: String,
}

impl Default for PriceOracleConfig {
    fn default() -> Self {
        Self {
            url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
        }
    }
}

/// All provider configuration for one process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedsConfig {
    pub eth: EthConfig,
    pub erc20: Erc20Config,
    pub btc: BtcConfig,
    pub sol: SolConfig,
    pub prices: PriceOracleConfig,
}

impl FeedsConfig {
    /// Build config with indexer keys from the environment.
    /// Uses ALCHEMY_ETH_MAINNET_KEY and HELIUS_API_KEY.
    pub fn from_env() -> Self {
        let alchemy = non_empty_env("ALCHEMY_ETH_MAINNET_KEY");
        let helius = non_empty_env("HELIUS_API_KEY");
        Self::default().with_keys(alchemy.as_deref(), helius.as_deref())
    }

    /// Apply indexer keys (empty or None leaves the indexer disabled).
    pub fn with_keys(mut self, alchemy_key: Option<&str>, helius_key: Option<&str>) -> Self {
        if let Some(key) = alchemy_key.filter(|k| !k.is_empty()) {
            let url = alchemy_url(key);
            self.eth.indexer.url = Some(url.clone());
            self.erc20.indexer.url = Some(url);
        }
        if let Some(key) = helius_key.filter(|k| !k.is_empty()) {
            self.sol.helius_api_key = Some(key.to_string());
        }
        self
    }

    /// Whether an Ethereum indexer key is configured.
    pub fn has_alchemy(&self) -> bool {
        self.eth.indexer.url.is_some()
    }

    /// Whether a Solana indexer key is configured.
    pub fn has_helius(&self) -> bool {
        self.sol.helius_api_key.is_some()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedsConfig::default();
        assert_eq!(config.eth.scan_blocks, 20);
        assert_eq!(config.eth.indexer.max_pages, 3);
        assert_eq!(config.erc20.scan_blocks, 2500);
        assert_eq!(config.erc20.chunk_size, 1000);
        assert_eq!(config.erc20.tokens.len(), 2);
        assert_eq!(config.btc.max_mempool_txids, 250);
        assert_eq!(config.btc.recent_blocks, 3);
        assert_eq!(config.sol.slots_to_scan, 4);
        assert!(!config.has_alchemy());
        assert!(!config.has_helius());
    }

    #[test]
    fn test_fallback_scans_reach_past_indexer_window() {
        let config = FeedsConfig::default();
        assert!(config.eth.scan_blocks > config.eth.indexer.lookback_blocks);
        assert!(config.erc20.scan_blocks > config.erc20.indexer.lookback_blocks);
    }

    #[test]
    fn test_with_keys() {
        let config = FeedsConfig::default().with_keys(Some("abc"), Some(""));
        assert!(config.has_alchemy());
        assert_eq!(
            config.erc20.indexer.url.as_deref(),
            Some("https://eth-mainnet.g.alchemy.com/v2/abc")
        );
        assert!(!config.has_helius());
    }

    #[test]
    fn test_token_contracts_are_lowercase() {
        let usdt = TokenContract::new(Asset::Usdt, "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6);
        assert_eq!(usdt, TokenContract::usdt());
    }
}
