//! Blockchain identifiers and explorer links.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Blockchain network a transfer was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Chain {
    Ethereum = 1,
    Bitcoin = 2,
    Solana = 3,
}

impl Chain {
    /// Get string representation (matches the serialized form).
    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bitcoin => "bitcoin",
            Chain::Solana => "solana",
        }
    }

    /// Block explorer page for a transaction on this chain.
    pub fn explorer_tx_url(self, tx_hash: &str) -> String {
        match self {
            Chain::Ethereum => format!("https://etherscan.io/tx/{}", tx_hash),
            Chain::Bitcoin => format!("https://mempool.space/tx/{}", tx_hash),
            Chain::Solana => format!("https://explorer.solana.com/tx/{}", tx_hash),
        }
    }

    /// Get all chain variants.
    pub fn all() -> &'static [Chain] {
        &[Chain::Ethereum, Chain::Bitcoin, Chain::Solana]
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "bitcoin" | "btc" => Ok(Chain::Bitcoin),
            "solana" | "sol" => Ok(Chain::Solana),
            _ => Err(ParseError::UnknownChain(s.to_string())),
        }
    }
}
