//! Core data types for the whale watcher.

pub mod asset;
pub mod chain;
pub mod transfer;
pub mod units;

pub use asset::*;
pub use chain::*;
pub use transfer::*;

use thiserror::Error;

/// Errors parsing identifiers from strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
}
