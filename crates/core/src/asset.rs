//! Asset definitions and USD price maps.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Kind of value moved by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Eth,
    Usdc,
    Usdt,
    Btc,
    Sol,
}

impl Asset {
    /// Ticker symbol (e.g., "ETH", "USDC").
    pub fn symbol(self) -> &'static str {
        match self {
            Asset::Eth => "ETH",
            Asset::Usdc => "USDC",
            Asset::Usdt => "USDT",
            Asset::Btc => "BTC",
            Asset::Sol => "SOL",
        }
    }

    /// Decimal places of the chain-native base unit
    /// (wei, token base units, satoshi, lamports).
    pub fn decimals(self) -> u32 {
        match self {
            Asset::Eth => 18,
            Asset::Usdc | Asset::Usdt => 6,
            Asset::Btc => 8,
            Asset::Sol => 9,
        }
    }

    /// Check if this asset is a USD stablecoin.
    #[inline]
    pub fn is_stablecoin(self) -> bool {
        matches!(self, Asset::Usdc | Asset::Usdt)
    }

    /// Get all asset variants.
    pub fn all() -> &'static [Asset] {
        &[Asset::Eth, Asset::Usdc, Asset::Usdt, Asset::Btc, Asset::Sol]
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Asset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ETH" => Ok(Asset::Eth),
            "USDC" => Ok(Asset::Usdc),
            "USDT" => Ok(Asset::Usdt),
            "BTC" => Ok(Asset::Btc),
            "SOL" => Ok(Asset::Sol),
            _ => Err(ParseError::UnknownAsset(s.to_string())),
        }
    }
}

/// USD price per whole unit of each asset.
///
/// Missing assets read as 0.0, which keeps their transfers below any
/// positive threshold instead of failing the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceMap(HashMap<Asset, f64>);

impl PriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the USD price of an asset, 0.0 if unknown.
    #[inline]
    pub fn get(&self, asset: Asset) -> f64 {
        self.0.get(&asset).copied().unwrap_or(0.0)
    }

    /// Set the USD price of an asset.
    pub fn set(&mut self, asset: Asset, price: f64) {
        self.0.insert(asset, price);
    }

    /// Builder-style setter.
    pub fn with(mut self, asset: Asset, price: f64) -> Self {
        self.set(asset, price);
        self
    }

    /// True if at least one non-stablecoin asset has a positive price.
    ///
    /// Stablecoins are ignored because they default to par.
    pub fn is_loaded(&self) -> bool {
        self.0
            .iter()
            .any(|(asset, price)| !asset.is_stablecoin() && *price > 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Asset, f64)> + '_ {
        self.0.iter().map(|(a, p)| (*a, *p))
    }
}

impl FromIterator<(Asset, f64)> for PriceMap {
    fn from_iter<I: IntoIterator<Item = (Asset, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_decimals() {
        assert_eq!(Asset::Eth.decimals(), 18);
        assert_eq!(Asset::Btc.decimals(), 8);
        assert_eq!(Asset::Sol.decimals(), 9);
        assert_eq!(Asset::Usdc.decimals(), 6);
        assert_eq!(Asset::Usdt.decimals(), 6);
    }

    #[test]
    fn test_asset_stablecoin() {
        assert!(Asset::Usdc.is_stablecoin());
        assert!(Asset::Usdt.is_stablecoin());
        assert!(!Asset::Eth.is_stablecoin());
        assert!(!Asset::Sol.is_stablecoin());
    }

    #[test]
    fn test_asset_from_str() {
        assert_eq!("usdc".parse::<Asset>().unwrap(), Asset::Usdc);
        assert_eq!("ETH".parse::<Asset>().unwrap(), Asset::Eth);
        assert!("DOGE".parse::<Asset>().is_err());
    }

    #[test]
    fn test_asset_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Asset::Usdt).unwrap(), "\"USDT\"");
    }

    #[test]
    fn test_price_map_missing_is_zero() {
        let prices = PriceMap::new().with(Asset::Eth, 4000.0);
        assert_eq!(prices.get(Asset::Eth), 4000.0);
        assert_eq!(prices.get(Asset::Btc), 0.0);
        assert!(prices.is_loaded());
        assert!(!PriceMap::new().is_loaded());
    }

    #[test]
    fn test_price_map_stablecoins_alone_not_loaded() {
        let prices = PriceMap::new()
            .with(Asset::Usdc, 1.0)
            .with(Asset::Usdt, 1.0);
        assert!(!prices.is_loaded());
        assert!(prices.with(Asset::Btc, 60_000.0).is_loaded());
    }

    #[test]
    fn test_price_map_from_iter() {
        let prices: PriceMap = vec![(Asset::Sol, 200.0), (Asset::Usdc, 1.0)]
            .into_iter()
            .collect();
        assert_eq!(prices.get(Asset::Sol), 200.0);
        assert_eq!(prices.iter().count(), 2);
    }
}
