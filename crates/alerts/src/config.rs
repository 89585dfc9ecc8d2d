//! Alert rule and payload types.

use serde::{Deserialize, Serialize};
use whale_core::Transfer;

/// Value of the `event` field in every alert payload.
pub const ALERT_EVENT: &str = "whale_transfer";

/// When and where to send alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Whether alerts are enabled
    pub enabled: bool,
    /// Minimum USD value to alert on
    pub threshold_usd: f64,
    /// Destination URL; empty disables delivery
    pub webhook_url: String,
}

impl Default for AlertRule {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_usd: 10_000_000.0,
            webhook_url: String::new(),
        }
    }
}

impl AlertRule {
    pub fn new(threshold_usd: f64, webhook_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            threshold_usd,
            webhook_url: webhook_url.into(),
        }
    }

    /// Enabled and has somewhere to deliver to.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.webhook_url.trim().is_empty()
    }

    /// Check if a transfer is large enough to alert on.
    pub fn matches(&self, transfer: &Transfer) -> bool {
        transfer.usd_value >= self.threshold_usd
    }
}

/// JSON body POSTed to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub event: String,
    pub chain: String,
    pub asset: String,
    pub amount: f64,
    pub usd: f64,
    pub from: String,
    pub to: String,
    pub hash: String,
    /// Block explorer link for the transaction
    pub url: String,
    pub ts: u64,
    /// Threshold that triggered the alert
    pub threshold: f64,
}

impl AlertPayload {
    pub fn from_transfer(transfer: &Transfer, threshold: f64) -> Self {
        Self {
            event: ALERT_EVENT.to_string(),
            chain: transfer.chain.as_str().to_string(),
            asset: transfer.asset.symbol().to_string(),
            amount: transfer.amount,
            usd: transfer.usd_value,
            from: transfer.from.clone(),
            to: transfer.to.clone(),
            hash: transfer.tx_hash.clone(),
            url: transfer.explorer_url(),
            ts: transfer.timestamp,
            threshold,
        }
    }
}
