//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use whale_alerts::AlertRule;
use whale_core::{AdapterQuery, PriceMap};
use whale_feeds::AdapterKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// User-editable settings, persisted as JSON.
///
/// Missing fields take their defaults, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enable_eth: bool,
    pub enable_erc20: bool,
    pub enable_btc: bool,
    pub enable_sol: bool,
    /// Report Solana USDC transfers instead of native SOL (needs an indexer key)
    pub sol_stablecoin_only: bool,
    /// Feed inclusion threshold in USD.
    pub min_usd: f64,
    pub alert_enabled: bool,
    /// Alert threshold in USD.
    pub alert_usd: f64,
    pub alert_webhook: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_eth: true,
            enable_erc20: true,
            enable_btc: true,
            enable_sol: true,
            sol_stablecoin_only: false,
            min_usd: 25_000.0,
            alert_enabled: true,
            alert_usd: 10_000_000.0,
            alert_webhook: String::new(),
        }
    }
}

impl Settings {
    /// Adapters switched on, in merge order.
    pub fn enabled_adapters(&self) -> Vec<AdapterKind> {
        AdapterKind::all()
            .iter()
            .copied()
            .filter(|kind| match kind {
                AdapterKind::Eth => self.enable_eth,
                AdapterKind::Erc20 => self.enable_erc20,
                AdapterKind::Btc => self.enable_btc,
                AdapterKind::Sol => self.enable_sol,
            })
            .collect()
    }

    pub fn alert_rule(&self) -> AlertRule {
        AlertRule {
            enabled: self.alert_enabled,
            threshold_usd: self.alert_usd,
            webhook_url: self.alert_webhook.clone(),
        }
    }

    /// Adapter query for one poll with the given prices.
    pub fn query(&self, prices: PriceMap) -> AdapterQuery {
        AdapterQuery::new(self.min_usd, prices).with_stablecoin_only(self.sol_stablecoin_only)
    }
}

/// JSON file holding [`Settings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings. A missing or unreadable file yields the defaults.
    pub async fn load(&self) -> Settings {
        match self.try_load().await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!(path = %self.path.display(), "No settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Invalid settings file, using defaults");
                Settings::default()
            }
        }
    }

    async fn try_load(&self) -> Result<Option<Settings>, ConfigError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Write settings, creating parent directories as needed.
    pub async fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Process-level configuration from the command line.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings_path: PathBuf,
    pub database_url: String,
    pub poll_interval: Duration,
    pub price_refresh_interval: Duration,
    pub adapter_timeout: Duration,
    pub http_port: u16,
    pub feed_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("whale_settings.json"),
            database_url: "sqlite:whale_alerts.db".to_string(),
            poll_interval: Duration::from_secs(45),
            price_refresh_interval: Duration::from_secs(30),
            adapter_timeout: Duration::from_secs(25),
            http_port: 9091,
            feed_limit: 50,
        }
    }
}
