//! Whale Watcher - Headless Server
//!
//! Polls Ethereum, Bitcoin and Solana for large transfers, keeps a ranked
//! feed and sends webhook alerts for the biggest ones.

mod api;
mod config;
mod poller;
mod prices;
mod state;

use clap::Parser;
use config::{AppConfig, SettingsStore};
use poller::Poller;
use state::{create_state, ProviderKeys, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use whale_alerts::{AlertDispatcher, AlertStateStore, DbError, HttpWebhookClient};
use whale_feeds::{
    build_adapters, CoinGeckoOracle, FeedAggregator, FeedsConfig, HttpTransport, PriceSource,
    ReqwestTransport, DEFAULT_REQUEST_TIMEOUT,
};

/// Whale Watcher CLI
#[derive(Parser, Debug)]
#[command(name = "whale-watcher")]
#[command(about = "Multi-chain large transfer monitor", long_about = None)]
struct Args {
    /// Settings file path
    #[arg(short, long, default_value = "whale_settings.json")]
    settings: PathBuf,

    /// Alert state database URL
    #[arg(short, long, default_value = "sqlite:whale_alerts.db")]
    database_url: String,

    /// Seconds between poll cycles
    #[arg(long, default_value_t = 45)]
    poll_interval: u64,

    /// Seconds between price refreshes
    #[arg(long, default_value_t = 30)]
    price_refresh: u64,

    /// Per-adapter timeout in seconds
    #[arg(long, default_value_t = 25)]
    adapter_timeout: u64,

    /// Diagnostics API port
    #[arg(long, default_value_t = 9091)]
    http_port: u16,

    /// Maximum transfers kept in the feed
    #[arg(long, default_value_t = 50)]
    feed_limit: usize,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Forget every alerted transfer hash before starting
    #[arg(long, default_value_t = false)]
    reset_alerts: bool,
}

impl From<&Args> for AppConfig {
    fn from(args: &Args) -> Self {
        Self {
            settings_path: args.settings.clone(),
            database_url: args.database_url.clone(),
            poll_interval: Duration::from_secs(args.poll_interval.max(1)),
            price_refresh_interval: Duration::from_secs(args.price_refresh.max(1)),
            adapter_timeout: Duration::from_secs(args.adapter_timeout.max(1)),
            http_port: args.http_port,
            feed_limit: args.feed_limit,
        }
    }
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Optionally clear the alert state, then return the number of hashes on record.
async fn prepare_alert_state(store: &AlertStateStore, reset: bool) -> Result<i64, DbError> {
    if reset {
        let removed = store.reset().await?;
        warn!("Alert state reset: {} hashes forgotten", removed);
    }
    store.count().await
}

fn log_final_stats(state: &SharedState) {
    let summary = state.stats.summary();
    info!("Final Stats:");
    info!("  Total uptime: {} seconds", summary.uptime_secs);
    info!("  Polls: {} ({} skipped)", summary.polls, summary.polls_skipped);
    info!("  Transfers seen: {}", summary.transfers_seen);
    info!("  Alerts sent: {} ({} failed)", summary.alerts_sent, summary.alerts_failed);
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level);
    let config = AppConfig::from(&args);

    info!("Whale Watcher starting");
    info!("  Poll interval: {}s", config.poll_interval.as_secs());
    info!("  Adapter timeout: {}s", config.adapter_timeout.as_secs());

    let feeds_config = FeedsConfig::from_env();
    let keys = ProviderKeys {
        alchemy: feeds_config.has_alchemy(),
        helius: feeds_config.has_helius(),
    };
    if !keys.alchemy {
        warn!("ALCHEMY_ETH_MAINNET_KEY not set, Ethereum falls back to public RPC");
    }
    if !keys.helius {
        warn!("HELIUS_API_KEY not set, Solana falls back to public RPC");
    }

    let transport: Arc<dyn HttpTransport> = match ReqwestTransport::new(DEFAULT_REQUEST_TIMEOUT) {
        Ok(t) => Arc::new(t),
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            return;
        }
    };
    let oracle: Arc<dyn PriceSource> = Arc::new(CoinGeckoOracle::new(
        transport.clone(),
        feeds_config.prices.clone(),
    ));

    let adapters = build_adapters(&feeds_config, transport, Some(oracle.clone()));
    let aggregator = FeedAggregator::new(adapters)
        .with_timeout(config.adapter_timeout)
        .with_limit(config.feed_limit);

    let store = match AlertStateStore::connect(&config.database_url).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open alert state at {}: {}", config.database_url, e);
            return;
        }
    };
    match prepare_alert_state(&store, args.reset_alerts).await {
        Ok(n) => info!("  Alerted transfers on record: {}", n),
        Err(e) => {
            tracing::error!("Failed to prepare alert state: {}", e);
            return;
        }
    }

    let webhook = match HttpWebhookClient::new(DEFAULT_REQUEST_TIMEOUT) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to build webhook client: {}", e);
            return;
        }
    };
    let dispatcher = AlertDispatcher::new(store.clone(), webhook);

    let settings = SettingsStore::new(&config.settings_path);
    let initial = settings.load().await;
    info!("  Settings: {}", settings.path().display());
    if let Err(e) = settings.save(&initial).await {
        warn!("Failed to write settings file: {}", e);
    }
    info!(
        "  Adapters: {:?}, min ${}, alerts at ${}",
        initial.enabled_adapters(),
        initial.min_usd,
        initial.alert_usd
    );

    let state = create_state(keys);
    state.start();

    if let Err(e) = api::start_api_server(state.clone(), config.http_port).await {
        tracing::error!("Failed to start diagnostics API: {}", e);
        return;
    }

    if let Err(e) = state.prices.refresh(oracle.as_ref()).await {
        warn!("Initial price fetch failed, polls wait for prices: {}", e);
    }

    let price_handle = tokio::spawn(prices::run_price_updater(
        state.clone(),
        oracle,
        config.price_refresh_interval,
    ));

    let poller = Poller::new(state.clone(), settings, aggregator, dispatcher);
    let poll_handle = tokio::spawn(poller.run(config.poll_interval));

    info!("Running. Press Ctrl+C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");
    state.stop();

    // Loops exit on their next tick; don't wait for a full interval
    let _ = tokio::time::timeout(Duration::from_secs(2), poll_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), price_handle).await;

    store.close().await;
    log_final_stats(&state);

    info!("Whale Watcher stopped");
}
