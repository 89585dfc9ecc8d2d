//! Diagnostics HTTP API.
//!
//! Read-only views over the latest poll: the ranked feed, provider health
//! and per-adapter results.

use crate::state::{ProviderKeys, SharedState, StatsSummary};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use whale_core::{PriceMap, Transfer};
use whale_feeds::AdapterReport;

const HEALTH_NOTES: [&str; 2] = [
    "Without indexer keys, adapters fall back to public RPC with less coverage.",
    "If prices are zero or missing, USD filters hide every transfer.",
];

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub items: Vec<Transfer>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub env: ProviderKeys,
    pub prices: PriceMap,
    pub prices_updated_at: u64,
    pub stats: StatsSummary,
    pub notes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagResponse {
    pub polled_at: Option<DateTime<Utc>>,
    pub adapters: Vec<AdapterReport>,
    pub notes: Vec<String>,
}

/// Create the API router.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/feed", get(feed_handler))
        .route("/api/health", get(health_handler))
        .route("/api/diag", get(diag_handler))
        .layer(cors)
        .with_state(state)
}

async fn feed_handler(State(state): State<SharedState>) -> Json<FeedResponse> {
    let items = state
        .snapshot()
        .await
        .map(|s| s.items)
        .unwrap_or_default();
    Json(FeedResponse { items })
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        env: state.keys,
        prices: state.prices.get().await,
        prices_updated_at: state.prices.updated_at(),
        stats: state.stats.summary(),
        notes: HEALTH_NOTES.iter().map(|n| n.to_string()).collect(),
    })
}

async fn diag_handler(State(state): State<SharedState>) -> Json<DiagResponse> {
    match state.snapshot().await {
        Some(snapshot) => Json(DiagResponse {
            polled_at: Some(snapshot.polled_at),
            adapters: snapshot.adapters,
            notes: snapshot.notes,
        }),
        None => Json(DiagResponse {
            polled_at: None,
            adapters: Vec::new(),
            notes: vec!["No poll has completed yet".to_string()],
        }),
    }
}

/// Bind the API server and serve it in the background.
pub async fn start_api_server(
    state: SharedState,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Diagnostics API listening on http://0.0.0.0:{}", port);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(())
}
