//! Webhook alert system for whale transfers.
//!
//! This crate provides:
//! - SQLite-based alert state (hashes already alerted)
//! - Webhook delivery of alert payloads
//! - Threshold filtering and at-most-once dispatch

pub mod config;
pub mod db;
pub mod notifier;
pub mod webhook;

pub use config::{AlertPayload, AlertRule, ALERT_EVENT};
pub use db::{AlertStateStore, DbError};
pub use notifier::{AlertDispatcher, DispatchReport};
pub use webhook::{HttpWebhookClient, MockWebhookClient, WebhookClient, WebhookError};
