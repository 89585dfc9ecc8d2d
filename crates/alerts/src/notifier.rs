//! Alert dispatch logic.

use crate::config::{AlertPayload, AlertRule};
use crate::db::AlertStateStore;
use crate::webhook::WebhookClient;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use whale_core::Transfer;

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Transfers over the threshold that had not been alerted before
    pub candidates: usize,
    /// Webhook calls that succeeded
    pub delivered: usize,
    /// Webhook calls that failed (their hashes stay alerted)
    pub failed: usize,
}

/// Sends at most one webhook call per transfer hash, ever.
///
/// Each hash is claimed in the store before the POST, so a crash or a
/// failed request never leads to a second delivery.
#[derive(Clone)]
pub struct AlertDispatcher {
    store: AlertStateStore,
    client: Arc<dyn WebhookClient>,
}

impl AlertDispatcher {
    pub fn new(store: AlertStateStore, client: Arc<dyn WebhookClient>) -> Self {
        Self { store, client }
    }

    pub fn store(&self) -> &AlertStateStore {
        &self.store
    }

    /// Alert on every new transfer at or above the rule's threshold.
    pub async fn dispatch(&self, transfers: &[Transfer], rule: &AlertRule) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !rule.is_active() {
            return report;
        }

        for transfer in transfers.iter().filter(|t| rule.matches(t)) {
            match self.store.claim(transfer).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(hash = %transfer.tx_hash, "Skipping alert: already sent");
                    continue;
                }
                Err(e) => {
                    warn!(hash = %transfer.tx_hash, error = %e, "Skipping alert: state store failed");
                    continue;
                }
            }
            report.candidates += 1;

            let payload = AlertPayload::from_transfer(transfer, rule.threshold_usd);
            match self.client.post(&rule.webhook_url, &payload).await {
                Ok(()) => {
                    info!(
                        chain = %transfer.chain,
                        asset = %transfer.asset,
                        usd = transfer.usd_value,
                        hash = %transfer.tx_hash,
                        "Alert sent"
                    );
                    report.delivered += 1;
                }
                Err(e) => {
                    error!(hash = %transfer.tx_hash, error = %e, "Failed to send alert");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
