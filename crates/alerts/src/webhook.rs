//! Webhook delivery.

use crate::config::AlertPayload;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Webhook returned HTTP {0}")]
    Status(u16),
    #[error("Webhook delivery failed: {0}")]
    Delivery(String),
}

/// Sends alert payloads to a webhook URL. The response body is ignored.
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn post(&self, url: &str, payload: &AlertPayload) -> Result<(), WebhookError>;
}

/// reqwest-backed webhook client.
#[derive(Debug, Clone)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn post(&self, url: &str, payload: &AlertPayload) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Mock webhook client for testing.
#[derive(Default)]
pub struct MockWebhookClient {
    calls: Mutex<Vec<(String, AlertPayload)>>,
    fail: bool,
}

impl MockWebhookClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client that records every call and then fails it.
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// All (url, payload) pairs posted so far.
    pub fn calls(&self) -> Vec<(String, AlertPayload)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl WebhookClient for MockWebhookClient {
    async fn post(&self, url: &str, payload: &AlertPayload) -> Result<(), WebhookError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.to_string(), payload.clone()));
        }
        if self.fail {
            return Err(WebhookError::Delivery("mock failure".to_string()));
        }
        Ok(())
    }
}
