//! HTTP transport used by every provider client.
//!
//! Adapters talk to the network only through [`HttpTransport`], so a stuck
//! provider is bounded by the client timeout and tests can script responses
//! with [`MockTransport`].

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout for provider calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait for JSON-over-HTTP clients.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET a URL and parse the body as JSON.
    async fn get_json(&self, url: &str) -> FeedResult<Value>;

    /// POST a JSON body and parse the response body as JSON.
    async fn post_json(&self, url: &str, body: &Value) -> FeedResult<Value>;
}

/// reqwest-backed transport with a request timeout on every call.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> FeedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn read_json(response: reqwest::Response, url: &str) -> FeedResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
                url: redact(url),
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> FeedResult<Value> {
        let response = self.client.get(url).send().await?;
        Self::read_json(response, url).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> FeedResult<Value> {
        let response = self.client.post(url).json(body).send().await?;
        Self::read_json(response, url).await
    }
}

/// Strip query strings and path keys from URLs before they reach logs.
pub fn redact(url: &str) -> String {
    let base = url.split('?').next().unwrap_or(url);
    match base.find("/v2/") {
        Some(idx) => format!("{}/v2/***", &base[..idx]),
        None => base.to_string(),
    }
}

/// Make a JSON-RPC 2.0 call and return the `result` field.
pub async fn rpc_call(
    transport: &dyn HttpTransport,
    url: &str,
    method: &str,
    params: Value,
) -> FeedResult<Value> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    let envelope = transport.post_json(url, &body).await?;

    if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        debug!(method, error = %message, "RPC returned error");
        return Err(FeedError::Rpc {
            method: method.to_string(),
            message,
        });
    }

    match envelope.get("result") {
        Some(result) if !result.is_null() => Ok(result.clone()),
        _ => Err(FeedError::ParseError(format!(
            "{}: missing 'result' field",
            method
        ))),
    }
}

/// A request observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub url: String,
    /// JSON body for POST requests, None for GET
    pub body: Option<Value>,
}

impl MockRequest {
    /// JSON-RPC method name, if this is a JSON-RPC POST.
    pub fn rpc_method(&self) -> Option<&str> {
        self.body.as_ref()?.get("method")?.as_str()
    }

    /// JSON-RPC params (Null when absent).
    pub fn rpc_params(&self) -> &Value {
        static NULL: Value = Value::Null;
        self.body
            .as_ref()
            .and_then(|b| b.get("params"))
            .unwrap_or(&NULL)
    }
}

type MockHandler = Box<dyn Fn(&MockRequest) -> FeedResult<Value> + Send + Sync>;

/// Scripted transport for tests and offline runs.
pub struct MockTransport {
    handler: MockHandler,
    calls: Mutex<Vec<MockRequest>>,
}

impl MockTransport {
    /// Create a transport that answers every request with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&MockRequest) -> FeedResult<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Transport where every request fails to connect.
    pub fn unreachable() -> Self {
        Self::new(|req| Err(FeedError::ConnectionFailed(format!("unreachable: {}", req.url))))
    }

    /// All requests made so far.
    pub fn calls(&self) -> Vec<MockRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of requests whose URL contains `fragment`.
    pub fn count_url(&self, fragment: &str) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }

    /// Number of JSON-RPC requests for `method`.
    pub fn count_rpc(&self, method: &str) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.rpc_method() == Some(method))
            .count()
    }

    fn handle(&self, request: MockRequest) -> FeedResult<Value> {
        let result = (self.handler)(&request);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }
        result
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get_json(&self, url: &str) -> FeedResult<Value> {
        self.handle(MockRequest {
            url: url.to_string(),
            body: None,
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> FeedResult<Value> {
        self.handle(MockRequest {
            url: url.to_string(),
            body: Some(body.clone()),
        })
    }
}

/// Wrap a value in a JSON-RPC success envelope.
pub fn rpc_result(result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result })
}

/// Build a JSON-RPC error envelope.
pub fn rpc_error(code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": code, "message": message } })
}

/// HTTP status failure as the real transport reports it.
pub fn http_status(status: u16, url: &str) -> FeedError {
    FeedError::HttpStatus {
        status,
        url: url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rpc_call_returns_result() {
        let transport = MockTransport::new(|req| {
            assert_eq!(req.rpc_method(), Some("eth_blockNumber"));
            Ok(rpc_result(json!("0x10")))
        });
        let result = rpc_call(&transport, "http://node", "eth_blockNumber", json!([]))
            .await
            .unwrap();
        assert_eq!(result, json!("0x10"));
        assert_eq!(transport.count_rpc("eth_blockNumber"), 1);
    }

    #[tokio::test]
    async fn test_rpc_call_maps_error_envelope() {
        let transport = MockTransport::new(|_| Ok(rpc_error(-32005, "limit exceeded")));
        let err = rpc_call(&transport, "http://node", "eth_getLogs", json!([]))
            .await
            .unwrap_err();
        match err {
            FeedError::Rpc { method, message } => {
                assert_eq!(method, "eth_getLogs");
                assert_eq!(message, "limit exceeded");
            }
            other => panic!("Expected Rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rpc_call_null_result_is_error() {
        let transport = MockTransport::new(|_| Ok(rpc_result(Value::Null)));
        let result = rpc_call(&transport, "http://node", "getBlock", json!([1])).await;
        assert!(matches!(result, Err(FeedError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_unreachable_transport_records_calls() {
        let transport = MockTransport::unreachable();
        assert!(transport.get_json("http://a/mempool/txids").await.is_err());
        assert_eq!(transport.count_url("/mempool/txids"), 1);
    }

    #[test]
    fn test_redact_hides_keys() {
        assert_eq!(
            redact("https://eth-mainnet.g.alchemy.com/v2/secret"),
            "https://eth-mainnet.g.alchemy.com/v2/***"
        );
        assert_eq!(
            redact("https://api.helius.xyz/v0/addresses/x/transactions?api-key=secret"),
            "https://api.helius.xyz/v0/addresses/x/transactions"
        );
    }
}
