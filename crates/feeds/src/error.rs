//! Error types for provider operations.

use thiserror::Error;

/// Errors that can occur while talking to indexers, nodes and explorers.
///
/// These never leave an adapter: every adapter turns them into an empty
/// result for the failed attempt.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("RPC error from {method}: {message}")]
    Rpc { method: String, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("No live endpoint among {0} candidates")]
    NoLiveEndpoint(usize),

    #[error("Provider not configured: {0}")]
    NotConfigured(&'static str),
}

/// Result type for provider operations.
pub type FeedResult<T> = Result<T, FeedError>;

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl From<url::ParseError> for FeedError {
    fn from(err: url::ParseError) -> Self {
        FeedError::ConnectionFailed(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is transient and a later poll may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::ConnectionFailed(_)
            | FeedError::Timeout(_)
            | FeedError::NoLiveEndpoint(_) => true,
            FeedError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FeedError::Rpc { .. } | FeedError::ParseError(_) | FeedError::NotConfigured(_) => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FeedError::Timeout("slow".into()).is_transient());
        assert!(FeedError::HttpStatus { status: 500, url: "u".into() }.is_transient());
        assert!(FeedError::HttpStatus { status: 429, url: "u".into() }.is_transient());
        assert!(!FeedError::HttpStatus { status: 404, url: "u".into() }.is_transient());
        assert!(!FeedError::NotConfigured("alchemy").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = FeedError::Rpc {
            method: "eth_getLogs".into(),
            message: "range too large".into(),
        };
        assert_eq!(err.to_string(), "RPC error from eth_getLogs: range too large");
    }
}
