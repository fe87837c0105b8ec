//! Pluggable fetch transport
//!
//! The engine depends only on the [`Transport`] trait, so the reqwest-backed
//! [`HttpTransport`] and a browser-automation transport satisfy the same
//! seam, and tests can substitute canned responses.

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Raw result of one fetch attempt
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Network-level fetch failures, classified for retry decisions
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timeout for {url}")]
    Timeout { url: String },

    #[error("connection failed for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("transport failure for {url}: {message}")]
    Other { url: String, message: String },
}

/// One outbound HTTP(S) fetch
///
/// The timeout is attempt-scoped: it aborts the underlying I/O and surfaces
/// as [`TransportError::Timeout`], which callers treat like any other
/// network error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds the shared HTTP client with an honest, contactable user agent.
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent_string())
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?
            .to_vec();

        Ok(FetchResponse { status, body })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        TransportError::Connection {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        TransportError::Other {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "LadleBot".to_string(),
            crawler_version: "0.3".to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_transport() {
        assert!(HttpTransport::new(&test_config()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let transport = HttpTransport::new(&test_config()).unwrap();
        // Reserved port on localhost, nothing listens there
        let result = transport
            .fetch("http://127.0.0.1:1/never", Duration::from_secs(2))
            .await;

        assert!(result.is_err());
    }
}
