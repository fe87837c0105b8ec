//! Ladle: an adaptive listing-crawl engine
//!
//! This crate discovers content-listing documents (sitemaps) on remote sites,
//! recursively resolves nested listing indexes into a deduplicated set of
//! content URLs, and continuously adapts its own request pacing per domain
//! based on the failure signals those domains send back.

pub mod config;
pub mod crawler;
pub mod events;
pub mod health;
pub mod listing;
pub mod robots;
pub mod url;

use thiserror::Error;

/// Main error type for Ladle operations
#[derive(Debug, Error)]
pub enum LadleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] crawler::TransportError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Ladle operations
pub type Result<T> = std::result::Result<T, LadleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use crate::config::Config;
pub use crate::crawler::{CrawlEngine, CrawlOutcome, CrawlTarget};
pub use crate::events::{CrawlEvent, EventSink, TracingSink};
pub use crate::health::{AdaptiveThrottleController, CircuitBreakerRegistry, DomainHealthTracker};
pub use crate::url::{extract_domain, normalize_url, ClassifierRules};
