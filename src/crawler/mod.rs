//! Crawl engine and fetch machinery
//!
//! The pieces that turn a root listing URL into content URLs: the pluggable
//! transport, the fallback fetcher with retry/backoff, and the recursive
//! engine that coordinates fetching, parsing, classification, and recursion
//! under shared concurrency bounds.

mod backoff;
mod engine;
mod fetcher;
mod transport;

pub use backoff::ExponentialBackoff;
pub use engine::{CrawlEngine, CrawlIssue, CrawlOutcome, CrawlTarget, EngineSettings};
pub use fetcher::{candidate_urls, FetchOutcome, Fetcher};
pub use transport::{FetchResponse, HttpTransport, Transport, TransportError};
