//! Structured crawl events
//!
//! The engine reports notable state transitions as typed events rather than
//! formatting log lines itself. An [`EventSink`] implementation is injected
//! into the engine and the health components; the default [`TracingSink`]
//! forwards everything to `tracing`, but an external metrics collaborator can
//! supply its own sink without touching engine code.

use crate::health::breaker::CircuitState;
use crate::health::throttle::ErrorKind;

/// A notable occurrence during a crawl run
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    /// An individual fetch attempt is being issued
    FetchAttempt { url: String, attempt: u32 },

    /// A fetch attempt concluded without usable content
    FetchFailed { url: String, reason: String },

    /// All attempts for one candidate were spent; moving on to the next
    FallbackAdvance { domain: String, next: String },

    /// The health tracker stopped admitting requests for a domain
    DomainBlocked { domain: String, reason: String },

    /// A previously blocked domain recovered
    DomainUnblocked { domain: String },

    /// The throttle controller tightened a domain's pacing
    AdaptationApplied {
        domain: String,
        trigger: ErrorKind,
        min_delay_ms: u64,
        max_delay_ms: u64,
        max_concurrency: u32,
    },

    /// A circuit breaker moved between states
    BreakerStateChange {
        name: String,
        from: CircuitState,
        to: CircuitState,
    },

    /// A listing URL was skipped without being fetched
    ListingSkipped { url: String, reason: String },
}

/// Receiver for crawl events
///
/// Implementations must tolerate being called from many concurrent crawl
/// branches.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CrawlEvent);
}

/// Default sink that forwards events to `tracing`
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: CrawlEvent) {
        match event {
            CrawlEvent::FetchAttempt { url, attempt } => {
                tracing::debug!(%url, attempt, "fetch attempt");
            }
            CrawlEvent::FetchFailed { url, reason } => {
                tracing::debug!(%url, %reason, "fetch failed");
            }
            CrawlEvent::FallbackAdvance { domain, next } => {
                tracing::info!(%domain, %next, "advancing to fallback candidate");
            }
            CrawlEvent::DomainBlocked { domain, reason } => {
                tracing::warn!(%domain, %reason, "domain blocked");
            }
            CrawlEvent::DomainUnblocked { domain } => {
                tracing::info!(%domain, "domain unblocked");
            }
            CrawlEvent::AdaptationApplied {
                domain,
                trigger,
                min_delay_ms,
                max_delay_ms,
                max_concurrency,
            } => {
                tracing::info!(
                    %domain,
                    ?trigger,
                    min_delay_ms,
                    max_delay_ms,
                    max_concurrency,
                    "throttle adapted"
                );
            }
            CrawlEvent::BreakerStateChange { name, from, to } => {
                tracing::warn!(%name, ?from, ?to, "circuit breaker state change");
            }
            CrawlEvent::ListingSkipped { url, reason } => {
                tracing::info!(%url, %reason, "listing skipped");
            }
        }
    }
}
