//! Resilient listing fetches with candidate fallback
//!
//! A single listing URL is rarely the whole story: the conventional location
//! moved, the document is served gzip-compressed under a different suffix, or
//! robots.txt declares the real sitemap somewhere else entirely. The fetcher
//! iterates an ordered candidate list and, per candidate, retries transient
//! failures with backoff while advancing immediately past structural ones.
//!
//! Exhausting every candidate is a valid, non-exceptional outcome: the caller
//! receives empty content and decides what that means for the crawl.

use crate::crawler::backoff::ExponentialBackoff;
use crate::crawler::transport::{Transport, TransportError};
use crate::events::{CrawlEvent, EventSink};
use crate::health::{
    AdaptiveThrottleController, BreakerError, CircuitBreaker, DomainHealthTracker, ErrorKind,
};
use crate::listing::looks_like_listing;
use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Conventional listing locations probed when the primary URL fails
const CONVENTIONAL_LISTING_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap1.xml",
    "/sitemaps.xml",
    "/sitemap/sitemap.xml",
];

/// Result of a fallback fetch; an empty body means every candidate was
/// exhausted
#[derive(Debug)]
pub struct FetchOutcome {
    pub body: String,
    /// The candidate that produced the body
    pub source: Option<Url>,
}

impl FetchOutcome {
    fn exhausted() -> Self {
        Self {
            body: String::new(),
            source: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// What to do after one attempt at one candidate
enum AttemptVerdict {
    /// Valid content; stop
    Valid(String),
    /// Structural problem with this candidate; try the next one
    NextCandidate,
    /// Transient problem; retry this candidate after waiting
    Retry { wait: Duration },
    /// Policy short-circuit; stop the whole fetch
    Abort,
}

/// Final word on one candidate
enum CandidateOutcome {
    Valid(String),
    /// Move on to the next candidate
    Advance,
    /// Policy short-circuit; no further candidates either
    Abort,
}

/// Fetches one listing URL through the fallback candidate chain
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    health: Arc<DomainHealthTracker>,
    throttle: Arc<AdaptiveThrottleController>,
    breaker: Arc<CircuitBreaker>,
    events: Arc<dyn EventSink>,
    request_timeout: Duration,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        health: Arc<DomainHealthTracker>,
        throttle: Arc<AdaptiveThrottleController>,
        breaker: Arc<CircuitBreaker>,
        events: Arc<dyn EventSink>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            health,
            throttle,
            breaker,
            events,
            request_timeout,
        }
    }

    /// Tries `[primary, ...fallbacks]` until one candidate yields content
    /// that passes validation.
    ///
    /// Every outcome, success or failure, is reported to the health tracker;
    /// error kinds additionally feed the throttle controller. Returns empty
    /// content when every candidate is exhausted or the domain becomes
    /// blocked mid-fetch.
    pub async fn fetch_with_fallback(
        &self,
        domain: &str,
        primary: &Url,
        hints: &[String],
    ) -> FetchOutcome {
        let candidates = candidate_urls(primary, hints);

        for (index, candidate) in candidates.iter().enumerate() {
            if self.health.is_blocked(domain) {
                self.events.emit(CrawlEvent::FetchFailed {
                    url: candidate.to_string(),
                    reason: "domain blocked mid-fetch".to_string(),
                });
                return FetchOutcome::exhausted();
            }

            if index > 0 {
                self.events.emit(CrawlEvent::FallbackAdvance {
                    domain: domain.to_string(),
                    next: candidate.to_string(),
                });
            }

            match self.try_candidate(domain, candidate).await {
                CandidateOutcome::Valid(body) => {
                    return FetchOutcome {
                        body,
                        source: Some(candidate.clone()),
                    }
                }
                CandidateOutcome::Advance => continue,
                CandidateOutcome::Abort => return FetchOutcome::exhausted(),
            }
        }

        FetchOutcome::exhausted()
    }

    /// Attempts one candidate up to the domain's retry budget.
    async fn try_candidate(&self, domain: &str, candidate: &Url) -> CandidateOutcome {
        // Snapshot of the domain's pacing for this attempt batch; concurrent
        // adaptations apply to the next batch.
        let config = self.throttle.current(domain);
        let backoff = ExponentialBackoff::new(
            config.min_delay_ms.max(100),
            config.max_delay_ms.max(config.min_delay_ms),
        );

        let mut attempt: u32 = 0;
        loop {
            self.events.emit(CrawlEvent::FetchAttempt {
                url: candidate.to_string(),
                attempt,
            });

            let verdict = self.attempt_once(domain, candidate, &backoff, attempt).await;

            match verdict {
                AttemptVerdict::Valid(body) => return CandidateOutcome::Valid(body),
                AttemptVerdict::NextCandidate => return CandidateOutcome::Advance,
                AttemptVerdict::Abort => return CandidateOutcome::Abort,
                AttemptVerdict::Retry { wait } => {
                    attempt += 1;
                    if attempt >= config.max_retries {
                        return CandidateOutcome::Advance;
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        domain: &str,
        candidate: &Url,
        backoff: &ExponentialBackoff,
        attempt: u32,
    ) -> AttemptVerdict {
        let result = self
            .breaker
            .call(|| self.transport.fetch(candidate.as_str(), self.request_timeout))
            .await;

        let response = match result {
            Ok(response) => response,
            Err(BreakerError::Open { name }) => {
                self.events.emit(CrawlEvent::FetchFailed {
                    url: candidate.to_string(),
                    reason: format!("circuit breaker '{}' open", name),
                });
                return AttemptVerdict::Abort;
            }
            Err(BreakerError::Inner(error)) => {
                return self.network_verdict(domain, candidate, backoff, attempt, error)
            }
        };

        match response.status {
            200..=299 => {
                let body = decode_body(candidate, &response.body);
                if looks_like_listing(&body, candidate.as_str()) {
                    self.health.record_success(domain);
                    AttemptVerdict::Valid(body)
                } else {
                    // A silent failure: usable HTTP status, unusable payload
                    self.health
                        .record_error(domain, None, "content validation failed");
                    self.events.emit(CrawlEvent::FetchFailed {
                        url: candidate.to_string(),
                        reason: "content validation failed".to_string(),
                    });
                    AttemptVerdict::NextCandidate
                }
            }
            429 => {
                self.health.record_error(domain, Some(429), "rate limited");
                let adapted = self.throttle.adapt(domain, ErrorKind::RateLimit);
                // The same candidate is retried after a wait scaled to the
                // freshly widened pacing.
                let wait = backoff
                    .delay(attempt)
                    .max(Duration::from_millis(adapted.min_delay_ms));
                AttemptVerdict::Retry { wait }
            }
            403 => {
                self.health.record_error(domain, Some(403), "forbidden");
                self.throttle.adapt(domain, ErrorKind::Forbidden);
                AttemptVerdict::NextCandidate
            }
            404 => {
                self.health.record_error(domain, Some(404), "not found");
                AttemptVerdict::NextCandidate
            }
            status @ 500..=599 => {
                self.health
                    .record_error(domain, Some(status), "server error");
                AttemptVerdict::Retry {
                    wait: backoff.delay(attempt),
                }
            }
            status => {
                self.health
                    .record_error(domain, Some(status), "unexpected status");
                AttemptVerdict::NextCandidate
            }
        }
    }

    fn network_verdict(
        &self,
        domain: &str,
        candidate: &Url,
        backoff: &ExponentialBackoff,
        attempt: u32,
        error: TransportError,
    ) -> AttemptVerdict {
        self.events.emit(CrawlEvent::FetchFailed {
            url: candidate.to_string(),
            reason: error.to_string(),
        });

        match error {
            TransportError::Timeout { .. } => {
                self.health.record_error(domain, None, "request timeout");
                self.throttle.adapt(domain, ErrorKind::Timeout);
                AttemptVerdict::Retry {
                    wait: backoff.delay(attempt),
                }
            }
            TransportError::Connection { ref message, .. } => {
                // DNS failure or refused connection: the candidate is
                // structurally unreachable, move on immediately.
                self.health.record_error(domain, None, message);
                self.throttle.adapt(domain, ErrorKind::Connection);
                AttemptVerdict::NextCandidate
            }
            TransportError::Other { ref message, .. } => {
                self.health.record_error(domain, None, message);
                self.throttle.adapt(domain, ErrorKind::Unknown);
                AttemptVerdict::Retry {
                    wait: backoff.delay(attempt),
                }
            }
        }
    }
}

/// Builds the ordered, deduplicated candidate list for one primary URL:
/// the primary itself, its compression-suffix twin, robots-declared sitemap
/// hints, then the conventional listing paths at the same origin.
pub fn candidate_urls(primary: &Url, hints: &[String]) -> Vec<Url> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<Url> = Vec::new();

    let mut push = |url: Url| {
        if seen.insert(url.to_string()) {
            candidates.push(url);
        }
    };

    push(primary.clone());

    // Compression-suffix variant of the primary
    let path = primary.path().to_string();
    if let Some(stripped) = path.strip_suffix(".gz") {
        let mut twin = primary.clone();
        twin.set_path(stripped);
        push(twin);
    } else if path.ends_with(".xml") {
        let mut twin = primary.clone();
        twin.set_path(&format!("{}.gz", path));
        push(twin);
    }

    // Robots-declared sitemap locations
    for hint in hints {
        if let Ok(url) = Url::parse(hint) {
            if url.scheme() == "http" || url.scheme() == "https" {
                push(url);
            }
        }
    }

    // Conventional locations at the same origin
    for conventional in CONVENTIONAL_LISTING_PATHS {
        if let Ok(url) = primary.join(conventional) {
            push(url);
        }
    }

    candidates
}

/// Decodes a response body, inflating gzip payloads for `.gz` candidates.
///
/// Undecodable payloads come back empty and fail validation downstream, which
/// advances the fallback chain; that is the intended handling, not an error.
fn decode_body(candidate: &Url, bytes: &[u8]) -> String {
    if candidate.path().ends_with(".gz") {
        let mut decoder = GzDecoder::new(bytes);
        let mut body = String::new();
        match decoder.read_to_string(&mut body) {
            Ok(_) => body,
            Err(_) => String::new(),
        }
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
