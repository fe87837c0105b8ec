//! Per-domain health tracking and admission control
//!
//! The tracker accumulates ground-truth fetch outcomes per remote domain for
//! the process lifetime and derives a single admission decision from them:
//! blocked domains must be skipped entirely rather than retried, until their
//! health recovers. Failing fast here avoids burning the retry budget against
//! a host that is already refusing us, which tends to escalate into a longer
//! remote-side block.

use crate::events::{CrawlEvent, EventSink};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Thresholds governing block and unblock transitions
///
/// A domain blocks when EITHER rule fires: a per-error-type consecutive
/// count crosses its threshold, or the overall success rate drops below
/// `success_rate_threshold` once `min_attempts_for_blocking` attempts have
/// accumulated. Unblocking requires the success rate to climb past twice the
/// blocking threshold.
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    pub rate_limit_threshold: u32,
    pub forbidden_threshold: u32,
    pub min_attempts_for_blocking: u64,
    pub success_rate_threshold: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            rate_limit_threshold: 10,
            forbidden_threshold: 5,
            min_attempts_for_blocking: 5,
            success_rate_threshold: 0.2,
        }
    }
}

/// Accumulated fetch statistics for one remote domain
#[derive(Debug, Clone)]
pub struct DomainStats {
    pub domain: String,
    pub total_attempts: u64,
    pub success_count: u64,
    pub rate_limit_errors: u64,
    pub forbidden_errors: u64,
    pub other_errors: u64,
    /// Rate-limit responses since the last success
    pub consecutive_rate_limit: u32,
    /// Forbidden responses since the last success
    pub consecutive_forbidden: u32,
    pub is_blocked: bool,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

impl DomainStats {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            total_attempts: 0,
            success_count: 0,
            rate_limit_errors: 0,
            forbidden_errors: 0,
            other_errors: 0,
            consecutive_rate_limit: 0,
            consecutive_forbidden: 0,
            is_blocked: false,
            last_error: None,
            last_error_time: None,
        }
    }

    /// Fraction of attempts that succeeded; 0.0 before any attempt
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_attempts as f64
        }
    }
}

/// Process-wide registry of domain reputations
///
/// Shared across crawl runs and mutated from many concurrent branches; every
/// method takes `&self` and is safe under concurrent access.
pub struct DomainHealthTracker {
    thresholds: HealthThresholds,
    stats: Mutex<HashMap<String, DomainStats>>,
    events: Arc<dyn EventSink>,
}

impl DomainHealthTracker {
    pub fn new(thresholds: HealthThresholds, events: Arc<dyn EventSink>) -> Self {
        Self {
            thresholds,
            stats: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Records a successful fetch, resetting the consecutive-error counters.
    ///
    /// Unblocks the domain (exactly once) when its rolling success rate has
    /// recovered past twice the blocking threshold.
    pub fn record_success(&self, domain: &str) {
        let unblocked = {
            let mut stats = self.stats.lock().unwrap();
            let entry = stats
                .entry(domain.to_string())
                .or_insert_with(|| DomainStats::new(domain));

            entry.total_attempts += 1;
            entry.success_count += 1;
            entry.consecutive_rate_limit = 0;
            entry.consecutive_forbidden = 0;

            if entry.is_blocked
                && entry.success_rate() > 2.0 * self.thresholds.success_rate_threshold
            {
                entry.is_blocked = false;
                true
            } else {
                false
            }
        };

        if unblocked {
            self.events.emit(CrawlEvent::DomainUnblocked {
                domain: domain.to_string(),
            });
        }
    }

    /// Records a failed fetch, bucketed by status code, and re-evaluates the
    /// blocking decision.
    ///
    /// The transition to blocked fires at most once; further errors past the
    /// threshold keep counting but emit no duplicate block events.
    pub fn record_error(&self, domain: &str, status: Option<u16>, message: &str) {
        let blocked_reason = {
            let mut stats = self.stats.lock().unwrap();
            let entry = stats
                .entry(domain.to_string())
                .or_insert_with(|| DomainStats::new(domain));

            entry.total_attempts += 1;
            match status {
                Some(429) => {
                    entry.rate_limit_errors += 1;
                    entry.consecutive_rate_limit += 1;
                }
                Some(403) => {
                    entry.forbidden_errors += 1;
                    entry.consecutive_forbidden += 1;
                }
                _ => {
                    entry.other_errors += 1;
                }
            }
            entry.last_error = Some(message.to_string());
            entry.last_error_time = Some(Utc::now());

            if entry.is_blocked {
                None
            } else if let Some(reason) = self.blocking_reason(entry) {
                entry.is_blocked = true;
                Some(reason)
            } else {
                None
            }
        };

        if let Some(reason) = blocked_reason {
            self.events.emit(CrawlEvent::DomainBlocked {
                domain: domain.to_string(),
                reason,
            });
        }
    }

    /// Admission check: must the caller skip this domain?
    pub fn is_blocked(&self, domain: &str) -> bool {
        self.stats
            .lock()
            .unwrap()
            .get(domain)
            .map(|s| s.is_blocked)
            .unwrap_or(false)
    }

    /// Snapshot of a domain's statistics, if any attempt was ever recorded
    pub fn stats(&self, domain: &str) -> Option<DomainStats> {
        self.stats.lock().unwrap().get(domain).cloned()
    }

    /// Clears all accumulated state for a domain
    pub fn reset(&self, domain: &str) {
        self.stats.lock().unwrap().remove(domain);
    }

    /// Evaluates both blocking rules; either firing blocks the domain
    fn blocking_reason(&self, stats: &DomainStats) -> Option<String> {
        let t = &self.thresholds;

        if stats.consecutive_rate_limit >= t.rate_limit_threshold {
            return Some(format!(
                "{} consecutive rate-limit responses",
                stats.consecutive_rate_limit
            ));
        }
        if stats.consecutive_forbidden >= t.forbidden_threshold {
            return Some(format!(
                "{} consecutive forbidden responses",
                stats.consecutive_forbidden
            ));
        }
        if stats.total_attempts >= t.min_attempts_for_blocking
            && stats.success_rate() < t.success_rate_threshold
        {
            return Some(format!(
                "success rate {:.2} below threshold after {} attempts",
                stats.success_rate(),
                stats.total_attempts
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_support::CollectorSink;

    fn tracker() -> (DomainHealthTracker, Arc<CollectorSink>) {
        let sink = Arc::new(CollectorSink::new());
        (
            DomainHealthTracker::new(HealthThresholds::default(), sink.clone()),
            sink,
        )
    }

    fn block_events(sink: &CollectorSink) -> usize {
        sink.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, CrawlEvent::DomainBlocked { .. }))
            .count()
    }

    #[test]
    fn test_unknown_domain_is_not_blocked() {
        let (t, _) = tracker();
        assert!(!t.is_blocked("example.com"));
        assert!(t.stats("example.com").is_none());
    }

    #[test]
    fn test_success_counting() {
        let (t, _) = tracker();
        t.record_success("example.com");
        t.record_success("example.com");

        let stats = t.stats("example.com").unwrap();
        assert_eq!(stats.total_attempts, 2);
        assert_eq!(stats.success_count, 2);
        assert!(!stats.is_blocked);
    }

    #[test]
    fn test_error_buckets() {
        let (t, _) = tracker();
        t.record_error("example.com", Some(429), "rate limited");
        t.record_error("example.com", Some(403), "forbidden");
        t.record_error("example.com", Some(500), "server error");
        t.record_error("example.com", None, "connection reset");

        let stats = t.stats("example.com").unwrap();
        assert_eq!(stats.rate_limit_errors, 1);
        assert_eq!(stats.forbidden_errors, 1);
        assert_eq!(stats.other_errors, 2);
        assert_eq!(stats.last_error.as_deref(), Some("connection reset"));
        assert!(stats.last_error_time.is_some());
    }

    #[test]
    fn test_blocks_on_failed_attempts_with_no_successes() {
        let (t, _) = tracker();
        for _ in 0..4 {
            t.record_error("example.com", Some(500), "server error");
            assert!(!t.is_blocked("example.com"));
        }
        t.record_error("example.com", Some(500), "server error");
        assert!(t.is_blocked("example.com"));
    }

    #[test]
    fn test_blocks_on_consecutive_forbidden() {
        let (t, _) = tracker();
        // Successes keep the overall rate high; the consecutive rule fires.
        for _ in 0..50 {
            t.record_success("example.com");
        }
        for _ in 0..5 {
            t.record_error("example.com", Some(403), "forbidden");
        }
        assert!(t.is_blocked("example.com"));
    }

    #[test]
    fn test_blocks_on_consecutive_rate_limits() {
        let (t, _) = tracker();
        for _ in 0..50 {
            t.record_success("example.com");
        }
        for _ in 0..10 {
            t.record_error("example.com", Some(429), "slow down");
        }
        assert!(t.is_blocked("example.com"));
    }

    #[test]
    fn test_success_resets_consecutive_counters() {
        let (t, _) = tracker();
        for _ in 0..50 {
            t.record_success("example.com");
        }
        for _ in 0..4 {
            t.record_error("example.com", Some(403), "forbidden");
        }
        t.record_success("example.com");
        for _ in 0..4 {
            t.record_error("example.com", Some(403), "forbidden");
        }
        assert!(!t.is_blocked("example.com"));
    }

    #[test]
    fn test_block_transition_fires_once() {
        let (t, sink) = tracker();
        for _ in 0..20 {
            t.record_error("example.com", Some(500), "server error");
        }
        assert!(t.is_blocked("example.com"));
        assert_eq!(block_events(&sink), 1);
    }

    #[test]
    fn test_unblocks_once_after_recovery() {
        let (t, sink) = tracker();
        for _ in 0..5 {
            t.record_error("example.com", Some(500), "server error");
        }
        assert!(t.is_blocked("example.com"));

        // Successes push the rate past 2 * 0.2 = 0.4; with 5 failures that
        // takes 4 successes (4/9 > 0.4).
        for _ in 0..10 {
            t.record_success("example.com");
        }
        assert!(!t.is_blocked("example.com"));

        let unblocks = sink
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, CrawlEvent::DomainUnblocked { .. }))
            .count();
        assert_eq!(unblocks, 1);
    }

    #[test]
    fn test_domains_tracked_independently() {
        let (t, _) = tracker();
        for _ in 0..5 {
            t.record_error("bad.example.com", Some(500), "server error");
        }
        t.record_success("good.example.com");

        assert!(t.is_blocked("bad.example.com"));
        assert!(!t.is_blocked("good.example.com"));
    }

    #[test]
    fn test_reset_clears_state() {
        let (t, _) = tracker();
        for _ in 0..5 {
            t.record_error("example.com", Some(500), "server error");
        }
        assert!(t.is_blocked("example.com"));

        t.reset("example.com");
        assert!(!t.is_blocked("example.com"));
        assert!(t.stats("example.com").is_none());
    }
}
