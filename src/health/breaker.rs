//! Generic circuit breaker for outbound calls
//!
//! A breaker guards one named call-site and watches its failure rate in time,
//! unlike the health tracker, which accumulates a domain's reputation across
//! a crawl's lifetime. The two compose around the same request.
//!
//! States: Closed (calls pass, failures count), Open (calls short-circuit for
//! a cool-down period), HalfOpen (one probe allowed through after cool-down;
//! success closes the breaker, failure reopens it with a longer cool-down).

use crate::events::{CrawlEvent, EventSink};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Short-circuiting calls until the cool-down elapses
    Open,
    /// Cool-down elapsed; probing with real calls
    HalfOpen,
}

/// Breaker tuning
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// Initial cool-down after opening
    pub cooldown: Duration,
    /// Cool-down multiplier applied when a probe fails
    pub cooldown_growth: f64,
    /// Upper bound for the grown cool-down
    pub max_cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            cooldown_growth: 2.0,
            max_cooldown: Duration::from_secs(300),
        }
    }
}

/// Error surface of a guarded call
#[derive(Debug, Error)]
pub enum BreakerError<E: std::error::Error> {
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    cooldown: Duration,
}

/// Three-state guard around one named outbound call-site
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
    events: Arc<dyn EventSink>,
}

impl CircuitBreaker {
    pub fn new(name: &str, settings: BreakerSettings, events: Arc<dyn EventSink>) -> Self {
        let cooldown = settings.cooldown;
        Self {
            name: name.to_string(),
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                cooldown,
            }),
            events,
        }
    }

    /// Runs `op` under the breaker.
    ///
    /// Short-circuits with [`BreakerError::Open`] while the breaker is open
    /// and inside its cool-down; otherwise the call proceeds and its outcome
    /// drives the state machine.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(BreakerError::Open {
                name: self.name.clone(),
            });
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(BreakerError::Inner(error))
            }
        }
    }

    /// Admission check; transitions Open → HalfOpen when the cool-down has
    /// elapsed.
    pub fn admit(&self) -> bool {
        let transition = {
            let mut inner = self.inner.lock().unwrap();
            match inner.state {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open => {
                    let elapsed_cooldown = inner
                        .opened_at
                        .map(|t| t.elapsed() >= inner.cooldown)
                        .unwrap_or(true);
                    if elapsed_cooldown {
                        inner.state = CircuitState::HalfOpen;
                        Some((CircuitState::Open, CircuitState::HalfOpen))
                    } else {
                        None
                    }
                }
            }
        };

        match transition {
            Some((from, to)) => {
                self.emit_transition(from, to);
                true
            }
            None => false,
        }
    }

    /// Reports a successful call
    pub fn record_success(&self) {
        let transition = {
            let mut inner = self.inner.lock().unwrap();
            inner.consecutive_failures = 0;
            if inner.state == CircuitState::HalfOpen {
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
                inner.cooldown = self.settings.cooldown;
                Some((CircuitState::HalfOpen, CircuitState::Closed))
            } else {
                None
            }
        };

        if let Some((from, to)) = transition {
            self.emit_transition(from, to);
        }
    }

    /// Reports a failed call
    pub fn record_failure(&self) {
        let transition = {
            let mut inner = self.inner.lock().unwrap();
            inner.consecutive_failures += 1;

            match inner.state {
                CircuitState::HalfOpen => {
                    // Failed probe: reopen with a longer cool-down
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.cooldown = grow_cooldown(
                        inner.cooldown,
                        self.settings.cooldown_growth,
                        self.settings.max_cooldown,
                    );
                    Some((CircuitState::HalfOpen, CircuitState::Open))
                }
                CircuitState::Closed
                    if inner.consecutive_failures >= self.settings.failure_threshold =>
                {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    Some((CircuitState::Closed, CircuitState::Open))
                }
                _ => None,
            }
        };

        if let Some((from, to)) = transition {
            self.emit_transition(from, to);
        }
    }

    /// Current state, without advancing transitions
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().unwrap().consecutive_failures
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn emit_transition(&self, from: CircuitState, to: CircuitState) {
        self.events.emit(CrawlEvent::BreakerStateChange {
            name: self.name.clone(),
            from,
            to,
        });
    }
}

fn grow_cooldown(current: Duration, growth: f64, max: Duration) -> Duration {
    let grown = Duration::from_secs_f64(current.as_secs_f64() * growth);
    grown.min(max)
}

/// Process-wide registry of breakers, keyed by call-site name
///
/// Owned by whoever composes the engine; injected rather than global so tests
/// get isolated instances.
pub struct CircuitBreakerRegistry {
    settings: BreakerSettings,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    events: Arc<dyn EventSink>,
}

impl CircuitBreakerRegistry {
    pub fn new(settings: BreakerSettings, events: Arc<dyn EventSink>) -> Self {
        Self {
            settings,
            breakers: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Returns the breaker for a call-site, creating it on first use
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    name,
                    self.settings.clone(),
                    self.events.clone(),
                ))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_support::CollectorSink;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test-call",
            BreakerSettings {
                failure_threshold: threshold,
                cooldown: Duration::from_millis(cooldown_ms),
                cooldown_growth: 2.0,
                max_cooldown: Duration::from_secs(10),
            },
            Arc::new(CollectorSink::new()),
        )
    }

    #[tokio::test]
    async fn test_closed_passes_calls_through() {
        let cb = breaker(3, 100);

        let result: Result<u32, BreakerError<Boom>> = cb.call(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_after_threshold_failures() {
        let cb = breaker(3, 60_000);

        for _ in 0..3 {
            let result: Result<u32, BreakerError<Boom>> =
                cb.call(|| async { Err(Boom) }).await;
            assert!(matches!(result, Err(BreakerError::Inner(_))));
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // Next call short-circuits without running the operation
        let result: Result<u32, BreakerError<Boom>> = cb
            .call(|| async {
                panic!("operation must not run while breaker is open");
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3, 60_000);

        for _ in 0..2 {
            let _: Result<u32, BreakerError<Boom>> = cb.call(|| async { Err(Boom) }).await;
        }
        let _: Result<u32, BreakerError<Boom>> = cb.call(|| async { Ok(1) }).await;
        assert_eq!(cb.consecutive_failures(), 0);

        for _ in 0..2 {
            let _: Result<u32, BreakerError<Boom>> = cb.call(|| async { Err(Boom) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_closes_on_success() {
        let cb = breaker(2, 50);

        for _ in 0..2 {
            let _: Result<u32, BreakerError<Boom>> = cb.call(|| async { Err(Boom) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let result: Result<u32, BreakerError<Boom>> = cb.call(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens_with_longer_cooldown() {
        let cb = breaker(2, 50);

        for _ in 0..2 {
            let _: Result<u32, BreakerError<Boom>> = cb.call(|| async { Err(Boom) }).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Probe fails: back to Open, cool-down doubled to 100ms
        let _: Result<u32, BreakerError<Boom>> = cb.call(|| async { Err(Boom) }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        // The original 50ms is no longer enough
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!cb.admit());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cb.admit());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_registry_reuses_breakers() {
        let registry =
            CircuitBreakerRegistry::new(BreakerSettings::default(), Arc::new(CollectorSink::new()));

        let a = registry.breaker("listing-fetch");
        let b = registry.breaker("listing-fetch");
        let c = registry.breaker("robots-fetch");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_state_transitions_emit_events() {
        let sink = Arc::new(CollectorSink::new());
        let cb = CircuitBreaker::new(
            "test-call",
            BreakerSettings {
                failure_threshold: 1,
                cooldown: Duration::from_millis(10),
                cooldown_growth: 2.0,
                max_cooldown: Duration::from_secs(1),
            },
            sink.clone(),
        );

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        let events = sink.events.lock().unwrap();
        assert!(matches!(
            events[0],
            CrawlEvent::BreakerStateChange {
                from: CircuitState::Closed,
                to: CircuitState::Open,
                ..
            }
        ));
    }
}
