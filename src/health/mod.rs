//! Domain health, adaptive throttling, and circuit breaking
//!
//! Three related but independent guards:
//!
//! - [`DomainHealthTracker`] accumulates a domain's reputation over the
//!   process lifetime and gates admission (blocked domains are skipped
//!   entirely).
//! - [`AdaptiveThrottleController`] turns observed error signals into revised
//!   per-domain pacing (delays, concurrency).
//! - [`CircuitBreaker`] guards a single named call-site's failure rate in
//!   time, independent of the domain concept.
//!
//! All three are shared mutable state touched from many concurrent crawl
//! branches; they are constructor-injected rather than global so tests can
//! instantiate isolated registries.

pub mod breaker;
pub mod throttle;
pub mod tracker;

pub use breaker::{BreakerError, BreakerSettings, CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use throttle::{AdaptationRule, AdaptationTable, AdaptiveConfig, AdaptiveThrottleController, ErrorKind, ThrottleDefaults};
pub use tracker::{DomainHealthTracker, DomainStats, HealthThresholds};
