//! Adaptive per-domain throttling
//!
//! Every domain starts from the same default pacing. Each observed error
//! tightens that domain's configuration through a static per-error-kind rule
//! table: delays are multiplied (with floors), concurrency is divided (never
//! below one). Adaptation changes pacing, never the retry budget, and applies
//! to all subsequent fetches against the domain immediately.

use crate::events::{CrawlEvent, EventSink};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Classification of an observed fetch error, from the throttle's viewpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimit,
    Forbidden,
    Timeout,
    Connection,
    Unknown,
}

/// Per-domain pacing configuration
///
/// Readers always get a consistent snapshot; a fetch that started just before
/// an adaptation keeps its old pacing, which is accepted (pacing is
/// inherently approximate).
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveConfig {
    pub domain: String,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_concurrency: u32,
    pub max_retries: u32,
}

/// Starting configuration applied to domains on first contact
#[derive(Debug, Clone)]
pub struct ThrottleDefaults {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_concurrency: u32,
    pub max_retries: u32,
}

impl Default for ThrottleDefaults {
    fn default() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 2_000,
            max_concurrency: 4,
            max_retries: 3,
        }
    }
}

/// How one error kind reshapes a domain's configuration
#[derive(Debug, Clone)]
pub struct AdaptationRule {
    pub min_delay_multiplier: f64,
    pub max_delay_multiplier: f64,
    pub concurrency_divisor: u32,
    pub floor_min_delay_ms: u64,
    pub floor_max_delay_ms: u64,
}

/// The error-kind → adaptation mapping
///
/// A 429 widens delays far more aggressively than a generic connection
/// error; a 403 cuts concurrency hardest, since it usually means active bot
/// detection rather than transient load.
#[derive(Debug, Clone)]
pub struct AdaptationTable {
    pub rate_limit: AdaptationRule,
    pub forbidden: AdaptationRule,
    pub timeout: AdaptationRule,
    pub connection: AdaptationRule,
    pub unknown: AdaptationRule,
}

impl AdaptationTable {
    pub fn rule(&self, kind: ErrorKind) -> &AdaptationRule {
        match kind {
            ErrorKind::RateLimit => &self.rate_limit,
            ErrorKind::Forbidden => &self.forbidden,
            ErrorKind::Timeout => &self.timeout,
            ErrorKind::Connection => &self.connection,
            ErrorKind::Unknown => &self.unknown,
        }
    }
}

impl Default for AdaptationTable {
    fn default() -> Self {
        Self {
            rate_limit: AdaptationRule {
                min_delay_multiplier: 3.0,
                max_delay_multiplier: 2.0,
                concurrency_divisor: 2,
                floor_min_delay_ms: 5_000,
                floor_max_delay_ms: 30_000,
            },
            forbidden: AdaptationRule {
                min_delay_multiplier: 2.0,
                max_delay_multiplier: 1.5,
                concurrency_divisor: 4,
                floor_min_delay_ms: 10_000,
                floor_max_delay_ms: 60_000,
            },
            timeout: AdaptationRule {
                min_delay_multiplier: 1.5,
                max_delay_multiplier: 1.5,
                concurrency_divisor: 2,
                floor_min_delay_ms: 2_000,
                floor_max_delay_ms: 15_000,
            },
            connection: AdaptationRule {
                min_delay_multiplier: 1.5,
                max_delay_multiplier: 1.2,
                concurrency_divisor: 1,
                floor_min_delay_ms: 1_000,
                floor_max_delay_ms: 10_000,
            },
            unknown: AdaptationRule {
                min_delay_multiplier: 1.2,
                max_delay_multiplier: 1.2,
                concurrency_divisor: 1,
                floor_min_delay_ms: 1_000,
                floor_max_delay_ms: 10_000,
            },
        }
    }
}

/// Maps observed error signals to revised per-domain pacing
pub struct AdaptiveThrottleController {
    defaults: ThrottleDefaults,
    table: AdaptationTable,
    configs: Mutex<HashMap<String, AdaptiveConfig>>,
    events: Arc<dyn EventSink>,
}

impl AdaptiveThrottleController {
    pub fn new(
        defaults: ThrottleDefaults,
        table: AdaptationTable,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            defaults,
            table,
            configs: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Returns a snapshot of the domain's current configuration, creating it
    /// from the defaults on first contact.
    pub fn current(&self, domain: &str) -> AdaptiveConfig {
        let mut configs = self.configs.lock().unwrap();
        configs
            .entry(domain.to_string())
            .or_insert_with(|| self.fresh_config(domain))
            .clone()
    }

    /// Tightens the domain's pacing according to the rule for `kind` and
    /// returns the revised configuration.
    ///
    /// Delays grow to at least the rule's floors, concurrency shrinks but
    /// never below one, and the retry budget is left untouched.
    pub fn adapt(&self, domain: &str, kind: ErrorKind) -> AdaptiveConfig {
        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .entry(domain.to_string())
            .or_insert_with(|| self.fresh_config(domain));

        let rule = self.table.rule(kind);

        config.min_delay_ms = scale(config.min_delay_ms, rule.min_delay_multiplier)
            .max(rule.floor_min_delay_ms);
        config.max_delay_ms = scale(config.max_delay_ms, rule.max_delay_multiplier)
            .max(rule.floor_max_delay_ms)
            .max(config.min_delay_ms);
        config.max_concurrency =
            (config.max_concurrency / rule.concurrency_divisor.max(1)).max(1);

        let snapshot = config.clone();
        drop(configs);

        self.events.emit(CrawlEvent::AdaptationApplied {
            domain: domain.to_string(),
            trigger: kind,
            min_delay_ms: snapshot.min_delay_ms,
            max_delay_ms: snapshot.max_delay_ms,
            max_concurrency: snapshot.max_concurrency,
        });

        snapshot
    }

    /// Raises the domain's minimum delay to honor a robots.txt crawl-delay
    /// declaration. Only ever widens pacing.
    pub fn apply_crawl_delay(&self, domain: &str, delay_secs: f64) {
        if !(delay_secs > 0.0) {
            return;
        }
        let delay_ms = (delay_secs * 1000.0).round() as u64;

        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .entry(domain.to_string())
            .or_insert_with(|| self.fresh_config(domain));
        config.min_delay_ms = config.min_delay_ms.max(delay_ms);
        config.max_delay_ms = config.max_delay_ms.max(config.min_delay_ms);
    }

    /// The defaults new domains start from
    pub fn defaults(&self) -> &ThrottleDefaults {
        &self.defaults
    }

    fn fresh_config(&self, domain: &str) -> AdaptiveConfig {
        AdaptiveConfig {
            domain: domain.to_string(),
            min_delay_ms: self.defaults.min_delay_ms,
            max_delay_ms: self.defaults.max_delay_ms,
            max_concurrency: self.defaults.max_concurrency,
            max_retries: self.defaults.max_retries,
        }
    }
}

fn scale(value: u64, multiplier: f64) -> u64 {
    (value as f64 * multiplier).round() as u64
}
