//! Configuration loading and validation
//!
//! All tunable data lives here: engine knobs, default adaptive pacing,
//! health thresholds, breaker settings, classifier pattern lists with
//! per-domain overrides, and the crawl targets themselves. Everything ships
//! with defaults; a minimal config only identifies the crawler.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    BreakerConfig, ClassifierConfig, Config, CrawlerConfig, HealthConfig, OverrideEntry,
    TargetEntry, ThrottleConfig, UserAgentConfig,
};
pub use validation::validate;
