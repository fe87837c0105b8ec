use crate::crawler::EngineSettings;
use crate::health::{BreakerSettings, HealthThresholds, ThrottleDefaults};
use crate::{ConfigError, CrawlTarget};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Ladle
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetEntry>,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Run-wide bound on concurrent listing fetches
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,

    /// Maximum index-nesting depth
    #[serde(rename = "max-listing-depth", default = "default_max_depth")]
    pub max_listing_depth: u32,

    /// Per-attempt fetch timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Whether robots.txt hints, filtering, and crawl delays apply
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

/// Crawler identification sent with every request
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Default pacing for domains with no observed failures yet
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    #[serde(rename = "min-delay-ms", default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(rename = "max-delay-ms", default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(rename = "max-concurrency", default = "default_domain_concurrency")]
    pub max_concurrency: u32,

    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,
}

/// Domain blocking thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(rename = "rate-limit-threshold", default = "default_rate_limit_threshold")]
    pub rate_limit_threshold: u32,

    #[serde(rename = "forbidden-threshold", default = "default_forbidden_threshold")]
    pub forbidden_threshold: u32,

    #[serde(rename = "min-attempts-for-blocking", default = "default_min_attempts")]
    pub min_attempts_for_blocking: u64,

    #[serde(rename = "success-rate-threshold", default = "default_success_rate")]
    pub success_rate_threshold: f64,
}

/// Circuit breaker tuning
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    #[serde(rename = "failure-threshold", default = "default_breaker_threshold")]
    pub failure_threshold: u32,

    #[serde(rename = "cooldown-secs", default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    #[serde(rename = "cooldown-growth", default = "default_cooldown_growth")]
    pub cooldown_growth: f64,

    #[serde(rename = "max-cooldown-secs", default = "default_max_cooldown_secs")]
    pub max_cooldown_secs: u64,
}

/// URL classification rule data
///
/// All pattern lists are plain data so site-specific corrections never
/// require engine changes.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Path fragments that always mark a listing page
    #[serde(rename = "exclude-fragments", default = "default_exclude_fragments")]
    pub exclude_fragments: Vec<String>,

    /// Anchored path patterns that always mark a listing page
    #[serde(rename = "exclude-patterns", default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Path patterns strongly indicative of a single content item
    #[serde(rename = "include-patterns", default = "default_include_patterns")]
    pub include_patterns: Vec<String>,

    /// Final-segment keywords that veto the structural heuristic
    #[serde(rename = "listing-keywords", default = "default_listing_keywords")]
    pub listing_keywords: Vec<String>,

    /// Final-segment keywords that satisfy the structural heuristic
    #[serde(rename = "content-keywords", default = "default_content_keywords")]
    pub content_keywords: Vec<String>,

    /// Site-specific corrections, evaluated before inclusion patterns
    #[serde(default = "default_overrides", rename = "override")]
    pub overrides: Vec<OverrideEntry>,
}

/// One per-domain classification override
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideEntry {
    /// Domain pattern, optionally wildcard (`*.example.com`)
    pub domain: String,

    /// Path substring the override applies to
    #[serde(rename = "path-fragment")]
    pub path_fragment: String,

    /// Verdict when the override matches
    #[serde(rename = "is-content")]
    pub is_content: bool,
}

/// One crawl target
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    pub domain: String,

    #[serde(rename = "root-listing-url")]
    pub root_listing_url: String,

    #[serde(rename = "url-limit")]
    pub url_limit: Option<usize>,
}

impl Config {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_concurrent_fetches: self.crawler.max_concurrent_fetches,
            max_listing_depth: self.crawler.max_listing_depth,
            request_timeout: Duration::from_secs(self.crawler.request_timeout_secs),
            respect_robots: self.crawler.respect_robots,
        }
    }

    pub fn throttle_defaults(&self) -> ThrottleDefaults {
        ThrottleDefaults {
            min_delay_ms: self.throttle.min_delay_ms,
            max_delay_ms: self.throttle.max_delay_ms,
            max_concurrency: self.throttle.max_concurrency,
            max_retries: self.throttle.max_retries,
        }
    }

    pub fn health_thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            rate_limit_threshold: self.health.rate_limit_threshold,
            forbidden_threshold: self.health.forbidden_threshold,
            min_attempts_for_blocking: self.health.min_attempts_for_blocking,
            success_rate_threshold: self.health.success_rate_threshold,
        }
    }

    pub fn breaker_settings(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.breaker.failure_threshold,
            cooldown: Duration::from_secs(self.breaker.cooldown_secs),
            cooldown_growth: self.breaker.cooldown_growth,
            max_cooldown: Duration::from_secs(self.breaker.max_cooldown_secs),
        }
    }

    /// Parses the configured targets into crawl assignments
    pub fn crawl_targets(&self) -> Result<Vec<CrawlTarget>, ConfigError> {
        self.targets
            .iter()
            .map(|entry| {
                let root_listing_url = Url::parse(&entry.root_listing_url).map_err(|e| {
                    ConfigError::InvalidUrl(format!(
                        "target '{}' root listing URL: {}",
                        entry.domain, e
                    ))
                })?;
                Ok(CrawlTarget {
                    domain: entry.domain.clone(),
                    root_listing_url,
                    url_limit: entry.url_limit,
                })
            })
            .collect()
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent(),
            max_listing_depth: default_max_depth(),
            request_timeout_secs: default_timeout_secs(),
            respect_robots: default_true(),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            max_concurrency: default_domain_concurrency(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            rate_limit_threshold: default_rate_limit_threshold(),
            forbidden_threshold: default_forbidden_threshold(),
            min_attempts_for_blocking: default_min_attempts(),
            success_rate_threshold: default_success_rate(),
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_breaker_threshold(),
            cooldown_secs: default_cooldown_secs(),
            cooldown_growth: default_cooldown_growth(),
            max_cooldown_secs: default_max_cooldown_secs(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            exclude_fragments: default_exclude_fragments(),
            exclude_patterns: default_exclude_patterns(),
            include_patterns: default_include_patterns(),
            listing_keywords: default_listing_keywords(),
            content_keywords: default_content_keywords(),
            overrides: default_overrides(),
        }
    }
}

fn default_max_concurrent() -> usize {
    8
}
fn default_max_depth() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_min_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    2_000
}
fn default_domain_concurrency() -> u32 {
    4
}
fn default_max_retries() -> u32 {
    3
}
fn default_rate_limit_threshold() -> u32 {
    10
}
fn default_forbidden_threshold() -> u32 {
    5
}
fn default_min_attempts() -> u64 {
    5
}
fn default_success_rate() -> f64 {
    0.2
}
fn default_breaker_threshold() -> u32 {
    5
}
fn default_cooldown_secs() -> u64 {
    30
}
fn default_cooldown_growth() -> f64 {
    2.0
}
fn default_max_cooldown_secs() -> u64 {
    300
}

fn default_exclude_fragments() -> Vec<String> {
    [
        "/category/",
        "/categories/",
        "/tag/",
        "/tags/",
        "/page/",
        "/author/",
        "/search/",
        "/collections/",
        "/topics/",
        "/shop/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude_patterns() -> Vec<String> {
    [
        // Date-archive roots
        r"^/\d{4}/?$",
        r"^/\d{4}/\d{1,2}/?$",
        // Bare paths ending in a plural listing noun
        r"^(/[a-z0-9-]+)?/(recipes|categories|collections|archives|guides|tags|authors)/?$",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_include_patterns() -> Vec<String> {
    [
        // Single item under an item-type prefix
        r"^/recipe/[^/]+/?$",
        r"^/recipes/[^/]+/?$",
        // Dated single post
        r"^/\d{4}/\d{1,2}/[^/]+/?$",
        // Slug with a qualifier suffix
        r"-recipe(-\d+)?/?$",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_listing_keywords() -> Vec<String> {
    [
        "recipes", "category", "categories", "browse", "collection", "archive", "search",
        "index", "sitemap",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_content_keywords() -> Vec<String> {
    vec!["recipe".to_string()]
}

fn default_overrides() -> Vec<OverrideEntry> {
    // Collection pages on this site share the slug shape of single items and
    // differ only in the plural qualifier.
    vec![OverrideEntry {
        domain: "*.seriouseats.com".to_string(),
        path_fragment: "-recipes-".to_string(),
        is_content: false,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[user-agent]
crawler-name = "LadleBot"
crawler-version = "0.3"
contact-url = "https://example.com/bot"
contact-email = "crawler@example.com"
"#
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();

        assert_eq!(config.crawler.max_concurrent_fetches, 8);
        assert_eq!(config.throttle.min_delay_ms, 500);
        assert_eq!(config.health.forbidden_threshold, 5);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert!(!config.classifier.exclude_fragments.is_empty());
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_user_agent_string_format() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        assert_eq!(
            config.user_agent.user_agent_string(),
            "LadleBot/0.3 (+https://example.com/bot; crawler@example.com)"
        );
    }

    #[test]
    fn test_targets_parse() {
        let toml_str = format!(
            "{}\n[[target]]\ndomain = \"example.com\"\nroot-listing-url = \"https://example.com/sitemap.xml\"\nurl-limit = 50\n",
            minimal_toml()
        );
        let config: Config = toml::from_str(&toml_str).unwrap();

        let targets = config.crawl_targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].domain, "example.com");
        assert_eq!(targets[0].url_limit, Some(50));
    }

    #[test]
    fn test_invalid_target_url_is_rejected() {
        let toml_str = format!(
            "{}\n[[target]]\ndomain = \"example.com\"\nroot-listing-url = \"not a url\"\n",
            minimal_toml()
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(config.crawl_targets().is_err());
    }

    #[test]
    fn test_override_section_parses() {
        let toml_str = format!(
            "{}\n[[classifier.override]]\ndomain = \"*.example.com\"\npath-fragment = \"/p/\"\nis-content = true\n",
            minimal_toml()
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.classifier.overrides.len(), 1);
        assert!(config.classifier.overrides[0].is_content);
    }
}
