use crate::config::types::{
    BreakerConfig, ClassifierConfig, Config, CrawlerConfig, HealthConfig, TargetEntry,
    ThrottleConfig, UserAgentConfig,
};
use crate::url::ClassifierRules;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler(&config.crawler)?;
    validate_user_agent(&config.user_agent)?;
    validate_throttle(&config.throttle)?;
    validate_health(&config.health)?;
    validate_breaker(&config.breaker)?;
    validate_classifier(&config.classifier)?;
    validate_targets(&config.targets)?;
    Ok(())
}

fn validate_crawler(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 100, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_listing_depth < 1 || config.max_listing_depth > 10 {
        return Err(ConfigError::Validation(format!(
            "max_listing_depth must be between 1 and 10, got {}",
            config.max_listing_depth
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_throttle(config: &ThrottleConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 {
        return Err(ConfigError::Validation(
            "throttle max_concurrency must be >= 1".to_string(),
        ));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "throttle min_delay_ms ({}) exceeds max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "throttle max_retries must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_health(config: &HealthConfig) -> Result<(), ConfigError> {
    if config.rate_limit_threshold < 1 || config.forbidden_threshold < 1 {
        return Err(ConfigError::Validation(
            "health error thresholds must be >= 1".to_string(),
        ));
    }

    if config.min_attempts_for_blocking < 1 {
        return Err(ConfigError::Validation(
            "min_attempts_for_blocking must be >= 1".to_string(),
        ));
    }

    // Unblocking requires the rate to pass twice this threshold, so anything
    // at 0.5 or above could never recover.
    if config.success_rate_threshold <= 0.0 || config.success_rate_threshold >= 0.5 {
        return Err(ConfigError::Validation(format!(
            "success_rate_threshold must be in (0, 0.5), got {}",
            config.success_rate_threshold
        )));
    }

    Ok(())
}

fn validate_breaker(config: &BreakerConfig) -> Result<(), ConfigError> {
    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(
            "breaker failure_threshold must be >= 1".to_string(),
        ));
    }

    if config.cooldown_secs < 1 {
        return Err(ConfigError::Validation(
            "breaker cooldown_secs must be >= 1".to_string(),
        ));
    }

    if config.cooldown_growth < 1.0 {
        return Err(ConfigError::Validation(format!(
            "breaker cooldown_growth must be >= 1.0, got {}",
            config.cooldown_growth
        )));
    }

    if config.max_cooldown_secs < config.cooldown_secs {
        return Err(ConfigError::Validation(
            "breaker max_cooldown_secs must be >= cooldown_secs".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier(config: &ClassifierConfig) -> Result<(), ConfigError> {
    // Compiling the rules exercises every configured pattern
    ClassifierRules::from_config(config)?;

    for entry in &config.overrides {
        validate_domain_pattern(&entry.domain)?;

        if entry.path_fragment.is_empty() {
            return Err(ConfigError::Validation(format!(
                "override for '{}' has an empty path-fragment",
                entry.domain
            )));
        }
    }

    Ok(())
}

fn validate_targets(targets: &[TargetEntry]) -> Result<(), ConfigError> {
    for entry in targets {
        validate_domain_string(&entry.domain)?;

        let url = Url::parse(&entry.root_listing_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "target '{}' root listing URL: {}",
                entry.domain, e
            ))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "target '{}' root listing URL must be HTTP(S)",
                entry.domain
            )));
        }

        if let Some(limit) = entry.url_limit {
            if limit < 1 {
                return Err(ConfigError::Validation(format!(
                    "target '{}' url-limit must be >= 1",
                    entry.domain
                )));
            }
        }
    }

    Ok(())
}

/// Validates a domain pattern, with or without a `*.` wildcard prefix
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_domain_string(base)
}

fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "domain '{}' must contain at least one dot",
            domain
        )));
    }

    Ok(())
}

/// Basic email shape check: one '@', non-empty sides, dotted domain
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
