use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses, and validates a TOML configuration file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// SHA-256 hash of the configuration file content.
///
/// Logged at startup so operators can tell which configuration a given crawl
/// ran with.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration together with its content hash.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[crawler]
max-concurrent-fetches = 4
max-listing-depth = 3

[user-agent]
crawler-name = "LadleBot"
crawler-version = "0.3"
contact-url = "https://example.com/bot"
contact-email = "crawler@example.com"

[throttle]
min-delay-ms = 250
max-delay-ms = 1500

[[target]]
domain = "example.com"
root-listing-url = "https://example.com/sitemap.xml"
url-limit = 100
"#;

    #[test]
    fn test_load_valid_config() {
        let file = write_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_concurrent_fetches, 4);
        assert_eq!(config.throttle.min_delay_ms, 250);
        assert_eq!(config.targets.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config(Path::new("/nonexistent/ladle.toml")).is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = write_temp_config("this is not TOML {{{");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_failing_validation() {
        let invalid = VALID_CONFIG.replace("max-concurrent-fetches = 4", "max-concurrent-fetches = 0");
        let file = write_temp_config(&invalid);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_config_hash_is_stable() {
        let file = write_temp_config(VALID_CONFIG);
        let first = compute_config_hash(file.path()).unwrap();
        let second = compute_config_hash(file.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let a = write_temp_config("content a");
        let b = write_temp_config("content b");

        assert_ne!(
            compute_config_hash(a.path()).unwrap(),
            compute_config_hash(b.path()).unwrap()
        );
    }
}
