//! Content-page vs listing-page classification
//!
//! Listing documents mix URLs of individual content pages with URLs of
//! category/tag/archive pages. The classifier separates them with layered
//! rules evaluated in fixed precedence order:
//!
//! 1. exclusion patterns (taxonomy/archive shapes) — always win
//! 2. per-domain overrides — site-specific corrections to the generic rules
//! 3. inclusion patterns (single-item path shapes)
//! 4. structural heuristics — weak signals used when nothing else matched
//!
//! Exclusions dominate inclusions because a taxonomy path shape is
//! higher-precision evidence than a coincidental item-shape match, and the
//! overrides exist precisely for domains where the generic inclusion rules
//! get it wrong, so they are consulted before inclusions.

use crate::config::ClassifierConfig;
use crate::url::matcher::matches_wildcard;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// A site-specific classification correction.
///
/// When `domain` matches the URL's host and `path_fragment` occurs in its
/// path, the verdict is `is_content`, overriding generic inclusion rules.
#[derive(Debug, Clone)]
pub struct DomainOverride {
    pub domain: String,
    pub path_fragment: String,
    pub is_content: bool,
}

/// Compiled classification rule set
pub struct ClassifierRules {
    exclude_fragments: Vec<String>,
    exclude_patterns: Vec<Regex>,
    include_patterns: Vec<Regex>,
    overrides: Vec<DomainOverride>,
    listing_keywords: Vec<String>,
    content_keywords: Vec<String>,
}

impl ClassifierRules {
    /// Compiles a rule set from configuration.
    ///
    /// Fails if any configured pattern is not a valid regular expression.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, ConfigError> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        ConfigError::InvalidPattern(format!("'{}' does not compile: {}", p, e))
                    })
                })
                .collect()
        };

        Ok(Self {
            exclude_fragments: config
                .exclude_fragments
                .iter()
                .map(|f| f.to_ascii_lowercase())
                .collect(),
            exclude_patterns: compile(&config.exclude_patterns)?,
            include_patterns: compile(&config.include_patterns)?,
            overrides: config
                .overrides
                .iter()
                .map(|o| DomainOverride {
                    domain: o.domain.to_ascii_lowercase(),
                    path_fragment: o.path_fragment.to_ascii_lowercase(),
                    is_content: o.is_content,
                })
                .collect(),
            listing_keywords: config
                .listing_keywords
                .iter()
                .map(|k| k.to_ascii_lowercase())
                .collect(),
            content_keywords: config
                .content_keywords
                .iter()
                .map(|k| k.to_ascii_lowercase())
                .collect(),
        })
    }

    /// Decides whether a URL points at an individual content page.
    pub fn is_content_url(&self, url: &Url) -> bool {
        let path = url.path().to_ascii_lowercase();

        if self.matches_exclusion(&path) {
            return false;
        }

        if let Some(host) = url.host_str() {
            let host = host.to_lowercase();
            for rule in &self.overrides {
                if matches_wildcard(&rule.domain, &host) && path.contains(&rule.path_fragment) {
                    return rule.is_content;
                }
            }
        }

        if self.include_patterns.iter().any(|re| re.is_match(&path)) {
            return true;
        }

        self.structural_heuristic(&path)
    }

    fn matches_exclusion(&self, path: &str) -> bool {
        self.exclude_fragments.iter().any(|f| path.contains(f.as_str()))
            || self.exclude_patterns.iter().any(|re| re.is_match(path))
    }

    /// Weak fallback signals when no explicit rule matched: reasonable path
    /// depth, no listing keyword in the final segment, and either a content
    /// keyword or a long hyphenated slug.
    fn structural_heuristic(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() || segments.len() > 5 {
            return false;
        }

        let Some(last) = segments.last() else {
            return false;
        };

        if self.listing_keywords.iter().any(|k| last.contains(k.as_str())) {
            return false;
        }
        if self.content_keywords.iter().any(|k| last.contains(k.as_str())) {
            return true;
        }

        last.len() > 8 && last.contains('-')
    }
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
            .expect("built-in classifier patterns compile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ClassifierRules {
        ClassifierRules::default()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_item_paths_are_content() {
        let r = rules();
        assert!(r.is_content_url(&url("https://example.com/recipe/pasta/")));
        assert!(r.is_content_url(&url("https://example.com/recipes/garlic-naan/")));
        assert!(r.is_content_url(&url("https://example.com/2024/03/braised-leeks/")));
    }

    #[test]
    fn test_taxonomy_paths_are_not_content() {
        let r = rules();
        assert!(!r.is_content_url(&url("https://example.com/category/pasta/")));
        assert!(!r.is_content_url(&url("https://example.com/tag/weeknight/")));
        assert!(!r.is_content_url(&url("https://example.com/page/3/")));
        assert!(!r.is_content_url(&url("https://example.com/author/jane/")));
        assert!(!r.is_content_url(&url("https://example.com/search/soup/")));
    }

    #[test]
    fn test_exclusion_dominates_inclusion() {
        // Matches the single-item inclusion shape AND a taxonomy fragment;
        // the exclusion must win.
        let r = rules();
        assert!(!r.is_content_url(&url("https://example.com/recipe/category/")));
        assert!(!r.is_content_url(&url("https://example.com/category/pasta-recipe/")));
    }

    #[test]
    fn test_date_archive_roots_are_not_content() {
        let r = rules();
        assert!(!r.is_content_url(&url("https://example.com/2024/")));
        assert!(!r.is_content_url(&url("https://example.com/2024/03/")));
    }

    #[test]
    fn test_bare_listing_noun_paths_are_not_content() {
        let r = rules();
        assert!(!r.is_content_url(&url("https://example.com/recipes/")));
        assert!(!r.is_content_url(&url("https://example.com/dinner/recipes/")));
    }

    #[test]
    fn test_override_beats_generic_inclusion() {
        // The plural "-recipes-" slug marks collection pages on this domain
        // even though the slug-with-qualifier inclusion would accept them.
        let r = rules();
        assert!(!r.is_content_url(&url(
            "https://www.seriouseats.com/most-saved-shrimp-recipes-11879657"
        )));
        assert!(r.is_content_url(&url(
            "https://www.seriouseats.com/hot-milk-cake-recipe-11878680"
        )));
    }

    #[test]
    fn test_heuristic_accepts_long_hyphenated_slug() {
        let r = rules();
        assert!(r.is_content_url(&url("https://example.com/slow-roasted-tomato-tart")));
    }

    #[test]
    fn test_heuristic_rejects_listing_keyword_in_last_segment() {
        let r = rules();
        assert!(!r.is_content_url(&url("https://example.com/holiday-browse")));
        assert!(!r.is_content_url(&url("https://example.com/winter-collection")));
    }

    #[test]
    fn test_heuristic_rejects_deep_and_shallow_paths() {
        let r = rules();
        assert!(!r.is_content_url(&url("https://example.com/")));
        assert!(!r.is_content_url(&url("https://example.com/a/b/c/d/e/f-green-bean-salad")));
    }

    #[test]
    fn test_short_opaque_segment_is_not_content() {
        let r = rules();
        assert!(!r.is_content_url(&url("https://example.com/about")));
    }

    #[test]
    fn test_custom_override_marks_content() {
        let config = ClassifierConfig {
            overrides: vec![crate::config::OverrideEntry {
                domain: "*.example.com".to_string(),
                path_fragment: "/p/".to_string(),
                is_content: true,
            }],
            ..ClassifierConfig::default()
        };
        let r = ClassifierRules::from_config(&config).unwrap();
        assert!(r.is_content_url(&url("https://www.example.com/p/x9k2")));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = ClassifierConfig {
            include_patterns: vec!["([unclosed".to_string()],
            ..ClassifierConfig::default()
        };
        assert!(ClassifierRules::from_config(&config).is_err());
    }
}
