//! Robots.txt discovery
//!
//! Robots.txt serves two purposes here: its `Sitemap:` declarations feed the
//! fetch-fallback candidate list, and its allow/deny rules plus `Crawl-delay`
//! shape what the crawl hands downstream and how fast it runs. Discovery is
//! best-effort: an unreachable or malformed robots.txt degrades to allow-all
//! with no hints, never to a failed crawl.

mod parser;

pub use parser::RobotsRules;

use crate::crawler::Transport;
use std::time::Duration;
use url::Url;

/// Everything learned from one origin's robots.txt
#[derive(Debug, Clone)]
pub struct RobotsInfo {
    pub rules: RobotsRules,
    /// Absolute listing URLs declared via `Sitemap:` lines
    pub sitemap_hints: Vec<String>,
    pub crawl_delay: Option<f64>,
}

impl RobotsInfo {
    pub fn permissive() -> Self {
        Self {
            rules: RobotsRules::allow_all(),
            sitemap_hints: Vec::new(),
            crawl_delay: None,
        }
    }
}

/// Fetches and interprets robots.txt for the origin of `url`
pub async fn discover(
    transport: &dyn Transport,
    url: &Url,
    user_agent: &str,
    timeout: Duration,
) -> RobotsInfo {
    let Ok(robots_url) = url.join("/robots.txt") else {
        return RobotsInfo::permissive();
    };

    match transport.fetch(robots_url.as_str(), timeout).await {
        Ok(response) if response.status == 200 => {
            let content = String::from_utf8_lossy(&response.body);
            let rules = RobotsRules::from_content(&content);
            let crawl_delay = rules.crawl_delay(user_agent);
            let sitemap_hints = extract_sitemap_hints(&content);

            tracing::debug!(
                origin = %robots_url,
                hints = sitemap_hints.len(),
                ?crawl_delay,
                "robots.txt discovered"
            );

            RobotsInfo {
                rules,
                sitemap_hints,
                crawl_delay,
            }
        }
        _ => {
            tracing::debug!(origin = %robots_url, "robots.txt unavailable, allowing all");
            RobotsInfo::permissive()
        }
    }
}

/// Scans robots.txt content for `Sitemap:` declarations
fn extract_sitemap_hints(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("sitemap") {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
        .collect()
}
