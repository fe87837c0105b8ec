//! Robots.txt rule evaluation
//!
//! Thin wrapper over the `robotstxt` matcher plus a small group-aware parser
//! for `Crawl-delay`, which the matcher does not expose.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt rules for one origin
#[derive(Debug, Clone)]
pub struct RobotsRules {
    content: String,
    allow_all: bool,
}

impl RobotsRules {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Permissive rules, used whenever robots.txt is missing or unreachable
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks whether a URL may be fetched by the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Extracts the crawl delay applying to `user_agent`, preferring an
    /// agent-specific group over the wildcard group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }

        let wanted = user_agent.to_lowercase();
        let mut group_agents: Vec<String> = Vec::new();
        let mut group_closed = false;
        let mut wildcard_delay = None;
        let mut agent_delay = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A User-agent line after other directives starts a new group
                    if group_closed {
                        group_agents.clear();
                        group_closed = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_closed = true;
                    if let Ok(delay) = value.parse::<f64>() {
                        if group_agents.iter().any(|a| a != "*" && wanted.contains(a.as_str())) {
                            agent_delay = Some(delay);
                        } else if group_agents.iter().any(|a| a == "*") {
                            wildcard_delay = Some(delay);
                        }
                    }
                }
                _ => {
                    group_closed = true;
                }
            }
        }

        agent_delay.or(wildcard_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all_permits_everything() {
        let rules = RobotsRules::allow_all();
        assert!(rules.is_allowed("https://example.com/private", "LadleBot"));
        assert_eq!(rules.crawl_delay("LadleBot"), None);
    }

    #[test]
    fn test_disallow_rules_apply() {
        let rules = RobotsRules::from_content("User-agent: *\nDisallow: /private");
        assert!(rules.is_allowed("https://example.com/recipe/soup/", "LadleBot"));
        assert!(!rules.is_allowed("https://example.com/private/drafts", "LadleBot"));
    }

    #[test]
    fn test_agent_specific_disallow() {
        let rules =
            RobotsRules::from_content("User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(rules.is_allowed("https://example.com/x", "LadleBot"));
        assert!(!rules.is_allowed("https://example.com/x", "BadBot"));
    }

    #[test]
    fn test_wildcard_crawl_delay() {
        let rules = RobotsRules::from_content("User-agent: *\nCrawl-delay: 10\nDisallow: /admin");
        assert_eq!(rules.crawl_delay("LadleBot"), Some(10.0));
    }

    #[test]
    fn test_specific_agent_delay_wins() {
        let rules = RobotsRules::from_content(
            "User-agent: LadleBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10",
        );
        assert_eq!(rules.crawl_delay("LadleBot"), Some(5.0));
        assert_eq!(rules.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_fractional_delay() {
        let rules = RobotsRules::from_content("User-agent: *\nCrawl-delay: 2.5");
        assert_eq!(rules.crawl_delay("LadleBot"), Some(2.5));
    }

    #[test]
    fn test_shared_group_delay() {
        let rules = RobotsRules::from_content("User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 3");
        assert_eq!(rules.crawl_delay("BotA"), Some(3.0));
        assert_eq!(rules.crawl_delay("BotB"), Some(3.0));
        assert_eq!(rules.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_comments_are_ignored() {
        let rules =
            RobotsRules::from_content("# politeness\nUser-agent: *\nCrawl-delay: 4 # seconds");
        assert_eq!(rules.crawl_delay("LadleBot"), Some(4.0));
    }
}
