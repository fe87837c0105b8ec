//! Recursive crawl orchestration
//!
//! `crawl()` turns one root listing URL into a deduplicated, size-bounded set
//! of content URLs. For every listing URL it checks, in order: the result
//! limit, the visited set (check-then-mark is one critical section, so
//! concurrent branches cannot fetch the same listing twice), and the domain
//! admission gate. Only then does it fetch, parse, classify, and recurse into
//! nested indexes under the shared concurrency limiter.
//!
//! Individual fetch and parse failures never propagate past this module;
//! they accumulate in the per-target issue list returned beside the results.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::transport::Transport;
use crate::events::{CrawlEvent, EventSink};
use crate::health::{
    AdaptiveThrottleController, CircuitBreakerRegistry, DomainHealthTracker,
};
use crate::listing::{extract_entries_fallback, parse_listing, ParsedListing};
use crate::robots::{self, RobotsInfo};
use crate::url::{extract_domain, is_listing_ref, normalize_url, ClassifierRules};
use futures::future::{join_all, BoxFuture};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// One crawl assignment, supplied by the caller's site registry
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    pub domain: String,
    pub root_listing_url: Url,
    /// Upper bound on returned content URLs; None means unbounded
    pub url_limit: Option<usize>,
}

/// A listing that was skipped or gave up, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlIssue {
    pub url: String,
    pub reason: String,
}

/// Result of one crawl run
///
/// An empty URL list beside a non-empty issue list is a legitimate outcome,
/// not a failure; the caller decides whether to retry the target later.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub content_urls: Vec<String>,
    pub issues: Vec<CrawlIssue>,
}

/// Engine-level knobs, distinct from per-domain adaptive pacing
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Run-wide bound on concurrent listing fetches
    pub max_concurrent_fetches: usize,
    /// Bound on index-nesting recursion
    pub max_listing_depth: u32,
    /// Attempt-scoped fetch timeout
    pub request_timeout: Duration,
    /// Consult robots.txt for hints, filtering, and crawl delays
    pub respect_robots: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            max_listing_depth: 5,
            request_timeout: Duration::from_secs(30),
            respect_robots: true,
        }
    }
}

/// The recursive crawl engine
///
/// Health tracker, throttle controller, and breaker registry are shared,
/// process-wide collaborators injected by the composition root; the engine
/// never owns globals.
pub struct CrawlEngine {
    transport: Arc<dyn Transport>,
    health: Arc<DomainHealthTracker>,
    throttle: Arc<AdaptiveThrottleController>,
    rules: Arc<ClassifierRules>,
    events: Arc<dyn EventSink>,
    fetcher: Fetcher,
    settings: EngineSettings,
    user_agent: String,
}

/// Mutable state scoped to one crawl() invocation, discarded at completion
struct RunState {
    visited: Mutex<HashSet<String>>,
    results: Mutex<HashSet<String>>,
    issues: Mutex<Vec<CrawlIssue>>,
    url_limit: Option<usize>,
    limiter: Semaphore,
    domain_limiters: Mutex<HashMap<String, Arc<Semaphore>>>,
    robots: RobotsInfo,
}

impl RunState {
    fn new(url_limit: Option<usize>, max_concurrent: usize, robots: RobotsInfo) -> Self {
        Self {
            visited: Mutex::new(HashSet::new()),
            results: Mutex::new(HashSet::new()),
            issues: Mutex::new(Vec::new()),
            url_limit,
            limiter: Semaphore::new(max_concurrent),
            domain_limiters: Mutex::new(HashMap::new()),
            robots,
        }
    }

    /// Atomic check-then-mark; returns false when the URL was already visited
    fn mark_visited(&self, key: String) -> bool {
        self.visited.lock().unwrap().insert(key)
    }

    fn limit_reached(&self) -> bool {
        match self.url_limit {
            Some(limit) => self.results.lock().unwrap().len() >= limit,
            None => false,
        }
    }

    /// Adds a content URL unless the limit is already met
    fn push_result(&self, url: &str) {
        let mut results = self.results.lock().unwrap();
        if let Some(limit) = self.url_limit {
            if results.len() >= limit {
                return;
            }
        }
        results.insert(url.to_string());
    }

    fn push_issue(&self, url: &str, reason: &str) {
        self.issues.lock().unwrap().push(CrawlIssue {
            url: url.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Per-domain concurrency slot, sized from the domain's adaptive config
    /// at first use within this run
    fn domain_limiter(
        &self,
        domain: &str,
        throttle: &AdaptiveThrottleController,
    ) -> Arc<Semaphore> {
        let mut limiters = self.domain_limiters.lock().unwrap();
        limiters
            .entry(domain.to_string())
            .or_insert_with(|| {
                let concurrency = throttle.current(domain).max_concurrency.max(1);
                Arc::new(Semaphore::new(concurrency as usize))
            })
            .clone()
    }
}

impl CrawlEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: EngineSettings,
        transport: Arc<dyn Transport>,
        health: Arc<DomainHealthTracker>,
        throttle: Arc<AdaptiveThrottleController>,
        breakers: Arc<CircuitBreakerRegistry>,
        rules: Arc<ClassifierRules>,
        events: Arc<dyn EventSink>,
        user_agent: String,
    ) -> Self {
        let fetcher = Fetcher::new(
            transport.clone(),
            health.clone(),
            throttle.clone(),
            breakers.breaker("listing-fetch"),
            events.clone(),
            settings.request_timeout,
        );

        Self {
            transport,
            health,
            throttle,
            rules,
            events,
            fetcher,
            settings,
            user_agent,
        }
    }

    /// Resolves one root listing URL into a deduplicated content-URL set.
    pub async fn crawl(&self, target: &CrawlTarget) -> CrawlOutcome {
        tracing::info!(
            domain = %target.domain,
            root = %target.root_listing_url,
            limit = ?target.url_limit,
            "starting crawl"
        );

        // Admission gate before any network activity, robots.txt included
        if self.health.is_blocked(&target.domain) {
            self.events.emit(CrawlEvent::ListingSkipped {
                url: target.root_listing_url.to_string(),
                reason: "domain blocked".to_string(),
            });
            return CrawlOutcome {
                content_urls: Vec::new(),
                issues: vec![CrawlIssue {
                    url: target.root_listing_url.to_string(),
                    reason: "domain blocked by health tracker".to_string(),
                }],
            };
        }

        let robots = if self.settings.respect_robots {
            robots::discover(
                self.transport.as_ref(),
                &target.root_listing_url,
                &self.user_agent,
                self.settings.request_timeout,
            )
            .await
        } else {
            RobotsInfo::permissive()
        };

        if let Some(delay) = robots.crawl_delay {
            self.throttle.apply_crawl_delay(&target.domain, delay);
        }

        let run = RunState::new(
            target.url_limit,
            self.settings.max_concurrent_fetches,
            robots,
        );

        self.crawl_listing(&run, target.root_listing_url.clone(), 0)
            .await;

        let mut content_urls: Vec<String> = run
            .results
            .into_inner()
            .unwrap_or_default()
            .into_iter()
            .collect();
        content_urls.sort();
        if let Some(limit) = target.url_limit {
            content_urls.truncate(limit);
        }

        let issues = run.issues.into_inner().unwrap_or_default();

        tracing::info!(
            domain = %target.domain,
            urls = content_urls.len(),
            issues = issues.len(),
            "crawl finished"
        );

        CrawlOutcome {
            content_urls,
            issues,
        }
    }

    /// Recursive descent over one listing document
    fn crawl_listing<'a>(
        &'a self,
        run: &'a RunState,
        url: Url,
        depth: u32,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if run.limit_reached() {
                return;
            }

            if depth > self.settings.max_listing_depth {
                run.push_issue(url.as_str(), "listing nesting too deep");
                return;
            }

            let visited_key = match normalize_url(url.as_str()) {
                Ok(normalized) => normalized.to_string(),
                Err(_) => url.to_string(),
            };
            if !run.mark_visited(visited_key) {
                return;
            }

            let Some(domain) = extract_domain(&url) else {
                run.push_issue(url.as_str(), "listing URL has no host");
                return;
            };

            if self.health.is_blocked(&domain) {
                self.events.emit(CrawlEvent::ListingSkipped {
                    url: url.to_string(),
                    reason: "domain blocked".to_string(),
                });
                run.push_issue(url.as_str(), "domain blocked by health tracker");
                return;
            }

            let outcome = {
                let Ok(_slot) = run.limiter.acquire().await else {
                    return;
                };
                let domain_limiter = run.domain_limiter(&domain, &self.throttle);
                let Ok(_domain_slot) = domain_limiter.acquire_owned().await else {
                    return;
                };
                self.fetcher
                    .fetch_with_fallback(&domain, &url, &run.robots.sitemap_hints)
                    .await
            };

            if outcome.is_empty() {
                run.push_issue(url.as_str(), "no usable content from any candidate");
                return;
            }

            let listing = match parse_listing(&outcome.body) {
                Ok(listing) => listing,
                Err(error) => {
                    tracing::debug!(url = %url, %error, "falling back to permissive extraction");
                    extract_entries_fallback(&outcome.body)
                }
            };

            match listing {
                ParsedListing::Index(entries) => {
                    tracing::debug!(url = %url, count = entries.len(), "descending into index");
                    let children: Vec<_> = entries
                        .into_iter()
                        .map(|entry| self.crawl_listing(run, entry.location, depth + 1))
                        .collect();
                    join_all(children).await;
                }
                ParsedListing::Leaf(entries) => {
                    let mut nested: Vec<Url> = Vec::new();

                    for entry in entries {
                        if run.limit_reached() {
                            break;
                        }

                        // Leaf containers of malformed documents can still
                        // reference further listings; recurse instead of
                        // classifying those.
                        if is_listing_ref(&entry.location) {
                            nested.push(entry.location);
                            continue;
                        }

                        if !self.rules.is_content_url(&entry.location) {
                            continue;
                        }

                        if !self.robots_allows(run, &entry.location) {
                            tracing::debug!(url = %entry.location, "content URL disallowed by robots");
                            continue;
                        }

                        run.push_result(entry.location.as_str());
                    }

                    let children: Vec<_> = nested
                        .into_iter()
                        .map(|nested_url| self.crawl_listing(run, nested_url, depth + 1))
                        .collect();
                    join_all(children).await;
                }
            }
        })
    }

    fn robots_allows(&self, run: &RunState, url: &Url) -> bool {
        run.robots.rules.is_allowed(url.as_str(), &self.user_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_visited_is_monotonic() {
        let run = RunState::new(None, 4, RobotsInfo::permissive());

        assert!(run.mark_visited("https://example.com/sitemap.xml".to_string()));
        assert!(!run.mark_visited("https://example.com/sitemap.xml".to_string()));
    }

    #[test]
    fn test_run_state_respects_limit() {
        let run = RunState::new(Some(2), 4, RobotsInfo::permissive());

        run.push_result("https://example.com/recipe/a/");
        run.push_result("https://example.com/recipe/b/");
        run.push_result("https://example.com/recipe/c/");

        assert!(run.limit_reached());
        assert_eq!(run.results.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_run_state_deduplicates_results() {
        let run = RunState::new(None, 4, RobotsInfo::permissive());

        run.push_result("https://example.com/recipe/a/");
        run.push_result("https://example.com/recipe/a/");

        assert_eq!(run.results.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_limit_never_reached() {
        let run = RunState::new(None, 4, RobotsInfo::permissive());
        for i in 0..1_000 {
            run.push_result(&format!("https://example.com/recipe/{}/", i));
        }
        assert!(!run.limit_reached());
    }
}
