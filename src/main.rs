//! Ladle command-line entry point
//!
//! Thin caller around the crawl engine: loads a TOML configuration, wires up
//! the shared health/throttle/breaker registries, runs each configured
//! target, and writes the resulting content-URL list.

use anyhow::Context;
use clap::Parser;
use ladle::config::load_config_with_hash;
use ladle::crawler::HttpTransport;
use ladle::health::{AdaptationTable, CircuitBreakerRegistry};
use ladle::{
    AdaptiveThrottleController, ClassifierRules, Config, CrawlEngine, DomainHealthTracker,
    EventSink, TracingSink,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ladle: adaptive sitemap crawling for content sites
///
/// Discovers listing documents, resolves nested indexes, and emits the
/// deduplicated content URLs they reference, adapting its pacing per domain
/// along the way.
#[derive(Parser, Debug)]
#[command(name = "ladle")]
#[command(version)]
#[command(about = "Adaptive listing-crawl engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Write discovered URLs to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) =
        load_config_with_hash(&cli.config).context("failed to load configuration")?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        print_dry_run(&config)?;
        return Ok(());
    }

    run_targets(config, cli.output).await
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ladle=info,warn"),
            1 => EnvFilter::new("ladle=debug,info"),
            2 => EnvFilter::new("ladle=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Shows the effective configuration and targets without fetching anything
fn print_dry_run(config: &Config) -> anyhow::Result<()> {
    let targets = config.crawl_targets().context("invalid crawl targets")?;

    println!("=== Ladle Dry Run ===\n");

    println!("Engine:");
    println!(
        "  Concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Max listing depth: {}", config.crawler.max_listing_depth);
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);

    println!("\nDefault pacing:");
    println!(
        "  Delay: {}..{}ms, concurrency {}, retries {}",
        config.throttle.min_delay_ms,
        config.throttle.max_delay_ms,
        config.throttle.max_concurrency,
        config.throttle.max_retries
    );

    println!("\nUser agent: {}", config.user_agent.user_agent_string());

    println!("\nTargets ({}):", targets.len());
    for target in &targets {
        println!(
            "  - {} <- {} (limit: {})",
            target.domain,
            target.root_listing_url,
            target
                .url_limit
                .map(|l| l.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Crawls every configured target and writes the combined URL list
async fn run_targets(config: Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    let targets = config.crawl_targets().context("invalid crawl targets")?;
    if targets.is_empty() {
        anyhow::bail!("no [[target]] entries in configuration");
    }

    let events: Arc<dyn EventSink> = Arc::new(TracingSink);
    let transport =
        Arc::new(HttpTransport::new(&config.user_agent).context("failed to build HTTP client")?);
    let health = Arc::new(DomainHealthTracker::new(
        config.health_thresholds(),
        events.clone(),
    ));
    let throttle = Arc::new(AdaptiveThrottleController::new(
        config.throttle_defaults(),
        AdaptationTable::default(),
        events.clone(),
    ));
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        config.breaker_settings(),
        events.clone(),
    ));
    let rules = Arc::new(
        ClassifierRules::from_config(&config.classifier).context("invalid classifier rules")?,
    );

    let engine = CrawlEngine::new(
        config.engine_settings(),
        transport,
        health,
        throttle,
        breakers,
        rules,
        events,
        config.user_agent.user_agent_string(),
    );

    let mut all_urls: Vec<String> = Vec::new();
    for target in &targets {
        let outcome = engine.crawl(target).await;

        for issue in &outcome.issues {
            tracing::warn!(domain = %target.domain, url = %issue.url, reason = %issue.reason, "crawl issue");
        }
        tracing::info!(
            domain = %target.domain,
            urls = outcome.content_urls.len(),
            issues = outcome.issues.len(),
            "target finished"
        );

        all_urls.extend(outcome.content_urls);
    }

    match output {
        Some(path) => {
            let mut file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            for url in &all_urls {
                writeln!(file, "{}", url)?;
            }
            tracing::info!("Wrote {} URLs to {}", all_urls.len(), path.display());
        }
        None => {
            for url in &all_urls {
                println!("{}", url);
            }
        }
    }

    Ok(())
}
