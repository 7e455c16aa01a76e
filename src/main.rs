//! au-crawler main entry point
//!
//! This is the command-line interface for the archival unit crawler.

use anyhow::{bail, Context};
use au_crawler::config::{build_crawl_rule, build_crawl_window, load_config_with_hash, Config};
use au_crawler::crawler::{
    build_http_client, AbortSignal, CrawlEndHook, CrawlSpec, CrawlStatus, Crawler, DefinableUnit,
    Fetcher, HttpFetcher, Pacer,
};
use au_crawler::permission::checkers_for;
use au_crawler::storage::{open_store, ContentStore};
use au_crawler::CrawlPhase;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// au-crawler: collects the content of archival units
///
/// Each configured unit is crawled from its start URLs after its manifest
/// pages grant permission. Fetched content and per-unit crawl history are
/// kept in a SQLite store.
#[derive(Parser, Debug)]
#[command(name = "au-crawler")]
#[command(version)]
#[command(about = "Permission-gated crawler for archival units", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl only the unit with this id (repeatable)
    #[arg(long = "unit", value_name = "ID")]
    units: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show per-unit crawl history from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let selected = select_units(&config, &cli.units)?;

    if cli.dry_run {
        handle_dry_run(&config, &selected)
    } else if cli.stats {
        handle_stats(&config, &selected)
    } else {
        handle_crawl(config, selected).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG`, when set, overrides the verbosity flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "au_crawler=info,warn",
            1 => "au_crawler=debug,info",
            2 => "au_crawler=trace,debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Indices of the units to act on: all of them, or those named on the command line
fn select_units(config: &Config, requested: &[String]) -> anyhow::Result<Vec<usize>> {
    if requested.is_empty() {
        return Ok((0..config.units.len()).collect());
    }

    requested
        .iter()
        .map(|id| {
            config
                .units
                .iter()
                .position(|u| &u.id == id)
                .with_context(|| format!("No unit with id '{}' in configuration", id))
        })
        .collect()
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, selected: &[usize]) -> anyhow::Result<()> {
    println!("=== au-crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Default max depth: {}", config.crawler.max_depth);
    println!("  Fetch delay: {}ms", config.crawler.fetch_delay_ms);
    println!(
        "  Start permission policy: {:?}",
        config.crawler.start_permission_policy
    );
    println!(
        "  Permission checkers: {:?}",
        config.crawler.daemon_permission_checkers
    );
    if !config.crawler.globally_permitted_hosts.is_empty() {
        println!(
            "  Globally permitted hosts: {}",
            config.crawler.globally_permitted_hosts.join(", ")
        );
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nArchival Units ({}):", selected.len());
    for &index in selected {
        let unit = &config.units[index];
        match &unit.name {
            Some(name) => println!("  - {} ({})", unit.id, name),
            None => println!("  - {}", unit.id),
        }
        println!(
            "    Max depth: {}",
            unit.max_depth.unwrap_or(config.crawler.max_depth)
        );
        for url in unit.permission_urls.iter().flatten() {
            println!("    Permission: {}", url);
        }
        for url in unit.start_urls.iter().flatten() {
            println!("    Start: {}", url);
        }
        if let Some(oai) = &unit.oai {
            println!("    OAI-PMH: {} ({})", oai.base_url, oai.metadata_prefix);
        }
        match build_crawl_rule(&unit.rules)? {
            Some(rule) => println!("    Rules: {}", rule),
            None => println!("    Rules: (none, every URL in scope)"),
        }
        if let Some(window) = &unit.window {
            println!("    Window: {}", build_crawl_window(window)?);
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows crawl history from the database
fn handle_stats(config: &Config, selected: &[usize]) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let store = open_store(Path::new(&config.storage.database_path))?;

    for &index in selected {
        let id = &config.units[index].id;
        let state = store.load_au_state(id)?;
        let urls = store.count_urls(id)?;

        println!("{}", id);
        println!("  Stored URLs: {}", urls);
        match state.last_crawl_time {
            Some(time) => println!("  Last successful crawl: {}", time.to_rfc3339()),
            None => println!("  Last successful crawl: never"),
        }
        if let Some(result) = state.last_crawl_result {
            println!(
                "  Last result: {} ({})",
                result,
                state.last_crawl_message.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}

/// Logs the outcome of each unit's crawl
struct SummaryHook;

impl CrawlEndHook for SummaryHook {
    fn crawl_ended(&self, status: &CrawlStatus, phase: CrawlPhase) {
        tracing::info!(
            "{}: {} ({}), {} fetched, {} parsed, {} excluded, {} errors, {} bytes",
            status.unit_id(),
            phase,
            status.crawl_error_message(),
            status.urls_fetched().len(),
            status.urls_parsed().len(),
            status.urls_excluded().len(),
            status.urls_with_errors().len(),
            status.content_bytes_fetched()
        );
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, selected: Vec<usize>) -> anyhow::Result<()> {
    let store: Arc<dyn ContentStore> =
        Arc::new(open_store(Path::new(&config.storage.database_path))?);
    let client = build_http_client(&config.user_agent)?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(client.clone()));
    let daemon_checkers = checkers_for(&config.crawler.daemon_permission_checkers);
    let abort = AbortSignal::new();

    let ctrl_c_abort = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, aborting crawls");
            ctrl_c_abort.abort();
        }
    });

    let hook: Arc<dyn CrawlEndHook> = Arc::new(SummaryHook);
    let mut crawls = JoinSet::new();

    for index in selected {
        let unit_config = &config.units[index];
        let unit = DefinableUnit::from_config(unit_config, &config.crawler)?;
        let spec = CrawlSpec::from_unit(&unit);
        let state = store.load_au_state(unit_config.id.as_str())?;

        let mut crawler = Crawler::builder()
            .unit(Arc::new(unit))
            .spec(spec)
            .state(state)
            .fetcher(fetcher.clone())
            .store(store.clone())
            .daemon_checkers(daemon_checkers.clone())
            .globally_permitted_hosts(config.crawler.globally_permitted_hosts.clone())
            .start_permission_policy(config.crawler.start_permission_policy)
            .pacer(Arc::new(Pacer::new(Duration::from_millis(
                config.crawler.fetch_delay_ms,
            ))))
            .abort_signal(abort.clone())
            .end_hook(hook.clone())
            .http_client(client.clone())
            .build()?;

        tracing::info!("Starting crawl of {}", unit_config.id);
        let id = unit_config.id.clone();
        crawls.spawn(async move { (id, crawler.do_crawl().await) });
    }

    let mut failed = Vec::new();
    while let Some(joined) = crawls.join_next().await {
        let (id, result) = joined.context("Crawl task panicked")?;
        match result {
            Ok(CrawlPhase::Success) => {}
            Ok(phase) => failed.push(format!("{} ({})", id, phase)),
            Err(e) => {
                tracing::error!("Crawl of {} failed: {}", id, e);
                failed.push(format!("{} ({})", id, e));
            }
        }
    }

    if !failed.is_empty() {
        bail!("Unsuccessful crawls: {}", failed.join(", "));
    }

    tracing::info!("All crawls completed successfully");
    Ok(())
}
