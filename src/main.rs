//! Listing-Harvest main entry point
//!
//! This is the command-line interface for the Listing-Harvest listing extraction pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use listing_harvest::config::{
    bbox_from_url, load_bbox, load_config_with_hash, load_identifier_list, save_bbox, Config,
};
use listing_harvest::crawler::{
    build_http_client, Dispatcher, DispatcherSettings, HttpDetailSource, ListingDiscovery,
    RateLimiter, Sinks,
};
use listing_harvest::model::Identifier;
use listing_harvest::output::{
    build_sink_client, print_stats, CrawlStats, HttpObjectStorage, HttpSearchIndex,
    ObjectStorage, SearchIndex,
};
use listing_harvest::storage::{open_storage, ListingStore, RunStatus, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Listing-Harvest: a resilient listing extraction pipeline
///
/// Listing-Harvest discovers real-estate listings, fetches each detail page
/// politely and stores validated, normalized records.
#[derive(Parser, Debug)]
#[command(name = "listing-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resilient listing extraction pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover listings and harvest their details
    Crawl {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Newline-delimited identifier list to harvest
        #[arg(long, value_name = "FILE")]
        list: Option<PathBuf>,

        /// Bounding-box JSON file; harvests every listing inside it
        #[arg(long, value_name = "FILE")]
        bbox: Option<PathBuf>,

        /// Walk the paginated search (default when no other input is given)
        #[arg(long)]
        search: bool,

        /// Validate config and show what would be harvested without fetching
        #[arg(long)]
        dry_run: bool,
    },

    /// Write a bounding-box file from a marketplace map URL
    Bbox {
        /// Map URL carrying a `bbox` query parameter
        #[arg(long)]
        url: String,

        /// Output JSON file
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

/// Identifier inputs selected on the command line
struct Inputs {
    list: Option<PathBuf>,
    bbox: Option<PathBuf>,
    search: bool,
}

impl Inputs {
    fn walks_search(&self) -> bool {
        self.search || (self.list.is_none() && self.bbox.is_none())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Crawl {
            config,
            list,
            bbox,
            search,
            dry_run,
        } => {
            let inputs = Inputs { list, bbox, search };
            handle_crawl(&config, inputs, dry_run).await
        }
        Command::Bbox { url, out } => handle_bbox(&url, &out),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvest=info,warn"),
            1 => EnvFilter::new("listing_harvest=debug,info"),
            2 => EnvFilter::new("listing_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the `bbox` command: converts a map URL into a bounding-box file
fn handle_bbox(url: &str, out: &Path) -> anyhow::Result<()> {
    let bbox = bbox_from_url(url)?;
    save_bbox(&bbox, out).with_context(|| format!("writing {}", out.display()))?;

    println!("✓ Bounding box written to: {}", out.display());
    println!(
        "  lat {} .. {}, lon {} .. {}",
        bbox.min_latitude, bbox.max_latitude, bbox.min_longitude, bbox.max_longitude
    );
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config, inputs: &Inputs) -> anyhow::Result<()> {
    println!("=== Listing-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Request interval: {}-{}ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!(
        "  Rate-limit cooldown: {}ms",
        config.crawler.rate_limit_cooldown_ms
    );
    println!("  Max search pages: {}", config.crawler.max_pages);
    println!("  Max retries: {}", config.crawler.max_retries);

    println!("\nSource:");
    println!("  Search: {}", config.source.search_url);
    println!("  Detail: {}", config.source.detail_url);
    println!("  Cities: {}", config.source.city_ids.join(", "));
    println!("  Category: {}", config.source.category);
    println!("  User agents: {}", config.source.user_agents.len());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(url) = &config.output.search_index_url {
        println!("  Search index: {} ({})", url, config.output.search_index_name);
    }
    if let Some(url) = &config.output.object_storage_url {
        println!(
            "  Object storage: {} ({})",
            url, config.output.object_storage_bucket
        );
    }
    if let Some(dir) = &config.output.json_dir {
        println!("  JSON dumps: {}", dir);
    }

    println!("\nInputs:");
    if let Some(list) = &inputs.list {
        let identifiers = load_identifier_list(list)?;
        println!("  List {}: {} identifiers", list.display(), identifiers.len());
    }
    if let Some(path) = &inputs.bbox {
        let bbox = load_bbox(path)?;
        println!(
            "  Viewport {}: lat {} .. {}, lon {} .. {}",
            path.display(),
            bbox.min_latitude,
            bbox.max_latitude,
            bbox.min_longitude,
            bbox.max_longitude
        );
    }
    if inputs.walks_search() {
        println!("  Search: up to {} pages", config.crawler.max_pages);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config_path: &Path, inputs: Inputs, dry_run: bool) -> anyhow::Result<()> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", config_path.display());
    let (config, config_hash) = load_config_with_hash(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if dry_run {
        return handle_dry_run(&config, &inputs);
    }

    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
    let client = build_http_client(&config.source, timeout)?;

    let identifiers = gather_identifiers(&config, &inputs, client.clone()).await?;
    if identifiers.is_empty() {
        tracing::warn!("No identifiers discovered, nothing to harvest");
        return Ok(());
    }
    tracing::info!("Gathered {} identifiers", identifiers.len());

    let store = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let run_id = store.create_run(&config_hash)?;
    tracing::info!("Starting run {}", run_id);

    let (stats, interrupted) = match harvest(&config, client, store.clone(), identifiers).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Run {} aborted: {}", run_id, e);
            let recorded = store.complete_run(run_id, RunStatus::Failed, &CrawlStats::default());
            if let Err(record_error) = recorded {
                tracing::warn!("Failed to record aborted run {}: {}", run_id, record_error);
            }
            return Err(e.into());
        }
    };

    let status = if interrupted {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    };
    store.complete_run(run_id, status, &stats)?;

    print_stats(&stats);
    Ok(())
}

/// Runs the dispatcher over the gathered identifiers
///
/// Returns the run statistics and whether Ctrl-C cut the run short.
async fn harvest(
    config: &Config,
    client: reqwest::Client,
    store: Arc<SqliteStore>,
    identifiers: Vec<Identifier>,
) -> listing_harvest::Result<(CrawlStats, bool)> {
    let sinks = build_sinks(config, store).await?;
    let source = Arc::new(HttpDetailSource::new(client, &config.source));
    let mut dispatcher = Dispatcher::new(
        source,
        RateLimiter::from_config(&config.crawler).shared(),
        sinks,
        DispatcherSettings::from_config(&config.crawler),
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    let shutdown = async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => flag.store(true, Ordering::SeqCst),
            Err(e) => {
                tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    let stats = dispatcher.run_until(identifiers, shutdown).await;
    Ok((stats, interrupted.load(Ordering::SeqCst)))
}

/// Collects identifiers from the list file, the viewport and the search walk
async fn gather_identifiers(
    config: &Config,
    inputs: &Inputs,
    client: reqwest::Client,
) -> anyhow::Result<Vec<Identifier>> {
    let mut identifiers = Vec::new();

    if let Some(list) = &inputs.list {
        let listed = load_identifier_list(list)
            .with_context(|| format!("reading {}", list.display()))?;
        tracing::info!("Loaded {} identifiers from {}", listed.len(), list.display());
        identifiers.extend(listed);
    }

    let discovery = ListingDiscovery::new(client, &config.source, config.crawler.max_pages)
        .with_limiter(RateLimiter::from_config(&config.crawler).shared());

    if let Some(path) = &inputs.bbox {
        let bbox = load_bbox(path).with_context(|| format!("reading {}", path.display()))?;
        identifiers.extend(discovery.fetch_viewport(&bbox).await);
    }

    if inputs.walks_search() {
        identifiers.extend(discovery.search_all().await);
    }

    Ok(identifiers)
}

/// Wires the configured downstream collaborators
///
/// The HTTP sinks get their own client; the JSON dump directory is created
/// up front so a bad path fails the run before any fetch.
async fn build_sinks(config: &Config, store: Arc<SqliteStore>) -> listing_harvest::Result<Sinks> {
    let output = &config.output;
    let store: Arc<dyn ListingStore> = store;
    let client = build_sink_client(Duration::from_secs(config.crawler.request_timeout_secs))?;

    let json_dir = output.json_dir.as_ref().map(PathBuf::from);
    if let Some(dir) = &json_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    Ok(Sinks {
        store: Some(store),
        search_index: output.search_index_url.as_deref().map(|url| -> Arc<dyn SearchIndex> {
            Arc::new(HttpSearchIndex::new(
                client.clone(),
                url,
                &output.search_index_name,
            ))
        }),
        object_storage: output.object_storage_url.as_deref().map(|url| -> Arc<dyn ObjectStorage> {
            Arc::new(HttpObjectStorage::new(
                client.clone(),
                url,
                &output.object_storage_bucket,
                output.object_storage_key.clone(),
            ))
        }),
        json_dir,
        max_images: output.max_images,
    })
}
