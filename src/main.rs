//! biblio-crawl main entry point
//!
//! This is the command-line interface for the biblio-crawl e-book collector.

use anyhow::{bail, Context};
use biblio_crawl::config::{load_config_with_hash, validate_seed_url, Config};
use biblio_crawl::report::renderer_for;
use biblio_crawl::{scrap, HttpFetcher, KindRegistry, Library, ScrapSummary};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// biblio-crawl: build an e-book library from the web
///
/// biblio-crawl walks a site from its seed pages, downloads the PDF and EPUB
/// files it links to into a local library directory, and renders book and
/// author reports from the files' embedded metadata.
#[derive(Parser, Debug)]
#[command(name = "biblio-crawl")]
#[command(version)]
#[command(about = "Build an e-book library from the web", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed URL to crawl instead of the configured seeds (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "reports_only")]
    dry_run: bool,

    /// Skip the crawl and render the configured reports from the library
    #[arg(long, conflicts_with = "dry_run")]
    reports_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if !cli.seeds.is_empty() {
        for seed in &cli.seeds {
            validate_seed_url(seed)?;
        }
        config.crawler.seeds = cli.seeds.clone();
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let registry = Arc::new(KindRegistry::standard());
    let mut library = Library::open(&config.library, registry)
        .with_context(|| format!("Cannot open library {}", config.library.directory.display()))?;

    if !cli.reports_only {
        handle_crawl(&config, &mut library).await?;
    }

    handle_reports(&config, &library)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("biblio_crawl=info,warn"),
            1 => EnvFilter::new("biblio_crawl=debug,info"),
            2 => EnvFilter::new("biblio_crawl=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== biblio-crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max documents per crawl: {}", config.crawler.max_documents);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    match config.crawler.crawl_deadline_secs {
        Some(secs) => println!("  Crawl deadline: {}s", secs),
        None => println!("  Crawl deadline: none"),
    }
    println!(
        "  Accept invalid certificates: {}",
        config.crawler.accept_invalid_certs
    );
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nLibrary:");
    println!("  Directory: {}", config.library.directory.display());
    println!("  Max size: {}", config.library.max_size);

    println!("\nReports:");
    for (name, target) in [
        ("Books", &config.report.books),
        ("Authors", &config.report.authors),
    ] {
        match target {
            Some(path) => println!("  {}: {}", name, path.display()),
            None => println!("  {}: not configured", name),
        }
    }

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation, one crawl per seed
async fn handle_crawl(config: &Config, library: &mut Library) -> anyhow::Result<()> {
    if config.crawler.seeds.is_empty() {
        bail!("No seed URL configured; add crawler.seeds or pass --seed");
    }

    let fetcher = HttpFetcher::new(&config.crawler).context("Failed to build HTTP client")?;
    let limits = config.crawler.limits();
    let mut total = ScrapSummary::default();

    for seed in &config.crawler.seeds {
        if library.is_full() {
            tracing::warn!(
                "Library is full ({} documents), skipping remaining seeds",
                library.max_size()
            );
            break;
        }

        let summary = match scrap(library, &fetcher, seed, limits).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("Crawl of {} failed: {}", seed, e);
                return Err(e.into());
            }
        };

        total.discovered += summary.discovered;
        total.stored += summary.stored;
        total.rejected += summary.rejected;
        total.failed += summary.failed;
    }

    tracing::info!(
        "All crawls complete: {} documents stored, {} rejected, {} failed, library holds {}",
        total.stored,
        total.rejected,
        total.failed,
        library.len()
    );

    Ok(())
}

/// Renders the configured reports
fn handle_reports(config: &Config, library: &Library) -> anyhow::Result<()> {
    if let Some(target) = &config.report.books {
        let renderer = renderer_for(target)?;
        library
            .generate_book_report(renderer.as_ref(), target)
            .with_context(|| format!("Failed to render book report {}", target.display()))?;
    }

    if let Some(target) = &config.report.authors {
        let renderer = renderer_for(target)?;
        library
            .generate_author_report(renderer.as_ref(), target)
            .with_context(|| format!("Failed to render author report {}", target.display()))?;
    }

    Ok(())
}
