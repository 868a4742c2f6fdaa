//! Ingestion pipeline: crawl a site and store the documents it links to

use crate::crawler::{parse_http_url, CrawlLimits, Crawler, Fetcher};
use crate::library::{filename_from_url, Library};
use crate::Result;
use std::time::Instant;

/// Counters of one [`scrap`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapSummary {
    /// Document links emitted by the crawler
    pub discovered: usize,

    /// Documents written to the library
    pub stored: usize,

    /// Documents not stored because the library was full
    pub rejected: usize,

    /// Documents whose download failed
    pub failed: usize,
}

/// Crawls from `seed_url` and adds every document found to `library`
///
/// Download failures, empty bodies included, are logged and counted; storage
/// errors abort the run.
/// Once the library is full the remaining documents are counted as rejected
/// without being downloaded.
///
/// # Example
///
/// ```no_run
/// use biblio_crawl::config::load_config;
/// use biblio_crawl::{scrap, HttpFetcher, KindRegistry, Library};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn run() -> biblio_crawl::Result<()> {
/// let config = load_config(Path::new("biblio.toml"))?;
/// let mut library = Library::open(&config.library, Arc::new(KindRegistry::standard()))?;
/// let fetcher = HttpFetcher::new(&config.crawler)?;
///
/// let summary = scrap(
///     &mut library,
///     &fetcher,
///     "https://example.org/books/",
///     config.crawler.limits(),
/// )
/// .await?;
/// println!("{} new books", summary.stored);
/// # Ok(())
/// # }
/// ```
pub async fn scrap<F: Fetcher + ?Sized>(
    library: &mut Library,
    fetcher: &F,
    seed_url: &str,
    limits: CrawlLimits,
) -> Result<ScrapSummary> {
    parse_http_url(seed_url)?;

    let registry = library.registry().clone();
    let mut crawler = Crawler::new(fetcher, &registry, seed_url, limits);
    let mut summary = ScrapSummary::default();
    let start_time = Instant::now();

    while let Some(found) = crawler.next_document().await {
        summary.discovered += 1;

        if library.is_full() {
            summary.rejected += 1;
            tracing::debug!("Library full, skipping download of {}", found.url);
            continue;
        }

        let response = match fetcher.get(&found.url).await {
            Ok(response) => response,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!("Download failed: {}", e);
                continue;
            }
        };

        if response.body.is_empty() {
            summary.failed += 1;
            tracing::warn!(
                "Download of {} returned no content (HTTP {})",
                found.url,
                response.status_code
            );
            continue;
        }
        tracing::debug!(
            "Downloaded {} (HTTP {}, {} bytes)",
            found.url,
            response.status_code,
            response.body.len()
        );

        let extension = registry.entry(found.kind)?.extension.clone();
        let name = filename_from_url(&found.url, &extension);

        let added = library.add(&response.body, &name, found.kind)?;
        if added.inserted {
            summary.stored += 1;
        } else {
            summary.rejected += 1;
        }
    }

    let stats = crawler.stats();
    tracing::info!(
        "Scrap of {} finished in {:.1}s: {} discovered, {} stored, {} rejected, {} failed ({} pages, {} probes)",
        seed_url,
        start_time.elapsed().as_secs_f64(),
        summary.discovered,
        summary.stored,
        summary.rejected,
        summary.failed,
        stats.pages_fetched,
        stats.links_probed
    );

    Ok(summary)
}
