//! Bounded depth-first crawl
//!
//! The walk keeps an explicit stack of page frames instead of recursing. Each
//! frame holds the links of one fetched page that have not been looked at yet;
//! descending into a page pushes a frame, exhausting one pops it. The order in
//! which links are probed is therefore exactly the recursive pre-order.
//!
//! Every request is awaited before the next one is issued, and the caller
//! pulls documents one at a time with [`Crawler::next_document`].

use crate::classify::{KindRegistry, LinkClass};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::parse_html;
use crate::DocumentKind;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use url::Url;

/// A URL and the number of page hops from the seed it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    pub depth: u32,
}

/// A document link found by the crawler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDocument {
    pub url: String,
    pub kind: DocumentKind,
    pub depth: u32,
}

/// Bounds of one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Links further than this many hops from the seed are never requested
    pub max_depth: u32,

    /// The crawl stops as soon as this many documents were emitted
    pub max_documents: usize,

    /// Optional wall-clock limit for the whole crawl
    pub deadline: Option<Duration>,
}

impl CrawlLimits {
    pub fn new(max_depth: u32, max_documents: usize) -> Self {
        Self {
            max_depth,
            max_documents,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Document counter and limits, owned by one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBudget {
    pub found: usize,
    pub max_depth: u32,
    pub max_documents: usize,
}

impl CrawlBudget {
    fn new(limits: &CrawlLimits) -> Self {
        Self {
            found: 0,
            max_depth: limits.max_depth,
            max_documents: limits.max_documents,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.found >= self.max_documents
    }
}

/// Request counters of one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub links_probed: usize,
    pub probes_failed: usize,
}

#[derive(Debug)]
struct PageFrame {
    depth: u32,
    links: VecDeque<String>,
}

/// Pull-based crawl from a single seed
///
/// ```no_run
/// use biblio_crawl::crawler::{CrawlLimits, Crawler, HttpFetcher};
/// use biblio_crawl::config::load_config;
/// use biblio_crawl::KindRegistry;
/// use std::path::Path;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("biblio.toml"))?;
/// let fetcher = HttpFetcher::new(&config.crawler)?;
/// let registry = KindRegistry::standard();
///
/// let mut crawler = Crawler::new(
///     &fetcher,
///     &registry,
///     "https://example.org/books/",
///     CrawlLimits::new(2, 10),
/// );
/// while let Some(document) = crawler.next_document().await {
///     println!("{} ({})", document.url, document.kind);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Crawler<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    registry: &'a KindRegistry,
    budget: CrawlBudget,
    visited: HashSet<String>,
    frames: Vec<PageFrame>,
    pending: Option<CrawlTarget>,
    deadline: Option<Instant>,
    finished: bool,
    stats: CrawlStats,
}

impl<'a, F: Fetcher + ?Sized> Crawler<'a, F> {
    pub fn new(
        fetcher: &'a F,
        registry: &'a KindRegistry,
        seed_url: impl Into<String>,
        limits: CrawlLimits,
    ) -> Self {
        let seed = CrawlTarget {
            url: seed_url.into(),
            depth: 0,
        };

        let mut visited = HashSet::new();
        visited.insert(seed.url.clone());

        Self {
            fetcher,
            registry,
            budget: CrawlBudget::new(&limits),
            visited,
            frames: Vec::new(),
            finished: limits.max_documents == 0,
            pending: Some(seed),
            deadline: limits.deadline.map(|d| Instant::now() + d),
            stats: CrawlStats::default(),
        }
    }

    /// Advances the crawl until the next document link, or `None` once the
    /// crawl is over
    ///
    /// After `None` is returned every further call returns `None` without
    /// issuing a request.
    pub async fn next_document(&mut self) -> Option<DiscoveredDocument> {
        loop {
            if self.finished {
                return None;
            }

            if self.deadline_passed() {
                tracing::warn!(
                    "Crawl deadline reached after {} documents, stopping",
                    self.budget.found
                );
                self.finish();
                return None;
            }

            if let Some(seed) = self.pending.take() {
                tracing::info!(
                    "Starting crawl at {} (max depth {}, max documents {})",
                    seed.url,
                    self.budget.max_depth,
                    self.budget.max_documents
                );
                self.enter_page(seed).await;
                continue;
            }

            let Some(frame) = self.frames.last_mut() else {
                self.finished = true;
                tracing::info!(
                    "Crawl complete: {} documents, {} pages fetched, {} links probed",
                    self.budget.found,
                    self.stats.pages_fetched,
                    self.stats.links_probed
                );
                return None;
            };

            let depth = frame.depth + 1;
            let Some(link) = frame.links.pop_front() else {
                self.frames.pop();
                continue;
            };

            if self.visited.contains(&link) {
                tracing::trace!("Already visited: {}", link);
                continue;
            }

            match self.probe(&link).await {
                LinkClass::Document(kind) => {
                    self.budget.found += 1;
                    tracing::debug!("Found {} document at depth {}: {}", kind, depth, link);

                    if self.budget.exhausted() {
                        tracing::info!(
                            "Document limit of {} reached, stopping crawl",
                            self.budget.max_documents
                        );
                        self.finish();
                    }

                    return Some(DiscoveredDocument {
                        url: link,
                        kind,
                        depth,
                    });
                }
                LinkClass::Page => self.enter_page(CrawlTarget { url: link, depth }).await,
                LinkClass::Ignored => tracing::trace!("Ignoring {}", link),
            }
        }
    }

    /// Drains the crawl into a vector
    pub async fn collect_documents(mut self) -> Vec<DiscoveredDocument> {
        let mut documents = Vec::new();
        while let Some(document) = self.next_document().await {
            documents.push(document);
        }
        documents
    }

    pub fn budget(&self) -> &CrawlBudget {
        &self.budget
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Whether `url` was requested (or is the seed) during this crawl
    pub fn visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetches a page and pushes a frame with its links
    ///
    /// The target must already be marked visited. A page at the depth limit
    /// is not fetched: its links would all be out of bounds.
    async fn enter_page(&mut self, target: CrawlTarget) {
        if target.depth >= self.budget.max_depth {
            tracing::debug!("Depth limit reached at {}, not fetching", target.url);
            return;
        }

        let page = match self.fetcher.get(&target.url).await {
            Ok(page) => page,
            Err(e) => {
                self.stats.pages_failed += 1;
                tracing::warn!("Abandoning branch at {}: {}", target.url, e);
                return;
            }
        };
        self.stats.pages_fetched += 1;

        if self.registry.classify_link(page.content_type.as_deref()) != LinkClass::Page {
            tracing::debug!(
                "{} is not an HTML page ({}), dead end",
                target.url,
                page.content_type.as_deref().unwrap_or("no content type")
            );
            return;
        }

        let base_url = match Url::parse(&page.final_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot resolve links of {}: {}", page.final_url, e);
                return;
            }
        };

        let parsed = parse_html(&page.text(), &base_url);
        tracing::debug!(
            "Fetched {} at depth {} ({}): {} links",
            target.url,
            target.depth,
            parsed.title.as_deref().unwrap_or("untitled"),
            parsed.links.len()
        );

        self.frames.push(PageFrame {
            depth: target.depth,
            links: parsed.links.into(),
        });
    }

    /// Marks `link` visited and classifies it from its probed content type
    async fn probe(&mut self, link: &str) -> LinkClass {
        self.visited.insert(link.to_string());
        self.stats.links_probed += 1;

        match self.fetcher.probe(link).await {
            Ok(content_type) => self.registry.classify_link(content_type.as_deref()),
            Err(e) => {
                self.stats.probes_failed += 1;
                tracing::warn!("Probe failed, ignoring link: {}", e);
                LinkClass::Ignored
            }
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Ends the crawl, dropping all pending exploration
    fn finish(&mut self) {
        self.finished = true;
        self.frames.clear();
        self.pending = None;
    }
}

/// Runs a whole crawl and returns every document it found
pub async fn crawl_documents<F: Fetcher + ?Sized>(
    fetcher: &F,
    registry: &KindRegistry,
    seed_url: &str,
    limits: CrawlLimits,
) -> Vec<DiscoveredDocument> {
    Crawler::new(fetcher, registry, seed_url, limits)
        .collect_documents()
        .await
}
