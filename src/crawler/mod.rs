//! Crawler module for discovering document links
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`Fetcher`] seam
//! - HTML parsing and link extraction
//! - The bounded depth-first walk producing [`DiscoveredDocument`]s

mod fetcher;
mod parser;
mod walker;

pub use fetcher::{build_http_client, FetchedPage, Fetcher, HttpFetcher};
pub use parser::{parse_html, parse_http_url, parse_links, ParsedPage};
pub use walker::{
    crawl_documents, CrawlBudget, CrawlLimits, CrawlStats, CrawlTarget, Crawler,
    DiscoveredDocument,
};
