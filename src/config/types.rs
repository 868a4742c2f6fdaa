use crate::crawler::CrawlLimits;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Main configuration structure for biblio-crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub library: LibraryConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Pages each crawl starts from
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Maximum number of page hops from the seed
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of documents emitted by one crawl
    #[serde(rename = "max-documents")]
    pub max_documents: usize,

    /// Timeout applied to every GET and HEAD request
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Skip TLS certificate verification (misconfigured sites)
    #[serde(rename = "accept-invalid-certs", default)]
    pub accept_invalid_certs: bool,

    /// Overall time allowed for one crawl
    #[serde(rename = "crawl-deadline-secs", default)]
    pub crawl_deadline_secs: Option<u64>,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Limits applied to each crawl started from this configuration
    pub fn limits(&self) -> CrawlLimits {
        CrawlLimits {
            max_depth: self.max_depth,
            max_documents: self.max_documents,
            deadline: self.crawl_deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Content store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// Flat directory holding the book files
    pub directory: PathBuf,

    /// Maximum number of documents the library accepts
    #[serde(rename = "max-size")]
    pub max_size: usize,
}

/// Report targets; the file suffix selects the output format
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Book report destination (e.g. `reports/books.pdf`)
    #[serde(default)]
    pub books: Option<PathBuf>,

    /// Author report destination (e.g. `reports/authors.md`)
    #[serde(default)]
    pub authors: Option<PathBuf>,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    format!("biblio-crawl/{}", env!("CARGO_PKG_VERSION"))
}
