//! biblio-crawl: a small e-book library fed by a bounded web crawler
//!
//! This crate crawls a site from a seed URL, recognises PDF and EPUB download
//! links by their MIME type, stores the files in a flat directory under
//! collision-free names, and renders book and author reports from the
//! documents' embedded metadata.

pub mod classify;
pub mod config;
pub mod crawler;
pub mod library;
pub mod metadata;
pub mod pipeline;
pub mod report;

use thiserror::Error;

/// Main error type for biblio-crawl operations
#[derive(Debug, Error)]
pub enum BiblioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] library::StorageError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedDocumentError),

    #[error("Report error: {0}")]
    Report(#[from] report::ReportError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while requesting a page, a probe or a document body.
///
/// These never abort a crawl: the crawler logs them and abandons the branch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    /// The URL whose request failed
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Connect { url, .. }
            | Self::Request { url, .. } => url,
        }
    }
}

/// A document kind was required for a MIME type (or kind) with no registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported document type: {0}")]
pub struct UnsupportedDocumentError(pub String);

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),
}

/// Result type alias for biblio-crawl operations
pub type Result<T> = std::result::Result<T, BiblioError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use classify::{DocumentKind, KindRegistry, LinkClass};
pub use config::Config;
pub use crawler::{CrawlLimits, Crawler, DiscoveredDocument, Fetcher, HttpFetcher};
pub use library::{Added, Document, Library};
pub use pipeline::{scrap, ScrapSummary};
