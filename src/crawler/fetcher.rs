//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building the HTTP client (user agent, timeout, TLS verification)
//! - GET requests for pages and document bodies
//! - HEAD requests probing a link's Content-Type
//! - Error classification into [`FetchError`]

use crate::config::CrawlerConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::sync::Once;

static INSECURE_TLS_WARNING: Once = Once::new();

/// Body and headers of a successful GET
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code (2xx; other statuses are a [`FetchError::Status`])
    pub status_code: u16,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Raw body
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Body decoded as text, replacing invalid UTF-8 sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network access used by the crawler and the ingestion pipeline
///
/// Implementations must treat non-2xx statuses as [`FetchError::Status`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the full content at `url`
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Lightweight probe returning the Content-Type of `url`, if any
    async fn probe(&self, url: &str) -> Result<Option<String>, FetchError>;
}

/// [`Fetcher`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;
        let response = check_status(url, response)?;

        let final_url = response.url().to_string();
        let status_code = response.status().as_u16();
        let content_type = content_type(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?
            .to_vec();

        Ok(FetchedPage {
            final_url,
            status_code,
            content_type,
            body,
        })
    }

    async fn probe(&self, url: &str) -> Result<Option<String>, FetchError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;
        let response = check_status(url, response)?;

        Ok(content_type(&response))
    }
}

/// Builds an HTTP client from the crawler configuration
///
/// Every request gets the configured timeout. With `accept-invalid-certs`
/// certificate verification is disabled; the associated warning is logged
/// once per process.
///
/// # Example
///
/// ```no_run
/// use biblio_crawl::config::load_config;
/// use biblio_crawl::crawler::build_http_client;
/// use std::path::Path;
///
/// let config = load_config(Path::new("biblio.toml")).unwrap();
/// let client = build_http_client(&config.crawler).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    if config.accept_invalid_certs {
        INSECURE_TLS_WARNING.call_once(|| {
            tracing::warn!("TLS certificate verification is disabled for all requests");
        });
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout())
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

fn check_status(url: &str, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Maps a reqwest error onto the crawler's error taxonomy
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else if let Some(status) = error.status() {
        FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
