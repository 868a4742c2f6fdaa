//! HTML parser for extracting links
//!
//! This module handles parsing fetched pages to extract:
//! - Anchor links to probe (resolved to absolute URLs)
//! - The page title, for logging

use crate::{UrlError, UrlResult};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Anchor targets in document order (absolute URLs, duplicates removed)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts its anchor links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document, including those carrying
///   a `download` attribute (book sites use it on file links)
///
/// **Exclude:**
/// - anchors without `href`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - fragment-only links (same page anchors)
/// - anything that is not HTTP(S) once resolved
///
/// No normalisation is applied beyond resolution: `/books` and `/books/` stay
/// distinct URLs.
///
/// # Example
///
/// ```
/// use biblio_crawl::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Shelf</title></head><body><a href="book.pdf">Book</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/shelf/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Shelf".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/shelf/book.pdf"]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Convenience function for extracting just the links from HTML
pub fn parse_links(html: &str, base_url: &Url) -> Vec<String> {
    parse_html(html, base_url).links
}

/// Parses an absolute HTTP(S) URL, as required for seeds
pub fn parse_http_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(format!("{url_str}: {e}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    Ok(url)
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all valid anchor links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                if seen.insert(absolute_url.clone()) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
