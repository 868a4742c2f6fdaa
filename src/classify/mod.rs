//! Document classification by MIME type
//!
//! This module maps `Content-Type` values to the document kinds the library
//! knows how to store, and tells the crawler whether a link is a page to
//! explore, a document to collect, or something to ignore.

mod registry;

pub use registry::{KindEntry, KindRegistry, KindRegistryBuilder};

use std::fmt;

/// MIME types treated as explorable HTML pages
const PAGE_MIME_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Format of a stored book file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    Pdf,
    Epub,
    /// No registered kind matched
    Unknown,
}

impl DocumentKind {
    /// Label used in reports ("PDF", "EPUB")
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Epub => "EPUB",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the crawler should do with a probed link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    /// A registered document kind: emit it
    Document(DocumentKind),
    /// An HTML page: explore it
    Page,
    /// Anything else
    Ignored,
}

/// Reduces a `Content-Type` header value to its lowercase MIME essence
///
/// `"Application/PDF; name=book.pdf"` becomes `"application/pdf"`.
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Returns true if the content type designates an HTML page
pub fn is_page(content_type: &str) -> bool {
    PAGE_MIME_TYPES.contains(&mime_essence(content_type).as_str())
}
