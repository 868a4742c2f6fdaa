//! Book and author reports
//!
//! Reports are always produced as Markdown first. A [`ReportRenderer`] then
//! writes that Markdown to the target file, converting it when the target's
//! suffix asks for another format.

mod markdown;
mod render;

pub use markdown::{format_author_report, format_book_report};
pub use render::{renderer_for, MarkdownRenderer, PandocRenderer, ReportRenderer};

use crate::classify::DocumentKind;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Group name for documents without any author
pub const UNKNOWN_AUTHOR: &str = "Unknown author";

/// Errors that can occur while rendering a report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pandoc is required to render {} but was not found in PATH", .target.display())]
    PandocMissing { target: PathBuf },

    #[error("pandoc exited with {status}: {stderr}")]
    Pandoc { status: String, stderr: String },
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// One row of the book report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookEntry {
    pub title: String,
    pub authors: Vec<String>,
    pub kind: DocumentKind,
    pub file_name: String,
}

/// Every document of a library, ordered by file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookReport {
    pub books: Vec<BookEntry>,
}

/// A book listed under one author
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AuthorBook {
    pub title: String,
    pub kind: DocumentKind,
    pub file_name: String,
}

/// Books grouped by author name
///
/// A book with several authors is listed under each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorReport {
    pub authors: BTreeMap<String, Vec<AuthorBook>>,
}

impl AuthorReport {
    pub fn add(&mut self, author: &str, book: AuthorBook) {
        self.authors.entry(author.to_string()).or_default().push(book);
    }

    /// Books of one author, if any
    pub fn books_of(&self, author: &str) -> Option<&[AuthorBook]> {
        self.authors.get(author).map(Vec::as_slice)
    }
}
