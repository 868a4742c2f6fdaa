//! Content store
//!
//! A [`Library`] is a flat directory of book files plus an in-memory index of
//! the [`Document`]s it holds. The index never grows beyond the configured
//! maximum size: once full, further additions are rejected silently and
//! reported through [`Added::inserted`].

mod document;
mod naming;

pub use document::Document;
pub use naming::{ensure_directory, filename_from_url, sanitize_filename, unique_path_in};

use crate::classify::{DocumentKind, KindRegistry};
use crate::config::LibraryConfig;
use crate::report::{
    format_author_report, format_book_report, AuthorBook, AuthorReport, BookEntry, BookReport,
    ReportRenderer, ReportResult, UNKNOWN_AUTHOR,
};
use naming::directory_snapshot;
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the content store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{} exists and is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for content store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of [`Library::add`]
#[derive(Debug, Clone)]
pub struct Added {
    /// The stored document, or the one that would have been stored
    pub document: Document,

    /// `false` when the library was already full and nothing was written
    pub inserted: bool,
}

/// Book files in one directory, indexed by path
#[derive(Debug)]
pub struct Library {
    root: PathBuf,
    max_size: usize,
    registry: Arc<KindRegistry>,
    documents: BTreeMap<PathBuf, Document>,
    /// Names handed out by `unique_path`, taken even before a file exists
    reserved: HashSet<OsString>,
}

impl Library {
    /// Creates an empty library over `root`, creating the directory if needed
    pub fn new(
        root: impl Into<PathBuf>,
        max_size: usize,
        registry: Arc<KindRegistry>,
    ) -> StorageResult<Self> {
        let root = root.into();
        ensure_directory(&root)?;

        Ok(Self {
            root,
            max_size,
            registry,
            documents: BTreeMap::new(),
            reserved: HashSet::new(),
        })
    }

    /// Opens the configured library and indexes the book files already there
    ///
    /// Regular files whose extension belongs to a registered kind are indexed
    /// in name order until the library is full; everything else is left
    /// alone.
    pub fn open(config: &LibraryConfig, registry: Arc<KindRegistry>) -> StorageResult<Self> {
        let mut library = Self::new(&config.directory, config.max_size, registry)?;
        library.reindex()?;
        Ok(library)
    }

    fn reindex(&mut self) -> StorageResult<()> {
        let read_error = |source: std::io::Error| StorageError::ReadDir {
            path: self.root.clone(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut skipped = 0usize;
        for path in paths {
            let Some(kind) = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| self.registry.kind_for_extension(ext))
            else {
                continue;
            };

            if self.is_full() {
                skipped += 1;
                continue;
            }

            if let Ok(entry) = self.registry.entry(kind) {
                let document = Document::new(path.clone(), kind, entry.reader.clone());
                self.documents.insert(path, document);
            }
        }

        tracing::info!(
            "Indexed {} documents in {}",
            self.documents.len(),
            self.root.display()
        );
        if skipped > 0 {
            tracing::warn!(
                "{} book files left out of the index: library is limited to {} documents",
                skipped,
                self.max_size
            );
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn registry(&self) -> &Arc<KindRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.documents.len() >= self.max_size
    }

    /// Documents in path order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    /// Path for `candidate` that collides with no file in the directory
    ///
    /// The returned name is reserved: asking again for the same candidate
    /// yields the next numeric suffix even if nothing was written meanwhile.
    pub fn unique_path(&mut self, candidate: &str) -> StorageResult<PathBuf> {
        let path = self.free_path(candidate)?;
        if let Some(name) = path.file_name() {
            self.reserved.insert(name.to_os_string());
        }
        Ok(path)
    }

    fn free_path(&self, candidate: &str) -> StorageResult<PathBuf> {
        let mut taken = directory_snapshot(&self.root)?;
        taken.extend(self.reserved.iter().cloned());
        Ok(unique_path_in(&self.root, candidate, &taken))
    }

    /// Stores `bytes` as a new document of `kind`
    ///
    /// When the library is full nothing is written and the returned
    /// [`Added`] has `inserted == false`. Fails with
    /// [`UnsupportedDocumentError`](crate::UnsupportedDocumentError) for
    /// `Unknown` or unregistered kinds and with [`StorageError`] when the
    /// file cannot be written.
    pub fn add(
        &mut self,
        bytes: &[u8],
        suggested_name: &str,
        kind: DocumentKind,
    ) -> crate::Result<Added> {
        let reader = self.registry.entry(kind)?.reader.clone();

        if self.is_full() {
            let path = self.free_path(suggested_name)?;
            tracing::debug!(
                "Library full ({} documents), not storing {}",
                self.max_size,
                suggested_name
            );
            return Ok(Added {
                document: Document::new(path, kind, reader),
                inserted: false,
            });
        }

        let path = self.unique_path(suggested_name)?;
        if let Err(source) = std::fs::write(&path, bytes) {
            if let Some(name) = path.file_name() {
                self.reserved.remove(name);
            }
            return Err(StorageError::Write { path, source }.into());
        }

        let document = Document::new(path.clone(), kind, reader);
        self.documents.insert(path, document.clone());
        tracing::info!(
            "Stored {} ({}, {} bytes)",
            document.path().display(),
            kind,
            bytes.len()
        );

        Ok(Added {
            document,
            inserted: true,
        })
    }

    /// Removes a document from the index, optionally deleting its file
    ///
    /// Returns `false` when the document was not in the library.
    pub fn remove(&mut self, document: &Document, delete_file: bool) -> StorageResult<bool> {
        let path = document.path();
        if !self.documents.contains_key(path) {
            return Ok(false);
        }

        if delete_file {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StorageError::Remove {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
            if let Some(name) = path.file_name() {
                self.reserved.remove(name);
            }
        }

        self.documents.remove(path);
        tracing::info!("Removed {} from the library", path.display());
        Ok(true)
    }

    /// Title, authors and type of every document
    pub fn book_report(&self) -> BookReport {
        BookReport {
            books: self
                .documents()
                .map(|document| BookEntry {
                    title: document.title(),
                    authors: document.authors().to_vec(),
                    kind: document.kind(),
                    file_name: document.file_name(),
                })
                .collect(),
        }
    }

    /// Documents grouped by author; authorless ones under [`UNKNOWN_AUTHOR`]
    pub fn author_report(&self) -> AuthorReport {
        let mut report = AuthorReport::default();

        for document in self.documents() {
            let book = AuthorBook {
                title: document.title(),
                kind: document.kind(),
                file_name: document.file_name(),
            };

            match document.authors() {
                [] => report.add(UNKNOWN_AUTHOR, book),
                authors => {
                    for author in authors {
                        report.add(author, book.clone());
                    }
                }
            }
        }

        report
    }

    /// Renders the book report into `target`
    pub fn generate_book_report(
        &self,
        renderer: &dyn ReportRenderer,
        target: &Path,
    ) -> ReportResult<PathBuf> {
        let markdown = format_book_report(&self.book_report());
        let path = renderer.render(&markdown, target)?;
        tracing::info!("Book report written to {}", path.display());
        Ok(path)
    }

    /// Renders the author report into `target`
    pub fn generate_author_report(
        &self,
        renderer: &dyn ReportRenderer,
        target: &Path,
    ) -> ReportResult<PathBuf> {
        let markdown = format_author_report(&self.author_report());
        let path = renderer.render(&markdown, target)?;
        tracing::info!("Author report written to {}", path.display());
        Ok(path)
    }
}
