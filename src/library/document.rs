use crate::classify::DocumentKind;
use crate::metadata::{BookMetadata, MetadataReader};
use chrono::NaiveDate;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// One book file in the library
///
/// The embedded metadata is read on first access and cached; clones share the
/// cache. Equality and hashing only consider the path, which is unique within
/// a library.
#[derive(Clone)]
pub struct Document {
    path: PathBuf,
    kind: DocumentKind,
    reader: Arc<dyn MetadataReader>,
    metadata: Arc<OnceLock<BookMetadata>>,
}

impl Document {
    pub(crate) fn new(path: PathBuf, kind: DocumentKind, reader: Arc<dyn MetadataReader>) -> Self {
        Self {
            path,
            kind,
            reader,
            metadata: Arc::new(OnceLock::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Name of the backing file within the library directory
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Embedded metadata; an unreadable file yields empty metadata
    pub fn metadata(&self) -> &BookMetadata {
        self.metadata.get_or_init(|| match self.reader.read(&self.path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(
                    "Could not read metadata of {}, using fallbacks: {}",
                    self.path.display(),
                    e
                );
                BookMetadata::default()
            }
        })
    }

    /// Embedded title, or the file stem when the file has none
    pub fn title(&self) -> String {
        match &self.metadata().title {
            Some(title) => title.clone(),
            None => self
                .path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    pub fn authors(&self) -> &[String] {
        &self.metadata().authors
    }

    pub fn subjects(&self) -> &[String] {
        &self.metadata().subjects
    }

    pub fn language(&self) -> Option<&str> {
        self.metadata().language.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.metadata().date
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("metadata", &self.metadata.get())
            .finish()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingReader {
        reads: AtomicUsize,
        fail: bool,
    }

    impl MetadataReader for CountingReader {
        fn read(&self, _path: &Path) -> Result<BookMetadata, MetadataError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MetadataError::Malformed("truncated".to_string()));
            }
            Ok(BookMetadata {
                title: Some("Vingt mille lieues sous les mers".to_string()),
                authors: vec!["Jules Verne".to_string()],
                ..BookMetadata::default()
            })
        }
    }

    #[test]
    fn test_metadata_is_read_once() {
        let reader = Arc::new(CountingReader::default());
        let document = Document::new(
            PathBuf::from("/library/verne.epub"),
            DocumentKind::Epub,
            reader.clone(),
        );
        let copy = document.clone();

        assert_eq!(document.title(), "Vingt mille lieues sous les mers");
        assert_eq!(copy.authors(), ["Jules Verne".to_string()]);
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unreadable_metadata_falls_back_to_stem() {
        let reader = Arc::new(CountingReader {
            fail: true,
            ..CountingReader::default()
        });
        let document = Document::new(
            PathBuf::from("/library/notre-dame.pdf"),
            DocumentKind::Pdf,
            reader,
        );

        assert_eq!(document.title(), "notre-dame");
        assert!(document.authors().is_empty());
        assert_eq!(document.file_name(), "notre-dame.pdf");
    }

    #[test]
    fn test_equality_is_by_path() {
        let reader: Arc<dyn MetadataReader> = Arc::new(CountingReader::default());
        let a = Document::new(PathBuf::from("/l/a.pdf"), DocumentKind::Pdf, reader.clone());
        let b = Document::new(PathBuf::from("/l/a.pdf"), DocumentKind::Epub, reader.clone());
        let c = Document::new(PathBuf::from("/l/c.pdf"), DocumentKind::Pdf, reader);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
