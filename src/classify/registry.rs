use crate::classify::{is_page, mime_essence, DocumentKind, LinkClass};
use crate::metadata::{EpubReader, MetadataReader, PdfReader};
use crate::UnsupportedDocumentError;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything registered for one document kind
#[derive(Debug, Clone)]
pub struct KindEntry {
    /// File suffix without the dot (`pdf`, `epub`)
    pub extension: String,

    /// Reader used to extract the embedded metadata of stored files
    pub reader: Arc<dyn MetadataReader>,
}

/// Immutable MIME type → document kind mapping
///
/// Built once through [`KindRegistryBuilder`] and shared by the crawler and
/// the library. Adding a format means registering a kind and its MIME types;
/// nothing else in the crate changes.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    by_mime: HashMap<String, DocumentKind>,
    by_kind: HashMap<DocumentKind, KindEntry>,
}

impl KindRegistry {
    pub fn builder() -> KindRegistryBuilder {
        KindRegistryBuilder::default()
    }

    /// The PDF and EPUB registrations
    pub fn standard() -> Self {
        Self {
            by_mime: HashMap::from([
                ("application/pdf".to_string(), DocumentKind::Pdf),
                ("application/x-pdf".to_string(), DocumentKind::Pdf),
                ("application/epub+zip".to_string(), DocumentKind::Epub),
            ]),
            by_kind: HashMap::from([
                (
                    DocumentKind::Pdf,
                    KindEntry {
                        extension: "pdf".to_string(),
                        reader: Arc::new(PdfReader),
                    },
                ),
                (
                    DocumentKind::Epub,
                    KindEntry {
                        extension: "epub".to_string(),
                        reader: Arc::new(EpubReader),
                    },
                ),
            ]),
        }
    }

    /// Maps a `Content-Type` value to a document kind
    ///
    /// Parameters are ignored and the comparison is case-insensitive.
    /// Anything unregistered yields [`DocumentKind::Unknown`].
    pub fn classify(&self, content_type: &str) -> DocumentKind {
        self.by_mime
            .get(&mime_essence(content_type))
            .copied()
            .unwrap_or(DocumentKind::Unknown)
    }

    /// Decides what the crawler does with a link given its probed content type
    pub fn classify_link(&self, content_type: Option<&str>) -> LinkClass {
        let Some(content_type) = content_type else {
            return LinkClass::Ignored;
        };

        match self.classify(content_type) {
            DocumentKind::Unknown if is_page(content_type) => LinkClass::Page,
            DocumentKind::Unknown => LinkClass::Ignored,
            kind => LinkClass::Document(kind),
        }
    }

    /// Like [`classify`](Self::classify) but fails on unregistered MIME types
    pub fn resolve(&self, mime_type: &str) -> Result<DocumentKind, UnsupportedDocumentError> {
        match self.classify(mime_type) {
            DocumentKind::Unknown => Err(UnsupportedDocumentError(mime_type.to_string())),
            kind => Ok(kind),
        }
    }

    /// Registration for a kind, required wherever a document is constructed
    pub fn entry(&self, kind: DocumentKind) -> Result<&KindEntry, UnsupportedDocumentError> {
        self.by_kind
            .get(&kind)
            .ok_or_else(|| UnsupportedDocumentError(kind.to_string()))
    }

    /// Kind registered for a file extension, used when re-indexing a directory
    pub fn kind_for_extension(&self, extension: &str) -> Option<DocumentKind> {
        self.by_kind
            .iter()
            .find(|(_, entry)| entry.extension.eq_ignore_ascii_case(extension))
            .map(|(kind, _)| *kind)
    }

    /// All registered (MIME type, kind) pairs
    pub fn mime_types(&self) -> impl Iterator<Item = (&str, DocumentKind)> {
        self.by_mime.iter().map(|(mime, kind)| (mime.as_str(), *kind))
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Collects registrations before freezing them into a [`KindRegistry`]
#[derive(Debug, Default)]
pub struct KindRegistryBuilder {
    by_mime: HashMap<String, DocumentKind>,
    by_kind: HashMap<DocumentKind, KindEntry>,
}

impl KindRegistryBuilder {
    /// Registers a document kind with its file extension and metadata reader
    pub fn kind(
        mut self,
        kind: DocumentKind,
        extension: &str,
        reader: Arc<dyn MetadataReader>,
    ) -> Self {
        self.by_kind.insert(
            kind,
            KindEntry {
                extension: extension.trim_start_matches('.').to_ascii_lowercase(),
                reader,
            },
        );
        self
    }

    /// Maps a MIME type to an already (or later) registered kind
    pub fn mime(mut self, mime_type: &str, kind: DocumentKind) -> Self {
        self.by_mime.insert(mime_essence(mime_type), kind);
        self
    }

    /// Freezes the registrations
    ///
    /// Fails if a MIME type points at `Unknown` or at a kind that was never
    /// registered with [`kind`](Self::kind).
    pub fn build(self) -> Result<KindRegistry, UnsupportedDocumentError> {
        for (mime, kind) in &self.by_mime {
            if !kind.is_known() || !self.by_kind.contains_key(kind) {
                return Err(UnsupportedDocumentError(format!("{mime} -> {kind}")));
            }
        }

        Ok(KindRegistry {
            by_mime: self.by_mime,
            by_kind: self.by_kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_mime_classifies_to_its_kind() {
        let registry = KindRegistry::standard();
        for (mime, kind) in registry.mime_types() {
            assert_eq!(registry.classify(mime), kind, "mime {mime}");
        }
    }

    #[test]
    fn test_unregistered_types_are_unknown() {
        let registry = KindRegistry::standard();
        for content_type in ["text/html", "text/plain", "image/png", "", "pdf"] {
            assert_eq!(registry.classify(content_type), DocumentKind::Unknown);
        }
    }

    #[test]
    fn test_classify_ignores_parameters_and_case() {
        let registry = KindRegistry::standard();
        assert_eq!(
            registry.classify("Application/PDF; charset=binary"),
            DocumentKind::Pdf
        );
        assert_eq!(
            registry.classify("application/epub+zip"),
            DocumentKind::Epub
        );
    }

    #[test]
    fn test_classify_link() {
        let registry = KindRegistry::standard();
        assert_eq!(
            registry.classify_link(Some("application/pdf")),
            LinkClass::Document(DocumentKind::Pdf)
        );
        assert_eq!(
            registry.classify_link(Some("text/html; charset=utf-8")),
            LinkClass::Page
        );
        assert_eq!(registry.classify_link(Some("image/jpeg")), LinkClass::Ignored);
        assert_eq!(registry.classify_link(None), LinkClass::Ignored);
    }

    #[test]
    fn test_resolve_unregistered_mime_fails() {
        let registry = KindRegistry::standard();
        assert_eq!(registry.resolve("application/pdf"), Ok(DocumentKind::Pdf));
        assert_eq!(
            registry.resolve("application/msword"),
            Err(UnsupportedDocumentError("application/msword".to_string()))
        );
    }

    #[test]
    fn test_entry_for_unknown_kind_fails() {
        let registry = KindRegistry::standard();
        assert!(registry.entry(DocumentKind::Pdf).is_ok());
        assert!(registry.entry(DocumentKind::Unknown).is_err());
    }

    #[test]
    fn test_kind_for_extension() {
        let registry = KindRegistry::standard();
        assert_eq!(registry.kind_for_extension("pdf"), Some(DocumentKind::Pdf));
        assert_eq!(registry.kind_for_extension("EPUB"), Some(DocumentKind::Epub));
        assert_eq!(registry.kind_for_extension("txt"), None);
    }

    #[test]
    fn test_builder_registers_extra_mime() {
        let registry = KindRegistry::builder()
            .kind(DocumentKind::Pdf, ".PDF", Arc::new(PdfReader))
            .mime("application/acrobat", DocumentKind::Pdf)
            .build()
            .unwrap();

        assert_eq!(registry.classify("application/acrobat"), DocumentKind::Pdf);
        assert_eq!(registry.classify("application/pdf"), DocumentKind::Unknown);
        assert_eq!(registry.kind_for_extension("pdf"), Some(DocumentKind::Pdf));
    }

    #[test]
    fn test_builder_rejects_mime_without_kind() {
        let result = KindRegistry::builder()
            .mime("application/epub+zip", DocumentKind::Epub)
            .build();
        assert!(result.is_err());

        let result = KindRegistry::builder()
            .mime("application/octet-stream", DocumentKind::Unknown)
            .build();
        assert!(result.is_err());
    }
}
