use crate::metadata::{
    dublin_core_fields, metadata_from_fields, BookMetadata, MetadataError, MetadataReader,
};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Location of the container document in every EPUB
const CONTAINER_PATH: &str = "META-INF/container.xml";

const CONTAINER_NS: &[u8] = b"urn:oasis:names:tc:opendocument:xmlns:container";

/// Reads the OPF package metadata of an EPUB archive
///
/// `META-INF/container.xml` names the package document; its `<metadata>`
/// block holds the Dublin Core elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpubReader;

impl MetadataReader for EpubReader {
    fn read(&self, path: &Path) -> Result<BookMetadata, MetadataError> {
        let mut archive = ZipArchive::new(File::open(path)?)?;

        let container = read_entry(&mut archive, CONTAINER_PATH)?;
        let package_path = rootfile_path(&container)?.ok_or_else(|| {
            MetadataError::Malformed(format!("{CONTAINER_PATH} names no rootfile"))
        })?;
        let package = read_entry(&mut archive, &package_path)?;

        Ok(metadata_from_fields(&dublin_core_fields(&package)?))
    }
}

/// Extracts the package document path from `container.xml`
///
/// The first `rootfile` with a `full-path` wins. Container files that forget
/// their namespace are accepted.
pub(crate) fn rootfile_path(container: &str) -> Result<Option<String>, MetadataError> {
    let mut reader = NsReader::from_str(container);

    loop {
        let element = match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) => element,
            Event::Eof => return Ok(None),
            _ => continue,
        };

        let (ns, local) = reader.resolve_element(element.name());
        let in_container = match &ns {
            ResolveResult::Bound(Namespace(bound)) => *bound == CONTAINER_NS,
            ResolveResult::Unbound => true,
            ResolveResult::Unknown(_) => false,
        };
        if local.as_ref() != b"rootfile" || !in_container {
            continue;
        }

        for attribute in element.attributes().flatten() {
            if attribute.key.as_ref() == b"full-path" {
                let value = attribute.unescape_value()?;
                let path = value.trim().trim_start_matches('/');
                if !path.is_empty() {
                    return Ok(Some(path.to_string()));
                }
            }
        }
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, MetadataError> {
    let mut entry = archive.by_name(name)?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title id="title">Vingt mille lieues sous les mers</dc:title>
    <dc:creator id="creator">Jules Verne</dc:creator>
    <dc:subject>Adventure</dc:subject>
    <dc:subject>Science fiction</dc:subject>
    <dc:language>fr</dc:language>
    <dc:date>1870-06-20</dc:date>
  </metadata>
</package>"#;

    fn write_epub(dir: &TempDir, entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.path().join("book.epub");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn test_rootfile_path() {
        assert_eq!(
            rootfile_path(CONTAINER).unwrap().as_deref(),
            Some("OEBPS/content.opf")
        );
        assert_eq!(rootfile_path("<container/>").unwrap(), None);
    }

    #[test]
    fn test_rootfile_path_with_prefix_and_entities() {
        let container = r#"<c:container xmlns:c="urn:oasis:names:tc:opendocument:xmlns:container">
  <c:rootfiles>
    <c:rootfile full-path="/Text &amp; Notes/package.opf"></c:rootfile>
  </c:rootfiles>
</c:container>"#;
        assert_eq!(
            rootfile_path(container).unwrap().as_deref(),
            Some("Text & Notes/package.opf")
        );
    }

    #[test]
    fn test_read_epub_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_epub(
            &dir,
            &[
                ("mimetype", "application/epub+zip"),
                (CONTAINER_PATH, CONTAINER),
                ("OEBPS/content.opf", PACKAGE),
            ],
        );

        let metadata = EpubReader.read(&path).unwrap();

        assert_eq!(
            metadata.title.as_deref(),
            Some("Vingt mille lieues sous les mers")
        );
        assert_eq!(metadata.authors, vec!["Jules Verne"]);
        assert_eq!(metadata.subjects, vec!["Adventure", "Science fiction"]);
        assert_eq!(metadata.language.as_deref(), Some("fr"));
        assert_eq!(
            metadata.date,
            chrono::NaiveDate::from_ymd_opt(1870, 6, 20)
        );
    }

    #[test]
    fn test_missing_package_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_epub(&dir, &[(CONTAINER_PATH, CONTAINER)]);
        assert!(matches!(
            EpubReader.read(&path),
            Err(MetadataError::Zip(_))
        ));
    }

    #[test]
    fn test_not_a_zip_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.epub");
        std::fs::write(&path, b"not a zip archive").unwrap();
        assert!(EpubReader.read(&path).is_err());
    }
}
