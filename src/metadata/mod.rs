//! Embedded metadata extraction for stored books
//!
//! Each document kind registers a [`MetadataReader`]. Both formats describe
//! books with Dublin Core elements (`dc:title`, `dc:creator`, ...): EPUB in its
//! OPF package document, PDF in its XMP packet. The shared helpers here pull
//! those elements out of the XML text.

mod epub;
mod pdf;

pub use epub::EpubReader;
pub use pdf::PdfReader;

use chrono::{DateTime, NaiveDate};
use quick_xml::events::{BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::fmt;
use std::path::Path;
use thiserror::Error;

const DUBLIN_CORE_NS: &[u8] = b"http://purl.org/dc/elements/1.1/";
const RDF_NS: &[u8] = b"http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Dublin Core elements read into [`BookMetadata`]
const DUBLIN_CORE_ELEMENTS: [&str; 5] = ["title", "creator", "subject", "language", "date"];

/// Errors that can occur while reading a book's metadata
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// Descriptive metadata of a book
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: Option<String>,

    /// Authors in document order, without duplicates
    pub authors: Vec<String>,

    pub subjects: Vec<String>,

    pub language: Option<String>,

    pub date: Option<NaiveDate>,
}

/// Extracts [`BookMetadata`] from a stored file of one document kind
pub trait MetadataReader: Send + Sync + fmt::Debug {
    fn read(&self, path: &Path) -> Result<BookMetadata, MetadataError>;
}

/// One Dublin Core element occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DcField {
    pub name: String,
    pub values: Vec<String>,
}

/// Finds every Dublin Core element in an XML text
///
/// Elements are matched by namespace, whatever prefix the document binds to
/// it; an undeclared `dc:` prefix is accepted as well. Elements wrapping an
/// RDF container (`<rdf:Seq><rdf:li>...`) yield one value per list item;
/// plain elements yield their text.
pub(crate) fn dublin_core_fields(xml: &str) -> Result<Vec<DcField>, MetadataError> {
    let mut reader = NsReader::from_str(xml);
    let mut fields = Vec::new();
    let mut open: Option<OpenField> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let (ns, local) = reader.resolve_element(start.name());
                match open.as_mut() {
                    Some(field) => {
                        field.depth += 1;
                        if is_rdf_item(&ns, local.as_ref()) {
                            field.item = Some(String::new());
                        } else {
                            field.push_text(" ");
                        }
                    }
                    None => {
                        if in_namespace(&ns, DUBLIN_CORE_NS, b"dc") {
                            let name = String::from_utf8_lossy(local.as_ref()).to_ascii_lowercase();
                            if DUBLIN_CORE_ELEMENTS.contains(&name.as_str()) {
                                open = Some(OpenField::new(name));
                            }
                        }
                    }
                }
            }
            Event::End(end) => {
                let Some(mut field) = open.take() else {
                    continue;
                };
                if field.depth == 0 {
                    fields.push(field.finish());
                    continue;
                }

                field.depth -= 1;
                let (ns, local) = reader.resolve_element(end.name());
                if is_rdf_item(&ns, local.as_ref()) {
                    field.close_item();
                } else {
                    field.push_text(" ");
                }
                open = Some(field);
            }
            Event::Text(text) => {
                if let Some(field) = open.as_mut() {
                    field.push_text(&unescape_text(&text));
                }
            }
            Event::CData(cdata) => {
                if let Some(field) = open.as_mut() {
                    field.push_text(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fields)
}

/// A Dublin Core element whose end tag has not been read yet
struct OpenField {
    name: String,
    /// Nesting below the element itself
    depth: usize,
    text: String,
    item: Option<String>,
    items: Vec<String>,
}

impl OpenField {
    fn new(name: String) -> Self {
        Self {
            name,
            depth: 0,
            text: String::new(),
            item: None,
            items: Vec::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.item.as_mut() {
            Some(item) => item.push_str(text),
            None => self.text.push_str(text),
        }
    }

    fn close_item(&mut self) {
        if let Some(item) = self.item.take() {
            self.items.push(item);
        }
    }

    fn finish(self) -> DcField {
        let values = if self.items.is_empty() {
            vec![self.text]
        } else {
            self.items
        };

        DcField {
            name: self.name,
            values: values
                .iter()
                .map(String::as_str)
                .map(collapse_whitespace)
                .filter(|value| !value.is_empty())
                .collect(),
        }
    }
}

/// Whether a resolved name belongs to `namespace`
///
/// A prefix the document never declared counts when it is the conventional
/// one for that namespace.
pub(crate) fn in_namespace(resolved: &ResolveResult, namespace: &[u8], prefix: &[u8]) -> bool {
    match resolved {
        ResolveResult::Bound(Namespace(bound)) => *bound == namespace,
        ResolveResult::Unknown(unknown) => unknown.as_slice() == prefix,
        ResolveResult::Unbound => false,
    }
}

fn is_rdf_item(resolved: &ResolveResult, local_name: &[u8]) -> bool {
    local_name == b"li" && in_namespace(resolved, RDF_NS, b"rdf")
}

/// Text content with entity and character references decoded
///
/// Entities XML does not predefine are kept verbatim.
pub(crate) fn unescape_text(text: &BytesText) -> String {
    match text.unescape() {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => String::from_utf8_lossy(text).into_owned(),
    }
}

/// Builds metadata from Dublin Core fields, first occurrence winning for
/// single-valued elements
pub(crate) fn metadata_from_fields(fields: &[DcField]) -> BookMetadata {
    let first = |name: &str| {
        fields
            .iter()
            .filter(|f| f.name == name)
            .flat_map(|f| f.values.iter())
            .next()
            .cloned()
    };
    let all = |name: &str| {
        dedupe_preserving_order(
            fields
                .iter()
                .filter(|f| f.name == name)
                .flat_map(|f| f.values.iter().cloned())
                .collect(),
        )
    };

    BookMetadata {
        title: first("title"),
        authors: all("creator"),
        subjects: all("subject"),
        language: first("language"),
        date: first("date").as_deref().and_then(parse_date),
    }
}

/// Parses the date formats found in book metadata
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD`, `YYYY-MM`, a bare year, and PDF
/// date strings (`D:YYYYMMDD...`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.date_naive());
    }
    // also covers timestamps without an offset
    if let Some(Ok(date)) = raw.get(0..10).map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d")) {
        return Some(date);
    }
    if let Some(digits) = raw.strip_prefix("D:") {
        let digits: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
        return date_from_digits(&digits);
    }
    if let Some((year, month)) = raw.split_once('-') {
        if let (Ok(year), Ok(month)) = (year.parse(), month.parse()) {
            return NaiveDate::from_ymd_opt(year, month, 1);
        }
    }
    if raw.len() == 4 {
        return raw
            .parse()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }

    None
}

fn date_from_digits(digits: &str) -> Option<NaiveDate> {
    let year = digits.get(0..4)?.parse().ok()?;
    let month = digits.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(1);
    let day = digits.get(6..8).and_then(|d| d.parse().ok()).unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Removes duplicates, keeping the first occurrence of each value
pub(crate) fn dedupe_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dublin_core_plain_elements() {
        let xml = r#"
            <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
                <dc:title>Les Misérables</dc:title>
                <dc:creator opf:role="aut">Victor Hugo</dc:creator>
                <dc:language>fr</dc:language>
            </metadata>
        "#;
        let fields = dublin_core_fields(xml).unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].name, "title");
        assert_eq!(fields[0].values, vec!["Les Misérables"]);
        assert_eq!(fields[1].values, vec!["Victor Hugo"]);
    }

    #[test]
    fn test_dublin_core_rdf_lists() {
        let xml = r#"
            <dc:creator><rdf:Seq><rdf:li>Ada Lovelace</rdf:li><rdf:li>Charles Babbage</rdf:li></rdf:Seq></dc:creator>
            <dc:title><rdf:Alt><rdf:li xml:lang="x-default">Notes &amp; Sketches</rdf:li></rdf:Alt></dc:title>
        "#;
        let metadata = metadata_from_fields(&dublin_core_fields(xml).unwrap());

        assert_eq!(metadata.authors, vec!["Ada Lovelace", "Charles Babbage"]);
        assert_eq!(metadata.title.as_deref(), Some("Notes & Sketches"));
    }

    #[test]
    fn test_self_closing_element_is_skipped() {
        let xml = "<dc:title/><dc:creator>Someone</dc:creator>";
        let metadata = metadata_from_fields(&dublin_core_fields(xml).unwrap());
        assert_eq!(metadata.authors, vec!["Someone"]);
    }

    #[test]
    fn test_metadata_from_fields_dedupes_authors() {
        let xml = "<dc:creator>A</dc:creator><dc:creator>B</dc:creator><dc:creator>A</dc:creator>";
        let metadata = metadata_from_fields(&dublin_core_fields(xml).unwrap());
        assert_eq!(metadata.authors, vec!["A", "B"]);
    }

    #[test]
    fn test_character_references_are_decoded() {
        let xml = "<dc:title>Les Mis&#233;rables</dc:title><dc:creator>Victor Hugo &#x26; co</dc:creator>";
        let metadata = metadata_from_fields(&dublin_core_fields(xml).unwrap());

        assert_eq!(metadata.title.as_deref(), Some("Les Misérables"));
        assert_eq!(metadata.authors, vec!["Victor Hugo & co"]);
    }

    #[test]
    fn test_cdata_is_taken_literally() {
        let xml = "<dc:title><![CDATA[Tom & Jerry <Annotated>]]></dc:title>";
        let metadata = metadata_from_fields(&dublin_core_fields(xml).unwrap());
        assert_eq!(metadata.title.as_deref(), Some("Tom & Jerry <Annotated>"));
    }

    #[test]
    fn test_elements_matched_by_namespace() {
        let xml = r#"
            <metadata xmlns:purl="http://purl.org/dc/elements/1.1/" xmlns:other="urn:other">
                <purl:title>Candide</purl:title>
                <other:title>Not a book title</other:title>
                <purl:creator>Voltaire</purl:creator>
            </metadata>
        "#;
        let fields = dublin_core_fields(xml).unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].values, vec!["Candide"]);
        assert_eq!(fields[1].name, "creator");
    }

    #[test]
    fn test_nested_markup_is_flattened() {
        let xml = "<dc:title>Notes <i>on</i>\n  the Analytical Engine</dc:title>";
        let metadata = metadata_from_fields(&dublin_core_fields(xml).unwrap());
        assert_eq!(
            metadata.title.as_deref(),
            Some("Notes on the Analytical Engine")
        );
    }

    #[test]
    fn test_mismatched_tags_are_an_error() {
        let xml = "<dc:title>Broken</dc:creator>";
        assert!(matches!(
            dublin_core_fields(xml),
            Err(MetadataError::Xml(_))
        ));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 14);
        assert_eq!(parse_date("2021-03-14"), expected);
        assert_eq!(parse_date("2021-03-14T10:00:00Z"), expected);
        assert_eq!(parse_date("2021-03-14T10:00:00+02:00"), expected);
        assert_eq!(parse_date("D:20210314120000Z"), expected);
        assert_eq!(parse_date("2021-03"), NaiveDate::from_ymd_opt(2021, 3, 1));
        assert_eq!(parse_date("1862"), NaiveDate::from_ymd_opt(1862, 1, 1));
        assert_eq!(parse_date("sometime"), None);
    }
}
