use crate::metadata::{
    dedupe_preserving_order, dublin_core_fields, in_namespace, metadata_from_fields, parse_date,
    unescape_text, BookMetadata, MetadataError, MetadataReader,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::NsReader;
use regex::bytes::Regex;
use std::path::Path;
use std::sync::LazyLock;

const PDF_NS: &[u8] = b"http://ns.adobe.com/pdf/1.3/";

static XMP_PACKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s-u)<x:xmpmeta\b.*?</x:xmpmeta\s*>").expect("XMP packet regex is valid")
});

static INFO_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)/Info\s+(\d+)\s+(\d+)\s+R\b").expect("Info reference regex is valid")
});

/// Reads the metadata of a PDF file
///
/// The XMP packet is preferred; entries of the document Info dictionary
/// (`/Title`, `/Author`, `/Subject`, `/CreationDate`) fill whatever it lacks.
/// Only uncompressed metadata is visible, which covers the XMP stream of
/// conforming files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfReader;

impl MetadataReader for PdfReader {
    fn read(&self, path: &Path) -> Result<BookMetadata, MetadataError> {
        let bytes = std::fs::read(path)?;
        if !bytes.starts_with(b"%PDF") {
            return Err(MetadataError::Malformed(format!(
                "{} has no PDF header",
                path.display()
            )));
        }

        let mut metadata = match xmp_metadata(&bytes) {
            Ok(metadata) => metadata.unwrap_or_default(),
            Err(e) => {
                tracing::debug!("Ignoring XMP packet of {}: {}", path.display(), e);
                BookMetadata::default()
            }
        };
        merge_info_dictionary(&mut metadata, &bytes);
        Ok(metadata)
    }
}

/// Metadata from the last XMP packet (incremental updates append new ones)
fn xmp_metadata(bytes: &[u8]) -> Result<Option<BookMetadata>, MetadataError> {
    let Some(packet) = XMP_PACKET.find_iter(bytes).last() else {
        return Ok(None);
    };
    let xml = String::from_utf8_lossy(packet.as_bytes());
    let mut metadata = metadata_from_fields(&dublin_core_fields(&xml)?);

    if metadata.subjects.is_empty() {
        if let Some(keywords) = pdf_keywords(&xml)? {
            metadata.subjects = split_keywords(&keywords);
        }
    }

    Ok(Some(metadata))
}

/// `pdf:Keywords` of an XMP packet, written as an attribute or an element
fn pdf_keywords(xml: &str) -> Result<Option<String>, MetadataError> {
    let mut reader = NsReader::from_str(xml);
    let mut in_keywords = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                if let Some(keywords) = keywords_attribute(&reader, &element)? {
                    return Ok(Some(keywords));
                }
                let (ns, local) = reader.resolve_element(element.name());
                in_keywords = local.as_ref() == b"Keywords" && in_namespace(&ns, PDF_NS, b"pdf");
            }
            Event::Empty(element) => {
                if let Some(keywords) = keywords_attribute(&reader, &element)? {
                    return Ok(Some(keywords));
                }
            }
            Event::Text(text) if in_keywords => return Ok(Some(unescape_text(&text))),
            Event::End(_) => in_keywords = false,
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn keywords_attribute(
    reader: &NsReader<&[u8]>,
    element: &BytesStart,
) -> Result<Option<String>, MetadataError> {
    for attribute in element.attributes().flatten() {
        let (ns, local) = reader.resolve_attribute(attribute.key);
        if local.as_ref() == b"Keywords" && in_namespace(&ns, PDF_NS, b"pdf") {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn merge_info_dictionary(metadata: &mut BookMetadata, bytes: &[u8]) {
    let Some(entries) = info_dictionary(bytes) else {
        return;
    };

    for (key, value) in entries {
        if value.is_empty() {
            continue;
        }

        match key.as_slice() {
            b"Title" if metadata.title.is_none() => metadata.title = Some(value),
            b"Author" if metadata.authors.is_empty() => {
                metadata.authors = dedupe_preserving_order(
                    value
                        .split([';', ','])
                        .map(|a| a.trim().to_string())
                        .filter(|a| !a.is_empty())
                        .collect(),
                );
            }
            b"Subject" if metadata.subjects.is_empty() => metadata.subjects = vec![value],
            b"CreationDate" if metadata.date.is_none() => metadata.date = parse_date(&value),
            _ => {}
        }
    }
}

/// String entries of the document Info dictionary
///
/// The dictionary is the object named by the last `/Info N G R` reference,
/// which is the current one after incremental updates. When that object is
/// defined more than once, its last definition wins.
fn info_dictionary(bytes: &[u8]) -> Option<Vec<(Vec<u8>, String)>> {
    let reference = INFO_REFERENCE.captures_iter(bytes).last()?;
    let number = std::str::from_utf8(&reference[1]).ok()?;
    let generation = std::str::from_utf8(&reference[2]).ok()?;

    let header = Regex::new(&format!(
        r"(?-u)(?:\A|[^0-9]){number}\s+{generation}\s+obj\b"
    ))
    .ok()?;
    let start = header.find_iter(bytes).last()?.end();

    Lexer::new(&bytes[start..]).string_entries()
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    DictStart,
    DictEnd,
    ArrayStart,
    ArrayEnd,
    Name(Vec<u8>),
    /// Decoded literal or hexadecimal string
    Text(String),
    /// Numbers, keywords, operators
    Other,
}

/// Tokenizer for the object syntax of a PDF body
struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Top-level string values of the dictionary at the current position
    fn string_entries(&mut self) -> Option<Vec<(Vec<u8>, String)>> {
        if self.next_token()? != Token::DictStart {
            return None;
        }

        let mut entries = Vec::new();
        loop {
            match self.next_token()? {
                Token::DictEnd => return Some(entries),
                Token::Name(key) => match self.next_token()? {
                    Token::Text(value) => entries.push((key, value)),
                    Token::DictStart | Token::ArrayStart => self.skip_nested()?,
                    Token::DictEnd => return Some(entries),
                    _ => {}
                },
                Token::DictStart | Token::ArrayStart => self.skip_nested()?,
                // the `G R` of an indirect reference value
                _ => {}
            }
        }
    }

    /// Skips to the end of a dictionary or array whose start was just read
    fn skip_nested(&mut self) -> Option<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_token()? {
                Token::DictStart | Token::ArrayStart => depth += 1,
                Token::DictEnd | Token::ArrayEnd => depth -= 1,
                _ => {}
            }
        }
        Some(())
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();
        let byte = *self.bytes.get(self.pos)?;

        let token = match byte {
            b'<' if self.peek(1) == Some(b'<') => {
                self.pos += 2;
                Token::DictStart
            }
            b'>' if self.peek(1) == Some(b'>') => {
                self.pos += 2;
                Token::DictEnd
            }
            b'[' => {
                self.pos += 1;
                Token::ArrayStart
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b'(' => Token::Text(decode_text(&unescape_literal(&self.literal_string()))),
            b'<' => Token::Text(decode_text(&self.hex_string())),
            b'/' => {
                self.pos += 1;
                Token::Name(self.regular_run().to_vec())
            }
            _ => {
                if self.regular_run().is_empty() {
                    // stray delimiter
                    self.pos += 1;
                }
                Token::Other
            }
        };

        Some(token)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(byte) = self.peek(0) {
            if byte == b'%' {
                while self.peek(0).is_some_and(|b| b != b'\n' && b != b'\r') {
                    self.pos += 1;
                }
            } else if is_whitespace(byte) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Run of regular characters: a name body, a number or a keyword
    fn regular_run(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|b| !is_whitespace(b) && !is_delimiter(b))
        {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    /// Raw bytes of a literal string, escapes kept, outer parentheses removed
    ///
    /// Unescaped parentheses are legal when balanced, so nesting is tracked.
    fn literal_string(&mut self) -> Vec<u8> {
        self.pos += 1;
        let mut raw = Vec::new();
        let mut depth = 1usize;

        while let Some(byte) = self.peek(0) {
            self.pos += 1;
            match byte {
                b'\\' => {
                    raw.push(byte);
                    if let Some(escaped) = self.peek(0) {
                        raw.push(escaped);
                        self.pos += 1;
                    }
                }
                b'(' => {
                    depth += 1;
                    raw.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    raw.push(byte);
                }
                _ => raw.push(byte),
            }
        }

        raw
    }

    /// Bytes of a hexadecimal string; a missing final digit counts as 0
    fn hex_string(&mut self) -> Vec<u8> {
        self.pos += 1;
        let mut digits = Vec::new();

        while let Some(byte) = self.peek(0) {
            self.pos += 1;
            if byte == b'>' {
                break;
            }
            if let Some(digit) = (byte as char).to_digit(16) {
                digits.push(digit as u8);
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(0);
        }

        digits
            .chunks_exact(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect()
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn split_keywords(raw: &str) -> Vec<String> {
    dedupe_preserving_order(
        raw.split([',', ';'])
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    )
}

/// Resolves the escapes of a literal string body
///
/// Handles backslash and octal escapes; a backslash before a line break
/// continues the string on the next line.
fn unescape_literal(raw: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied().peekable();
    while let Some(byte) = iter.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        match iter.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0C),
            Some(b'\r') => {
                if iter.peek() == Some(&b'\n') {
                    iter.next();
                }
            }
            Some(b'\n') => {}
            Some(digit) if is_octal(digit) => {
                let mut code = u32::from(digit - b'0');
                for _ in 0..2 {
                    match iter.peek() {
                        Some(&next) if is_octal(next) => {
                            code = code * 8 + u32::from(next - b'0');
                            iter.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((code & 0xFF) as u8);
            }
            Some(other) => bytes.push(other),
            None => {}
        }
    }
    bytes
}

/// Decodes PDF text string bytes
///
/// UTF-16BE strings are marked with a byte order mark; other bytes are read
/// as UTF-8, falling back to Latin-1.
fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units).trim().to_string();
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim().to_string(),
        Err(_) => bytes
            .iter()
            .copied()
            .map(char::from)
            .collect::<String>()
            .trim()
            .to_string(),
    }
}

fn is_octal(byte: u8) -> bool {
    (b'0'..=b'7').contains(&byte)
}
