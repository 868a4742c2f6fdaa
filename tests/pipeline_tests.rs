//! End-to-end ingestion tests
//!
//! A wiremock site links to real EPUB and PDF files; the pipeline stores them
//! in a temporary library and the reports are rendered from their metadata.

use biblio_crawl::config::{CrawlerConfig, LibraryConfig};
use biblio_crawl::crawler::{CrawlLimits, HttpFetcher};
use biblio_crawl::report::MarkdownRenderer;
use biblio_crawl::{scrap, DocumentKind, KindRegistry, Library};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

fn epub(title: &str, authors: &[&str]) -> Vec<u8> {
    let creators: String = authors
        .iter()
        .map(|author| format!("<dc:creator>{author}</dc:creator>"))
        .collect();
    let package = format!(
        r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>{title}</dc:title>{creators}
  </metadata>
</package>"#
    );

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in [("META-INF/container.xml", CONTAINER), ("content.opf", package.as_str())] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn pdf(title: &str, author: &str) -> Vec<u8> {
    format!(
        "%PDF-1.4\n1 0 obj\n<< /Title ({title}) /Author ({author}) >>\nendobj\ntrailer\n<< /Info 1 0 R >>\n%%EOF\n"
    )
    .into_bytes()
}

fn crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        seeds: vec![],
        max_depth: 2,
        max_documents: 10,
        request_timeout_secs: 5,
        accept_invalid_certs: false,
        crawl_deadline_secs: None,
        user_agent: "biblio-crawl/test".to_string(),
    }
}

/// Mounts a file answering HEAD and GET; GET is expected `downloads` times
async fn mount_file(server: &MockServer, route: &str, content_type: &str, body: Vec<u8>, downloads: u64) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", content_type))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
        .expect(downloads)
        .mount(server)
        .await;
}

async fn mount_catalogue(server: &MockServer, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<li><a href="{link}" download>{link}</a></li>"#))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(format!("<html><body><ul>{anchors}</ul></body></html>"), "text/html"),
        )
        .mount(server)
        .await;
}

fn open_library(dir: &TempDir, max_size: usize) -> Library {
    let config = LibraryConfig {
        directory: dir.path().join("library"),
        max_size,
    };
    Library::open(&config, Arc::new(KindRegistry::standard())).unwrap()
}

#[tokio::test]
async fn test_scrap_into_library_and_report() {
    let server = MockServer::start().await;
    mount_catalogue(
        &server,
        &["/files/dumas.epub", "/mirror/dumas.epub", "/files/sand.pdf"],
    )
    .await;
    mount_file(
        &server,
        "/files/dumas.epub",
        "application/epub+zip",
        epub("Les Trois Mousquetaires", &["Alexandre Dumas", "Auguste Maquet"]),
        1,
    )
    .await;
    mount_file(
        &server,
        "/mirror/dumas.epub",
        "application/epub+zip",
        epub("Vingt ans après", &["Alexandre Dumas"]),
        1,
    )
    .await;
    mount_file(
        &server,
        "/files/sand.pdf",
        "application/pdf",
        pdf("La Mare au diable", "George Sand"),
        1,
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let mut library = open_library(&temp_dir, 10);
    let fetcher = HttpFetcher::new(&crawler_config()).unwrap();

    let summary = scrap(
        &mut library,
        &fetcher,
        &format!("{}/", server.uri()),
        CrawlLimits::new(2, 10),
    )
    .await
    .unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.stored, 3);
    assert_eq!(library.len(), 3);

    let root = temp_dir.path().join("library");
    assert!(root.join("dumas.epub").is_file());
    assert!(root.join("dumas_1.epub").is_file());
    assert!(root.join("sand.pdf").is_file());

    let books = library.book_report();
    let sand = books
        .books
        .iter()
        .find(|book| book.file_name == "sand.pdf")
        .unwrap();
    assert_eq!(sand.title, "La Mare au diable");
    assert_eq!(sand.kind, DocumentKind::Pdf);

    let authors = library.author_report();
    assert_eq!(authors.books_of("Alexandre Dumas").unwrap().len(), 2);
    assert_eq!(authors.books_of("Auguste Maquet").unwrap().len(), 1);
    assert_eq!(authors.books_of("George Sand").unwrap().len(), 1);

    let target = temp_dir.path().join("reports/authors.md");
    library
        .generate_author_report(&MarkdownRenderer, &target)
        .unwrap();
    let markdown = std::fs::read_to_string(target).unwrap();
    assert!(markdown.contains("## Alexandre Dumas"));
    assert!(markdown.contains("- Vingt ans après"));
}

#[tokio::test]
async fn test_full_library_skips_downloads() {
    let server = MockServer::start().await;
    mount_catalogue(&server, &["/a.pdf", "/b.pdf", "/c.pdf"]).await;
    mount_file(&server, "/a.pdf", "application/pdf", pdf("A", "Anon"), 1).await;
    mount_file(&server, "/b.pdf", "application/pdf", pdf("B", "Anon"), 0).await;
    mount_file(&server, "/c.pdf", "application/pdf", pdf("C", "Anon"), 0).await;

    let temp_dir = TempDir::new().unwrap();
    let mut library = open_library(&temp_dir, 1);
    let fetcher = HttpFetcher::new(&crawler_config()).unwrap();

    let summary = scrap(
        &mut library,
        &fetcher,
        &format!("{}/", server.uri()),
        CrawlLimits::new(2, 10),
    )
    .await
    .unwrap();

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.rejected, 2);
    assert_eq!(
        std::fs::read_dir(temp_dir.path().join("library")).unwrap().count(),
        1
    );
}

#[tokio::test]
async fn test_reopened_library_keeps_documents() {
    let server = MockServer::start().await;
    mount_catalogue(&server, &["/files/sand.pdf"]).await;
    mount_file(
        &server,
        "/files/sand.pdf",
        "application/pdf",
        pdf("Indiana", "George Sand"),
        2,
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let fetcher = HttpFetcher::new(&crawler_config()).unwrap();
    let seed = format!("{}/", server.uri());

    {
        let mut library = open_library(&temp_dir, 10);
        scrap(&mut library, &fetcher, &seed, CrawlLimits::new(1, 10))
            .await
            .unwrap();
    }

    let mut library = open_library(&temp_dir, 10);
    assert_eq!(library.len(), 1);
    assert_eq!(library.documents().next().unwrap().title(), "Indiana");

    // a second crawl stores the same book again under a fresh name
    scrap(&mut library, &fetcher, &seed, CrawlLimits::new(1, 10))
        .await
        .unwrap();
    assert_eq!(library.len(), 2);
    assert!(temp_dir.path().join("library/sand_1.pdf").is_file());
}
