//! Markdown formatting of library reports

use crate::report::{AuthorReport, BookReport};

/// Formats the book report as markdown
///
/// One section per book, titled by its file name, listing the title, the
/// author(s) and the document type.
pub fn format_book_report(report: &BookReport) -> String {
    let mut md = String::new();

    md.push_str("# Book report\n\n");
    md.push_str(&format!("{} books in the library.\n\n", report.books.len()));

    for book in &report.books {
        md.push_str(&format!("## {}\n\n", book.file_name));
        md.push_str(&format!("- **Title**: {}\n", book.title));
        if book.authors.is_empty() {
            md.push_str("- **Author(s)**: unknown\n");
        } else {
            md.push_str(&format!("- **Author(s)**: {}\n", book.authors.join(", ")));
        }
        md.push_str(&format!("- **Type**: {}\n\n", book.kind.label()));
    }

    md
}

/// Formats the author report as markdown
///
/// One section per author with a nested list of their books.
pub fn format_author_report(report: &AuthorReport) -> String {
    let mut md = String::new();

    md.push_str("# Author report\n\n");
    md.push_str(&format!(
        "{} authors in the library.\n\n",
        report.authors.len()
    ));

    for (author, books) in &report.authors {
        md.push_str(&format!("## {}\n\n", author));
        for book in books {
            md.push_str(&format!("- {}\n", book.title));
            md.push_str(&format!("  - **Type**: {}\n", book.kind.label()));
            md.push_str(&format!("  - **File**: {}\n", book.file_name));
        }
        md.push('\n');
    }

    md
}
