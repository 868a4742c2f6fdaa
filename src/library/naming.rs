//! Filenames for stored documents
//!
//! Derives safe filenames from document URLs and finds collision-free paths
//! inside the flat library directory.

use super::{StorageError, StorageResult};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Longest stem kept in a stored filename, in bytes
///
/// Leaves room for a `_N` collision suffix and the extension within the
/// 255-byte name limit of common filesystems.
const MAX_STEM_BYTES: usize = 200;

/// Longer trailing `.xxx` parts are not treated as an extension
const MAX_EXTENSION_BYTES: usize = 16;

/// Creates `dir` (with parents) when absent
///
/// Fails with [`StorageError::NotADirectory`] if something else already
/// lives at that path.
pub fn ensure_directory(dir: &Path) -> StorageResult<()> {
    if dir.exists() {
        if dir.is_dir() {
            return Ok(());
        }
        return Err(StorageError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    std::fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    tracing::info!("Created library directory {}", dir.display());
    Ok(())
}

/// Names of the entries currently in `dir`
pub(crate) fn directory_snapshot(dir: &Path) -> StorageResult<HashSet<OsString>> {
    let read_error = |source: std::io::Error| StorageError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = HashSet::new();
    for entry in std::fs::read_dir(dir).map_err(read_error)? {
        names.insert(entry.map_err(read_error)?.file_name());
    }
    Ok(names)
}

/// First free path among `name.ext`, `name_1.ext`, `name_2.ext`, ...
///
/// `taken` is the snapshot of names to avoid; the filesystem is not consulted
/// again while searching.
pub fn unique_path_in(dir: &Path, candidate: &str, taken: &HashSet<OsString>) -> PathBuf {
    let filename = sanitize_filename(candidate);
    if !taken.contains(&OsString::from(&filename)) {
        return dir.join(filename);
    }

    let (stem, ext) = split_extension(&filename);
    let mut counter = 1usize;
    loop {
        let name = format!("{stem}_{counter}{ext}");
        if !taken.contains(&OsString::from(&name)) {
            return dir.join(name);
        }
        counter += 1;
    }
}

/// Splits `name.ext` into (`name`, `.ext`); dotfiles have no extension
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => filename.split_at(pos),
        _ => (filename, ""),
    }
}

/// Replaces characters that are invalid on common filesystems
///
/// Path separators, `: * ? " < > |` and control characters become `_`.
/// A name that would still be a `.`/`..` component has its dots replaced too.
/// Overlong names keep the first 200 bytes of their stem and their extension.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    let is_special = Path::new(&sanitized).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });

    if is_special {
        sanitized.replace('.', "_")
    } else {
        truncate_filename(&sanitized)
    }
}

/// Cuts the stem of `filename` on a char boundary, keeping its extension
fn truncate_filename(filename: &str) -> String {
    let (stem, ext) = match split_extension(filename) {
        (stem, ext) if ext.len() <= MAX_EXTENSION_BYTES => (stem, ext),
        _ => (filename, ""),
    };
    if stem.len() <= MAX_STEM_BYTES {
        return filename.to_string();
    }

    let mut end = MAX_STEM_BYTES;
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{ext}", &stem[..end])
}

/// Filename for a document downloaded from `url`
///
/// Uses the last path segment, percent-decoded and sanitised. Without a usable
/// segment the name is `document.<extension>`. The extension is appended when
/// the segment does not already end with it.
pub fn filename_from_url(url: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');

    let segment = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|segment| match urlencoding::decode(&segment) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => segment,
        })
        .map(|segment| sanitize_filename(&segment))
        .filter(|segment| !segment.trim_matches('_').is_empty());

    let Some(name) = segment else {
        return format!("document.{extension}");
    };

    let has_extension = Path::new(&name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

    if has_extension || extension.is_empty() {
        name
    } else {
        format!("{name}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn taken(names: &[&str]) -> HashSet<OsString> {
        names.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_ensure_directory_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("a/b/library");

        ensure_directory(&dir).unwrap();
        assert!(dir.is_dir());
        // already present is fine
        ensure_directory(&dir).unwrap();
    }

    #[test]
    fn test_ensure_directory_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("library");
        std::fs::write(&file, b"not a directory").unwrap();

        assert!(matches!(
            ensure_directory(&file),
            Err(StorageError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_unique_path_without_conflict() {
        let dir = Path::new("/library");
        assert_eq!(
            unique_path_in(dir, "hugo.epub", &taken(&[])),
            dir.join("hugo.epub")
        );
    }

    #[test]
    fn test_unique_path_with_conflicts() {
        let dir = Path::new("/library");
        assert_eq!(
            unique_path_in(dir, "hugo.epub", &taken(&["hugo.epub"])),
            dir.join("hugo_1.epub")
        );
        assert_eq!(
            unique_path_in(
                dir,
                "hugo.epub",
                &taken(&["hugo.epub", "hugo_1.epub", "hugo_2.epub"])
            ),
            dir.join("hugo_3.epub")
        );
    }

    #[test]
    fn test_unique_path_without_extension() {
        let dir = Path::new("/library");
        assert_eq!(
            unique_path_in(dir, "README", &taken(&["README"])),
            dir.join("README_1")
        );
        assert_eq!(
            unique_path_in(dir, ".hidden", &taken(&[".hidden"])),
            dir.join(".hidden_1")
        );
    }

    #[test]
    fn test_directory_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.pdf"), b"1").unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let names = directory_snapshot(temp_dir.path()).unwrap();
        assert_eq!(names, taken(&["a.pdf", "sub"]));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("file/name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("a:b*c?.epub"), "a_b_c_.epub");
        assert_eq!(sanitize_filename("Les Misérables.epub"), "Les Misérables.epub");
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename(""), "_");
    }

    #[test]
    fn test_sanitize_filename_truncates_long_names() {
        let long = format!("{}.pdf", "x".repeat(300));
        let name = sanitize_filename(&long);
        assert_eq!(name, format!("{}.pdf", "x".repeat(MAX_STEM_BYTES)));

        // é is two bytes; the cut must not split it
        let accented = format!("{}.epub", "é".repeat(150));
        let name = sanitize_filename(&accented);
        assert!(name.ends_with("é.epub"));
        assert!(name.len() <= MAX_STEM_BYTES + ".epub".len());

        let no_extension = "y".repeat(300);
        assert_eq!(sanitize_filename(&no_extension).len(), MAX_STEM_BYTES);
    }

    #[test]
    fn test_long_url_segment_fits_with_suffix() {
        let url = format!("https://example.org/{}.pdf", "x".repeat(300));
        let name = filename_from_url(&url, "pdf");
        assert!(name.len() < 255);

        let dir = Path::new("/library");
        let path = unique_path_in(dir, &name, &taken(&[name.as_str()]));
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.ends_with("_1.pdf"));
        assert!(file_name.len() < 255);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.org/files/verne.pdf", "pdf"),
            "verne.pdf"
        );
        assert_eq!(
            filename_from_url("https://example.org/files/Le%20Rouge%20et%20le%20Noir.epub", "epub"),
            "Le Rouge et le Noir.epub"
        );
        assert_eq!(
            filename_from_url("https://example.org/download?id=42", "epub"),
            "download.epub"
        );
        assert_eq!(
            filename_from_url("https://example.org/files/VERNE.PDF", "pdf"),
            "VERNE.PDF"
        );
    }

    #[test]
    fn test_filename_from_url_fallback() {
        assert_eq!(
            filename_from_url("https://example.org/", "pdf"),
            "document.pdf"
        );
        assert_eq!(filename_from_url("not a url", "epub"), "document.epub");
    }

    #[test]
    fn test_filename_from_url_decoded_separator_is_sanitized() {
        assert_eq!(
            filename_from_url("https://example.org/a%2F..%2Fb.pdf", "pdf"),
            "a_.._b.pdf"
        );
    }
}
