//! ZIP export of the materialized site.

use std::io::{Cursor, Write};

use thiserror::Error;
use zip::{CompressionMethod, ZipWriter, result::ZipError, write::SimpleFileOptions};

/// Name offered to the browser for the download
pub const ARCHIVE_NAME: &str = "website.zip";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Deflate every `(relative path, bytes)` pair into an in-memory archive.
pub fn build_zip(files: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (name, bytes) in files {
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;

    #[test]
    fn test_archive_reads_back() {
        let bytes = build_zip(vec![
            ("index.html".to_string(), b"<h1>Hi</h1>\n".to_vec()),
            ("static/js/app.js".to_string(), b"let a = 1;\n".to_vec()),
            ("empty.txt".to_string(), Vec::new()),
        ])
        .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["empty.txt", "index.html", "static/js/app.js"]);

        let mut content = String::new();
        archive
            .by_name("static/js/app.js")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "let a = 1;\n");
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let bytes = build_zip(Vec::new()).unwrap();
        assert_eq!(ZipArchive::new(Cursor::new(bytes)).unwrap().len(), 0);
    }
}
