//! Helpers for the relative file paths that flow between the AI response, the
//! output directory and the preview routes.

use std::path::{Path, PathBuf};

/// Normalize a relative file path coming from untrusted input.
///
/// Returns `None` for empty paths, absolute paths, Windows drive prefixes,
/// `..` segments and segments containing anything other than ASCII
/// alphanumerics, `_`, `-` and `.`.
pub fn normalize_relative(raw: &str) -> Option<String> {
    let raw = raw.trim().replace('\\', "/");
    if raw.is_empty() || raw.starts_with('/') {
        return None;
    }
    if raw.len() >= 2 && raw.as_bytes()[1] == b':' {
        return None;
    }

    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.chars().all(|c| c == '.') => return None,
            s if s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) =>
            {
                segments.push(s)
            }
            _ => return None,
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Join a normalized relative path onto `root`.
pub fn join_relative(root: &Path, relative: &str) -> Option<PathBuf> {
    let normalized = normalize_relative(relative)?;
    Some(
        normalized
            .split('/')
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment)),
    )
}

/// Lowercased extension of the final segment, if any.
pub fn extension(relative: &str) -> Option<String> {
    let name = file_name(relative);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Final segment of a `/` separated relative path.
pub fn file_name(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}
