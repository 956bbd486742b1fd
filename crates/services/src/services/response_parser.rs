//! Extracts named files from the model's free-form answer.
//!
//! The answer is scanned line by line. A file block is a marker line naming
//! the file, optionally followed by blank lines, followed by a fenced code
//! block. Accepted markers:
//!
//! ```text
//! **index.html**:        **`index.html`**       **index.html:**
//! --- style.css ---
//! ## app.py              ### File: `templates/index.html`
//! File: schema.sql
//! ```
//!
//! A fence opens with three or more backticks (an info string is ignored) and
//! closes with a line of at least as many backticks. A fence that never closes
//! runs to the end of the answer. Any other non-blank line between a marker
//! and a fence detaches the marker. Duplicate names keep the last block.
//!
//! When no labeled block exists at all, unlabeled fences are classified by
//! content (HTML document, stylesheet, script).

use db::models::project::FileMapping;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};
use utils::path;

use super::backend_detection::ProjectKind;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("the AI response did not contain any recognizable file blocks")]
    MalformedResponse,
    #[error("the AI response is missing required files: {}", missing.join(", "))]
    IncompleteGeneration { missing: Vec<String> },
}

/// How a required file is recognized in the mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// A file with exactly this name, in any directory
    FileName(&'static str),
    /// Any file with this extension
    Extension(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredFile {
    /// Name reported as missing and suggested to the model
    pub name: &'static str,
    pub purpose: &'static str,
    pub rule: Rule,
}

impl RequiredFile {
    fn is_satisfied_by(&self, files: &FileMapping) -> bool {
        files.iter().any(|(name, _)| match self.rule {
            Rule::FileName(expected) => path::file_name(name) == expected,
            Rule::Extension(ext) => path::extension(name).as_deref() == Some(ext),
        })
    }
}

const STATIC_FILES: [RequiredFile; 2] = [
    RequiredFile {
        name: "index.html",
        purpose: "HTML entry page",
        rule: Rule::FileName("index.html"),
    },
    RequiredFile {
        name: "style.css",
        purpose: "stylesheet",
        rule: Rule::Extension("css"),
    },
];

const FULL_STACK_FILES: [RequiredFile; 5] = [
    STATIC_FILES[0],
    STATIC_FILES[1],
    RequiredFile {
        name: "app.py",
        purpose: "Flask backend entry point exposing the REST API",
        rule: Rule::FileName("app.py"),
    },
    RequiredFile {
        name: "database.py",
        purpose: "MySQL connection and query helpers",
        rule: Rule::FileName("database.py"),
    },
    RequiredFile {
        name: "schema.sql",
        purpose: "MySQL schema with CREATE TABLE statements",
        rule: Rule::FileName("schema.sql"),
    },
];

pub fn required_files(kind: ProjectKind) -> &'static [RequiredFile] {
    match kind {
        ProjectKind::Static => &STATIC_FILES,
        ProjectKind::FullStack => &FULL_STACK_FILES,
    }
}

/// Names of required files the mapping does not provide, in declaration order
pub fn missing_files(files: &FileMapping, kind: ProjectKind) -> Vec<String> {
    required_files(kind)
        .iter()
        .filter(|req| !req.is_satisfied_by(files))
        .map(|req| req.name.to_string())
        .collect()
}

pub fn validate(files: &FileMapping, kind: ProjectKind) -> Result<(), ParseError> {
    let missing = missing_files(files, kind);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ParseError::IncompleteGeneration { missing })
    }
}

pub fn parse_and_validate(text: &str, kind: ProjectKind) -> Result<FileMapping, ParseError> {
    let files = parse_response(text)?;
    validate(&files, kind)?;
    Ok(files)
}

// A bold name closing the line, after an optional list bullet or lead-in prose.
static BOLD_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:\d+[.)]\s+|[-*+]\s+|.*?\s)?\*\*\s*`?(?P<name>[^*`\s]+?)`?\s*:?\s*\*\*\s*:?$",
    )
    .expect("valid bold marker")
});
static DASH_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-{3,}\s*`?(?P<name>[^\s`]+?)`?\s*-{3,}$").expect("valid dash marker")
});
static HEADING_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#{1,4}\s+(?:file(?:name)?\s*:\s*)?`?(?P<name>[^\s`]+?)`?\s*:?$")
        .expect("valid heading marker")
});
static LABEL_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^file(?:name)?\s*:\s*`?(?P<name>[^\s`]+?)`?$").expect("valid label marker")
});
static CSS_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(^\s*(body|html|\*|:root)\s*\{)|([.#][\w-]+\s*\{)").expect("valid css rule")
});

enum Pending {
    Named(String),
    Rejected,
}

/// Extract every file block. Fails only when nothing usable was found.
pub fn parse_response(text: &str) -> Result<FileMapping, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut labeled = FileMapping::new();
    let mut unlabeled: Vec<String> = Vec::new();
    let mut pending: Option<Pending> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(ticks) = fence_open(line) {
            let (content, next) = read_fence(&lines, i + 1, ticks);
            match pending.take() {
                Some(Pending::Named(name)) => {
                    if labeled.insert(name.clone(), content).is_some() {
                        debug!(file = %name, "Duplicate file block, keeping the later one");
                    }
                }
                Some(Pending::Rejected) => {}
                None => unlabeled.push(content),
            }
            i = next;
            continue;
        }

        if let Some(raw) = marker_name(line) {
            pending = Some(match path::normalize_relative(raw) {
                Some(name) => Pending::Named(name),
                None => {
                    warn!(file = %raw, "Ignoring file block with unsafe name");
                    Pending::Rejected
                }
            });
        } else if !line.trim().is_empty() {
            pending = None;
        }
        i += 1;
    }

    let files = if labeled.is_empty() {
        classify_unlabeled(unlabeled)
    } else {
        labeled
    };

    if files.is_empty() {
        Err(ParseError::MalformedResponse)
    } else {
        Ok(files)
    }
}

/// Backtick count of an opening fence line
fn fence_open(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let ticks = trimmed.chars().take_while(|c| *c == '`').count();
    // An info string may not contain backticks.
    if ticks >= 3 && !trimmed[ticks..].contains('`') {
        Some(ticks)
    } else {
        None
    }
}

fn is_fence_close(line: &str, ticks: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= ticks && trimmed.chars().all(|c| c == '`')
}

/// Content of a fence starting at `start`, and the index after its closing line
fn read_fence(lines: &[&str], start: usize, ticks: usize) -> (String, usize) {
    let end = lines[start..]
        .iter()
        .position(|line| is_fence_close(line, ticks))
        .map(|offset| start + offset);

    let body = &lines[start..end.unwrap_or(lines.len())];
    let content = if body.iter().all(|l| l.trim().is_empty()) {
        String::new()
    } else {
        let mut content = body.join("\n");
        content.push('\n');
        content
    };

    (content, end.map_or(lines.len(), |e| e + 1))
}

fn marker_name(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    [&BOLD_MARKER, &DASH_MARKER, &HEADING_MARKER, &LABEL_MARKER]
        .iter()
        .find_map(|re| re.captures(trimmed))
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str())
        .filter(|name| path::extension(name).is_some())
}

fn classify_unlabeled(blocks: Vec<String>) -> FileMapping {
    let mut files = FileMapping::new();
    for content in blocks {
        let lower = content.to_lowercase();
        let name = if lower.contains("<!doctype html") || lower.contains("<html") {
            "index.html"
        } else if CSS_RULE.is_match(&content) && !looks_like_script(&content) {
            "style.css"
        } else if looks_like_script(&content) {
            "script.js"
        } else {
            debug!(len = content.len(), "Dropping unlabeled block of unknown type");
            continue;
        };
        files.insert(name, content);
    }
    files
}

fn looks_like_script(content: &str) -> bool {
    ["function", "const ", "let ", "var ", "=>", "document."]
        .iter()
        .any(|needle| content.contains(needle))
}
