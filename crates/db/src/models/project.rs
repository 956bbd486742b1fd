use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;
use utils::path;

/// Lifecycle of the single project a server process owns
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Generating,
    Ready,
    Failed,
}

/// Whether a prompt started a project or refined an existing one
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PromptKind {
    Initial,
    Refinement,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
}

/// One submitted prompt. Entries are never edited once pushed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct PromptHistoryEntry {
    pub text: String,
    pub kind: PromptKind,
    pub outcome: AttemptOutcome,
    pub created_at: DateTime<Utc>,
}

impl PromptHistoryEntry {
    pub fn new(text: impl Into<String>, kind: PromptKind, outcome: AttemptOutcome) -> Self {
        Self {
            text: text.into(),
            kind,
            outcome,
            created_at: Utc::now(),
        }
    }
}

/// Relative filename to full file content. Keys are normalized paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMapping(BTreeMap<String, String>);

impl FileMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a file, returning the previous content.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), content.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The page a preview should open: `index.html` at the root, then any
    /// `index.html`, then the first HTML file.
    pub fn main_html(&self) -> Option<&str> {
        if self.contains("index.html") {
            return Some("index.html");
        }
        let mut html: Vec<&str> = self
            .0
            .keys()
            .map(String::as_str)
            .filter(|name| path::extension(name).as_deref() == Some("html"))
            .collect();
        html.sort_by_key(|name| (path::file_name(name) != "index.html", name.len()));
        html.first().copied()
    }
}

impl FromIterator<(String, String)> for FileMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ProjectStateError {
    #[error("a generation is already in progress")]
    AlreadyGenerating,
}

/// In-memory state of the current generation session
#[derive(Debug, Clone, Default)]
pub struct Project {
    status: GenerationStatus,
    history: Vec<PromptHistoryEntry>,
    files: FileMapping,
    last_error: Option<String>,
    generation: u64,
}

impl Project {
    /// Rebuild a project from files already present in the output directory.
    pub fn restored(files: FileMapping) -> Self {
        if files.is_empty() {
            return Self::default();
        }
        Self {
            status: GenerationStatus::Ready,
            files,
            generation: 1,
            ..Self::default()
        }
    }

    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    pub fn history(&self) -> &[PromptHistoryEntry] {
        &self.history
    }

    pub fn files(&self) -> &FileMapping {
        &self.files
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn begin_generation(&mut self) -> Result<(), ProjectStateError> {
        if self.status == GenerationStatus::Generating {
            return Err(ProjectStateError::AlreadyGenerating);
        }
        self.status = GenerationStatus::Generating;
        self.last_error = None;
        Ok(())
    }

    /// Replace the whole file set with a fresh generation.
    pub fn complete_generation(&mut self, entry: PromptHistoryEntry, files: FileMapping) {
        self.history.push(entry);
        self.files = files;
        self.status = GenerationStatus::Ready;
        self.last_error = None;
        self.generation += 1;
    }

    /// Files from the last successful generation stay in place.
    pub fn fail_generation(&mut self, entry: Option<PromptHistoryEntry>, error: impl Into<String>) {
        if let Some(entry) = entry {
            self.history.push(entry);
        }
        self.status = GenerationStatus::Failed;
        self.last_error = Some(error.into());
    }

    pub fn clear(&mut self) -> Result<(), ProjectStateError> {
        if self.status == GenerationStatus::Generating {
            return Err(ProjectStateError::AlreadyGenerating);
        }
        *self = Self::default();
        Ok(())
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            status: self.status,
            history: self.history.clone(),
            files: self.files.filenames(),
            last_error: self.last_error.clone(),
            generation: self.generation,
        }
    }
}

/// Read-only view of the project for the landing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct ProjectSnapshot {
    pub status: GenerationStatus,
    pub history: Vec<PromptHistoryEntry>,
    pub files: Vec<String>,
    pub last_error: Option<String>,
    #[ts(type = "number")]
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn mapping(names: &[&str]) -> FileMapping {
        names
            .iter()
            .map(|n| (n.to_string(), format!("content of {n}")))
            .collect()
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(GenerationStatus::Generating.to_string(), "generating");
        assert_eq!(GenerationStatus::from_str("ready").unwrap(), GenerationStatus::Ready);
        assert_eq!(
            serde_json::to_value(PromptKind::Refinement).unwrap(),
            serde_json::json!("refinement")
        );
    }

    #[test]
    fn test_main_html_prefers_root_index() {
        assert_eq!(
            mapping(&["about.html", "index.html", "style.css"]).main_html(),
            Some("index.html")
        );
        assert_eq!(
            mapping(&["about.html", "templates/index.html"]).main_html(),
            Some("templates/index.html")
        );
        assert_eq!(mapping(&["b.html", "style.css"]).main_html(), Some("b.html"));
        assert_eq!(mapping(&["style.css"]).main_html(), None);
    }

    #[test]
    fn test_generation_lifecycle() {
        let mut project = Project::default();
        assert_eq!(project.status(), GenerationStatus::Idle);

        project.begin_generation().unwrap();
        assert_eq!(
            project.begin_generation(),
            Err(ProjectStateError::AlreadyGenerating)
        );
        assert_eq!(project.clear(), Err(ProjectStateError::AlreadyGenerating));

        project.complete_generation(
            PromptHistoryEntry::new("portfolio", PromptKind::Initial, AttemptOutcome::Succeeded),
            mapping(&["index.html", "style.css"]),
        );
        assert_eq!(project.status(), GenerationStatus::Ready);
        assert_eq!(project.generation(), 1);
        assert_eq!(project.history().len(), 1);

        project.begin_generation().unwrap();
        project.fail_generation(None, "upstream unavailable");
        assert_eq!(project.status(), GenerationStatus::Failed);
        assert_eq!(project.files().len(), 2, "failed run keeps previous files");
        assert_eq!(project.history().len(), 1);
        assert_eq!(project.last_error(), Some("upstream unavailable"));

        project.clear().unwrap();
        assert_eq!(project.status(), GenerationStatus::Idle);
        assert!(project.history().is_empty());
        assert!(!project.has_files());
    }

    #[test]
    fn test_restored_project() {
        assert_eq!(
            Project::restored(FileMapping::new()).status(),
            GenerationStatus::Idle
        );
        let project = Project::restored(mapping(&["index.html"]));
        assert_eq!(project.status(), GenerationStatus::Ready);
        assert!(project.history().is_empty());
        assert_eq!(project.snapshot().files, vec!["index.html".to_string()]);
    }
}
