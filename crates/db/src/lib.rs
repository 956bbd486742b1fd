use std::{path::PathBuf, sync::Arc};

use tokio::sync::RwLock;
use tracing::info;

pub mod models;
pub mod output_dir;

use models::project::Project;
pub use output_dir::{OutputDirectory, StoreError};

/// Owner of the project's in-memory state and its on-disk output
#[derive(Clone)]
pub struct ProjectStore {
    project: Arc<RwLock<Project>>,
    output: Arc<OutputDirectory>,
}

impl ProjectStore {
    /// Open the store rooted at `output_root`, creating it if needed.
    ///
    /// With `restore` set, files already on disk become a ready project.
    pub async fn open(output_root: impl Into<PathBuf>, restore: bool) -> Result<Self, StoreError> {
        let output = OutputDirectory::new(output_root);
        output.ensure_exists().await?;

        let project = if restore {
            let files = output.load_mapping().await?;
            if !files.is_empty() {
                info!(
                    root = %output.root().display(),
                    files = files.len(),
                    "Restored previously generated site"
                );
            }
            Project::restored(files)
        } else {
            Project::default()
        };

        Ok(Self {
            project: Arc::new(RwLock::new(project)),
            output: Arc::new(output),
        })
    }

    pub fn project(&self) -> &RwLock<Project> {
        &self.project
    }

    pub fn output(&self) -> &OutputDirectory {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::GenerationStatus;

    #[tokio::test]
    async fn test_open_restores_existing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("output");
        std::fs::create_dir_all(root.join("static")).unwrap();
        std::fs::write(root.join("index.html"), "<h1>old</h1>").unwrap();
        std::fs::write(root.join("static/app.js"), "1;").unwrap();

        let store = ProjectStore::open(&root, true).await.unwrap();
        let project = store.project().read().await;
        assert_eq!(project.status(), GenerationStatus::Ready);
        assert_eq!(
            project.files().filenames(),
            vec!["index.html".to_string(), "static/app.js".to_string()]
        );
    }

    #[tokio::test]
    async fn test_open_without_restore_starts_idle() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("output");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("index.html"), "x").unwrap();

        let store = ProjectStore::open(&root, false).await.unwrap();
        assert_eq!(store.project().read().await.status(), GenerationStatus::Idle);
    }
}
