//! The on-disk copy of the generated site.
//!
//! Writers build the complete tree in a staging directory next to the output
//! root and swap it in while holding the write lock, so readers (preview,
//! ZIP export) only ever see a complete generation.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::{fs, sync::RwLock};
use tracing::{debug, warn};
use utils::path::join_relative;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::models::project::FileMapping;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid output file name: {0}")]
    InvalidPath(String),
    #[error("output root has no directory name: {0}")]
    InvalidRoot(PathBuf),
    #[error("background task failed: {0}")]
    Task(String),
}

impl StoreError {
    fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> StoreError {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}

#[derive(Debug)]
pub struct OutputDirectory {
    root: PathBuf,
    lock: RwLock<()>,
}

impl OutputDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_exists(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(StoreError::io(&self.root))
    }

    /// Replace the whole directory with `files`. Returns the written names.
    ///
    /// On error the previous contents are left untouched.
    pub async fn replace_all(&self, files: &FileMapping) -> Result<Vec<String>, StoreError> {
        let staging = self.sibling("staging")?;
        if let Err(e) = write_tree(&staging, files).await {
            remove_quietly(&staging).await;
            return Err(e);
        }

        let backup = self.sibling("previous")?;
        {
            let _guard = self.lock.write().await;
            let had_previous = fs::try_exists(&self.root)
                .await
                .map_err(StoreError::io(&self.root))?;

            if had_previous {
                if let Err(e) = fs::rename(&self.root, &backup).await {
                    remove_quietly(&staging).await;
                    return Err(StoreError::io(&self.root)(e));
                }
            }

            if let Err(e) = fs::rename(&staging, &self.root).await {
                if had_previous {
                    if let Err(restore) = fs::rename(&backup, &self.root).await {
                        warn!(error = %restore, "Failed to restore previous output directory");
                    }
                }
                remove_quietly(&staging).await;
                return Err(StoreError::io(&self.root)(e));
            }
        }

        remove_quietly(&backup).await;
        debug!(root = %self.root.display(), count = files.len(), "Output directory replaced");
        Ok(files.filenames())
    }

    /// Remove every generated file, leaving an empty root.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&self.root)(e)),
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(StoreError::io(&self.root))
    }

    /// Read one file. Directory paths resolve to their `index.html`.
    /// Invalid or missing paths yield `Ok(None)`.
    pub async fn read_file(&self, relative: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = if relative.trim_matches('/').is_empty() {
            self.root.join("index.html")
        } else {
            match join_relative(&self.root, relative) {
                Some(path) => path,
                None => return Ok(None),
            }
        };

        let _guard = self.lock.read().await;
        let path = match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => path.join("index.html"),
            Ok(_) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path)(e)),
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path)(e)),
        }
    }

    /// Consistent copy of every file, sorted by relative path.
    pub async fn snapshot(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let _guard = self.lock.read().await;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || collect_files(&root))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Load the directory as text files. Non UTF-8 files are skipped.
    pub async fn load_mapping(&self) -> Result<FileMapping, StoreError> {
        let mut mapping = FileMapping::new();
        for (name, bytes) in self.snapshot().await? {
            match String::from_utf8(bytes) {
                Ok(content) => {
                    mapping.insert(name, content);
                }
                Err(_) => warn!(file = %name, "Skipping non UTF-8 file in output directory"),
            }
        }
        Ok(mapping)
    }

    fn sibling(&self, purpose: &str) -> Result<PathBuf, StoreError> {
        let name = self
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidRoot(self.root.clone()))?;
        let parent = self.root.parent().unwrap_or_else(|| Path::new(""));
        Ok(parent.join(format!(".{name}.{purpose}-{}", Uuid::new_v4().simple())))
    }
}

async fn write_tree(dir: &Path, files: &FileMapping) -> Result<(), StoreError> {
    fs::create_dir_all(dir).await.map_err(StoreError::io(dir))?;
    for (name, content) in files.iter() {
        let path =
            join_relative(dir, name).ok_or_else(|| StoreError::InvalidPath(name.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(StoreError::io(parent))?;
        }
        fs::write(&path, content.as_bytes())
            .await
            .map_err(StoreError::io(&path))?;
    }
    Ok(())
}

async fn remove_quietly(path: &Path) {
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove directory"),
    }
}

fn collect_files(root: &Path) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            StoreError::Io {
                path,
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop")),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| StoreError::InvalidPath(entry.path().display().to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = std::fs::read(entry.path()).map_err(StoreError::io(entry.path()))?;
        files.push((relative, bytes));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
