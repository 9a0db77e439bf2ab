// dbkeep/src/store/local.rs
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::{Builder as TempFileBuilder, TempPath};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use super::{ObjectContent, RemoteStore};
use crate::errors::{AppError, Result};

/// Objects as plain files under one directory (a mounted volume, NFS share, ...).
#[derive(Debug, Clone)]
pub struct LocalStore {
    directory: PathBuf,
    local_dir: PathBuf,
}

impl LocalStore {
    pub fn new(directory: impl Into<PathBuf>, local_dir: &Path) -> Self {
        Self {
            directory: directory.into(),
            local_dir: local_dir.to_path_buf(),
        }
    }

    fn object_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if name.is_empty() || escapes {
            return Err(AppError::Storage(format!("Invalid object name '{}'", name)));
        }
        Ok(self.directory.join(relative))
    }
}

#[async_trait]
impl RemoteStore for LocalStore {
    async fn store(&self, name: &str, content: ObjectContent<'_>) -> Result<()> {
        let destination = self.object_path(name)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        match content {
            ObjectContent::File(path) => {
                fs::copy(path, &destination).await?;
            }
            ObjectContent::Bytes(bytes) => fs::write(&destination, bytes).await?,
        }
        debug!("Stored {}", destination.display());
        Ok(())
    }

    async fn fetch(&self, name: &str) -> Result<TempPath> {
        let source = self.object_path(name)?;
        if !fs::try_exists(&source).await? {
            return Err(AppError::ObjectNotFound(name.to_string()));
        }

        fs::create_dir_all(&self.local_dir).await?;
        let destination = TempFileBuilder::new()
            .prefix("fetch-")
            .tempfile_in(&self.local_dir)?
            .into_temp_path();
        fs::copy(&source, &destination).await?;
        Ok(destination)
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !fs::try_exists(&self.directory).await? {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.directory).min_depth(1) {
            let entry = entry.map_err(|e| AppError::Storage(format!("Failed to walk directory: {}", e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.directory) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.object_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
