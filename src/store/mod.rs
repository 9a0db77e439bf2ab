// dbkeep/src/store/mod.rs
pub(crate) mod local;
pub(crate) mod s3;

use async_trait::async_trait;
use std::path::Path;
use tempfile::TempPath;

use crate::config::StorageConfig;
use crate::errors::Result;
pub use local::LocalStore;
pub use s3::S3Store;

/// Body of an object to upload.
#[derive(Debug, Clone, Copy)]
pub enum ObjectContent<'a> {
    File(&'a Path),
    Bytes(&'a [u8]),
}

/// A flat namespace of named objects (a bucket, or a directory).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Uploads `content` as a private object, replacing any object of the same name.
    async fn store(&self, name: &str, content: ObjectContent<'_>) -> Result<()>;

    /// Downloads `name` into a new local temp file, deleted when the returned path drops.
    /// Fails with `ObjectNotFound` if the object does not exist.
    async fn fetch(&self, name: &str) -> Result<TempPath>;

    /// Every object name in the bucket or directory, including ones this tool did not write.
    async fn list(&self) -> Result<Vec<String>>;

    /// Deletes `name`. Deleting an absent object succeeds.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Builds the store described by `config`. Fetched files are placed in `local_dir`.
pub async fn open_store(config: &StorageConfig, local_dir: &Path) -> Result<Box<dyn RemoteStore>> {
    let store: Box<dyn RemoteStore> = match config {
        StorageConfig::S3(s3_config) => Box::new(S3Store::connect(s3_config, local_dir).await),
        StorageConfig::Local { root, directory } => Box::new(LocalStore::new(root.join(directory), local_dir)),
    };
    Ok(store)
}
