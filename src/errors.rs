use thiserror::Error;

use crate::adapter::pipeline::PipelineError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database adapter '{0}' is not supported (expected mysql, postgres or postgis)")]
    UnsupportedEngine(String),

    #[error("Dump failed: {0}")]
    DumpFailed(#[source] PipelineError),

    #[error("Restore failed: {0}")]
    RestoreFailed(#[source] PipelineError),

    #[error("Backup failed: {0}")]
    BackupFailed(#[source] Box<AppError>),

    #[error("Object not found in remote store: {0}")]
    ObjectNotFound(String),

    #[error("Unknown environment name ({0}), check the environments section of the config")]
    UnknownEnvironment(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Clean incomplete: deleted {deleted} object(s), failed to delete {failed:?}")]
    CleanIncomplete { deleted: usize, failed: Vec<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),
}

impl AppError {
    /// Wraps an S3 SDK (or any displayable backend) failure with the object it concerned.
    pub fn storage(action: &str, key: &str, err: impl std::fmt::Display) -> Self {
        AppError::Storage(format!("{} '{}': {}", action, key, err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
