// dbkeep/src/orchestrator/mod.rs
//! Backup, restore and clean for one configured database.
//!
//! Invocations are not coordinated with each other. The scheduler running this
//! tool must ensure at most one orchestration process per database at a time:
//! a `clean` racing a `backup` can delete the fresh dump before its pointer is
//! written.

mod backup;
mod clean;
mod restore;

use std::collections::HashMap;

use crate::adapter::{self, DatabaseAdapter};
use crate::config::{AppConfig, Credentials};
use crate::errors::{AppError, Result};
use crate::retention::RetentionPolicy;
use crate::store::{self, RemoteStore};

pub struct BackupOrchestrator {
    credentials: Credentials,
    environments: HashMap<String, Credentials>,
    adapter: Box<dyn DatabaseAdapter>,
    store: Box<dyn RemoteStore>,
    retention: RetentionPolicy,
}

impl BackupOrchestrator {
    /// Builds the adapter and store described by `config`. Fails on an
    /// unsupported engine before any dump or remote call happens.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let adapter = adapter::adapter_for(&config.credentials, &config.database_options, &config.local_dir)?;
        let store = store::open_store(&config.storage, &config.local_dir).await?;
        Ok(Self::new(
            config.credentials.clone(),
            config.environments.clone(),
            adapter,
            store,
            config.retention.clone(),
        ))
    }

    pub fn new(
        credentials: Credentials,
        environments: HashMap<String, Credentials>,
        adapter: Box<dyn DatabaseAdapter>,
        store: Box<dyn RemoteStore>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            credentials,
            environments,
            adapter,
            store,
            retention,
        }
    }

    /// Database whose backups an operation targets: ours, or a named environment's.
    fn database_for(&self, environment: Option<&str>) -> Result<&str> {
        match environment {
            None => Ok(&self.credentials.database),
            Some(name) => self
                .environments
                .get(name)
                .map(|creds| creds.database.as_str())
                .ok_or_else(|| AppError::UnknownEnvironment(name.to_string())),
        }
    }
}
