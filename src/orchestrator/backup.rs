// dbkeep/src/orchestrator/backup.rs
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::BackupOrchestrator;
use crate::errors::{AppError, Result};
use crate::naming::{backup_object_name, pointer_object_name};
use crate::store::ObjectContent;

impl BackupOrchestrator {
    /// Dumps the database, uploads the dump and points the most-recent pointer at it.
    /// Returns the stored object name.
    pub async fn backup(&self) -> Result<String> {
        self.backup_at(Utc::now()).await
    }

    pub async fn backup_at(&self, at: DateTime<Utc>) -> Result<String> {
        self.run_backup(at)
            .await
            .map_err(|e| AppError::BackupFailed(Box::new(e)))
    }

    async fn run_backup(&self, at: DateTime<Utc>) -> Result<String> {
        let database = &self.credentials.database;
        let file_name = backup_object_name(database, at);
        info!("🚀 Starting backup of {} as {}", database, file_name);

        // Dropping the dump deletes it, whichever way this function exits.
        let local_dump = self.adapter.dump().await?;

        self.store
            .store(&file_name, ObjectContent::File(local_dump.as_ref()))
            .await?;

        // Only reached once the dump upload succeeded.
        self.store
            .store(&pointer_object_name(database), ObjectContent::Bytes(file_name.as_bytes()))
            .await?;

        if let Err(e) = local_dump.close() {
            warn!("Failed to remove local dump file: {}", e);
        }
        info!("✅ Backup {} stored", file_name);
        Ok(file_name)
    }
}
