// dbkeep/src/orchestrator/restore.rs
use tracing::info;

use super::BackupOrchestrator;
use crate::errors::{AppError, Result};
use crate::naming::pointer_object_name;

impl BackupOrchestrator {
    /// Restores the most recent backup of this database, or of `environment`'s
    /// database, into this database. Returns the restored object name.
    pub async fn restore(&self, environment: Option<&str>) -> Result<String> {
        let source_database = self.database_for(environment)?;
        info!(
            "🔄 Restoring latest backup of {} into {}",
            source_database, self.credentials.database
        );

        let pointer = self.store.fetch(&pointer_object_name(source_database)).await?;
        let dump_file_name = tokio::fs::read_to_string(&pointer).await?.trim().to_string();
        if dump_file_name.is_empty() {
            return Err(AppError::ObjectNotFound(format!(
                "{} is empty",
                pointer_object_name(source_database)
            )));
        }

        let dump = self.store.fetch(&dump_file_name).await?;
        self.adapter.restore_from(&dump).await?;

        info!("✅ Restored {}", dump_file_name);
        Ok(dump_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ObjectContent, RemoteStore};
    use crate::test_support::{orchestrator, InstrumentedStore, ScriptedAdapter};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_restore_latest_backup() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let adapter = ScriptedAdapter::new(dir.path()).dumping("first");
        let store = InstrumentedStore::new(dir.path());
        let orch = orchestrator(adapter.clone(), store.clone());
        orch.backup_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).await?;

        let restored = orch.restore(None).await?;

        assert_eq!(restored, "dump-app-202401010000.sql.gz");
        assert_eq!(adapter.restored()?, Some("first".to_string()));
        assert!(adapter.local_dumps()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_from_named_environment() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let adapter = ScriptedAdapter::new(dir.path());
        let store = InstrumentedStore::new(dir.path());
        store
            .store("dump-app_staging-202402020202.sql.gz", ObjectContent::Bytes(b"staging data"))
            .await?;
        store
            .store(
                "most-recent-dump-app_staging.txt",
                ObjectContent::Bytes(b"dump-app_staging-202402020202.sql.gz\n"),
            )
            .await?;
        let orch = orchestrator(adapter.clone(), store.clone());

        let restored = orch.restore(Some("staging")).await?;

        assert_eq!(restored, "dump-app_staging-202402020202.sql.gz");
        assert_eq!(adapter.restored()?, Some("staging data".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_environment_makes_no_remote_calls() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let adapter = ScriptedAdapter::new(dir.path());
        let store = InstrumentedStore::new(dir.path());
        let orch = orchestrator(adapter.clone(), store.clone());

        let err = orch.restore(Some("qa")).await.unwrap_err();

        assert!(matches!(err, AppError::UnknownEnvironment(name) if name == "qa"));
        assert_eq!(store.calls(), 0);
        assert_eq!(adapter.restored()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_pointer_is_object_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let adapter = ScriptedAdapter::new(dir.path());
        let orch = orchestrator(adapter.clone(), InstrumentedStore::new(dir.path()));

        let err = orch.restore(None).await.unwrap_err();

        assert!(matches!(err, AppError::ObjectNotFound(name) if name == "most-recent-dump-app.txt"));
        assert_eq!(adapter.restored()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_dump_is_object_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let adapter = ScriptedAdapter::new(dir.path());
        let store = InstrumentedStore::new(dir.path());
        store
            .store("most-recent-dump-app.txt", ObjectContent::Bytes(b"dump-app-202401010000.sql.gz"))
            .await?;
        let orch = orchestrator(adapter.clone(), store);

        let err = orch.restore(None).await.unwrap_err();

        assert!(matches!(err, AppError::ObjectNotFound(name) if name == "dump-app-202401010000.sql.gz"));
        assert_eq!(adapter.restored()?, None);
        assert!(adapter.local_dumps()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_restore_cleans_fetched_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let adapter = ScriptedAdapter::new(dir.path()).dumping("x");
        let store = InstrumentedStore::new(dir.path());
        orchestrator(adapter.clone(), store.clone())
            .backup_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .await?;

        let failing = adapter.failing_restore();
        let err = orchestrator(failing.clone(), store).restore(None).await.unwrap_err();

        assert!(matches!(err, AppError::RestoreFailed(_)));
        assert!(failing.local_dumps()?.is_empty());
        Ok(())
    }
}
