// dbkeep/src/orchestrator/clean.rs
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::BackupOrchestrator;
use crate::errors::{AppError, Result};
use crate::naming::BackupNameMatcher;
use crate::retention::RetentionCandidate;

/// Outcome of a successful `clean`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
}

impl BackupOrchestrator {
    /// Prunes this database's backups down to the retention keep-set.
    ///
    /// Objects that are not backups of this database are never touched. A failed
    /// delete does not stop the remaining ones; all failures are reported together
    /// as `CleanIncomplete` and nothing is rolled back.
    pub async fn clean(&self) -> Result<CleanReport> {
        self.clean_at(Utc::now()).await
    }

    pub async fn clean_at(&self, now: DateTime<Utc>) -> Result<CleanReport> {
        let matcher = BackupNameMatcher::new(&self.credentials.database)?;
        let candidates: Vec<RetentionCandidate> = self
            .store
            .list()
            .await?
            .iter()
            .filter_map(|name| matcher.candidate(name))
            .collect();

        let keep = self.retention.keep_set(&candidates, now);
        info!(
            "🧹 {} backup(s) of {} found, keeping {}",
            candidates.len(),
            self.credentials.database,
            keep.len()
        );

        let mut report = CleanReport::default();
        let mut failed = Vec::new();
        for candidate in candidates {
            if keep.contains(&candidate.name) {
                report.kept.push(candidate.name);
                continue;
            }
            match self.store.delete(&candidate.name).await {
                Ok(()) => report.deleted.push(candidate.name),
                Err(e) => {
                    warn!("Failed to delete {}: {}", candidate.name, e);
                    failed.push(candidate.name);
                }
            }
        }

        if !failed.is_empty() {
            return Err(AppError::CleanIncomplete {
                deleted: report.deleted.len(),
                failed,
            });
        }
        info!("✅ Clean finished, deleted {} backup(s)", report.deleted.len());
        Ok(report)
    }
}
