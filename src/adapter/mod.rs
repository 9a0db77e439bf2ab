// dbkeep/src/adapter/mod.rs
pub(crate) mod mysql;
pub(crate) mod pipeline;
pub(crate) mod postgres;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::{Builder as TempFileBuilder, TempPath};
use tracing::{debug, info, warn};

use crate::config::{Credentials, DatabaseOptions};
use crate::errors::{AppError, Result};
pub use mysql::MysqlAdapter;
pub use pipeline::{CommandSpec, Pipeline};
pub use postgres::PostgresAdapter;

/// Dump files left behind by a crashed run are swept once they are this old.
const STALE_DUMP_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Mysql,
    Postgres,
}

impl EngineKind {
    /// Resolves the configured adapter string (`mysql2`, `postgresql`, `postgis`, ...).
    pub fn from_adapter(adapter: &str) -> Result<Self> {
        let lowered = adapter.to_ascii_lowercase();
        if lowered.contains("mysql") {
            Ok(EngineKind::Mysql)
        } else if lowered.contains("postgres") || lowered.contains("postgis") {
            Ok(EngineKind::Postgres)
        } else {
            Err(AppError::UnsupportedEngine(adapter.to_string()))
        }
    }
}

/// Produces and consumes gzip-compressed SQL dumps for one database engine.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    fn credentials(&self) -> &Credentials;

    /// Directory that holds dump files while they exist.
    fn local_dir(&self) -> &Path;

    /// Pipeline writing a gzip-compressed SQL dump to `destination`.
    fn dump_command(&self, destination: &Path) -> Pipeline;

    /// Pipeline decompressing `source` and replaying it against the live database.
    fn restore_command(&self, source: &Path) -> Pipeline;

    fn tempfile_prefix(&self) -> String {
        dump_file_prefix(self.credentials())
    }

    /// Dumps the database into a fresh temp file in [`local_dir`](Self::local_dir).
    ///
    /// The returned path deletes its file when dropped. A failed dump removes the
    /// partially written file before the error is returned.
    async fn dump(&self) -> Result<TempPath> {
        let prefix = self.tempfile_prefix();
        let local_dir = self.local_dir();
        std::fs::create_dir_all(local_dir)?;

        let dump_path = TempFileBuilder::new()
            .prefix(&prefix)
            .suffix(".sql.gz")
            .tempfile_in(local_dir)?
            .into_temp_path();

        if let Err(e) = sweep_stale_dumps(local_dir, &prefix, dump_path.as_ref(), STALE_DUMP_AGE) {
            warn!("Could not sweep stale dumps in {}: {}", local_dir.display(), e);
        }

        let command = self.dump_command(dump_path.as_ref());
        info!(
            database = %self.credentials().database,
            programs = ?command.programs(),
            "Dumping database to {}",
            dump_path.display()
        );
        match command.run_blocking().await {
            Ok(()) => Ok(dump_path),
            Err(e) => {
                if let Err(rm) = dump_path.close() {
                    warn!("Failed to remove partial dump file: {}", rm);
                }
                Err(AppError::DumpFailed(e))
            }
        }
    }

    /// Replays the dump at `path`. Destructive: no snapshot is taken first.
    async fn restore_from(&self, path: &Path) -> Result<()> {
        let command = self.restore_command(path);
        info!(
            database = %self.credentials().database,
            programs = ?command.programs(),
            "Restoring database from {}",
            path.display()
        );
        command.run_blocking().await.map_err(AppError::RestoreFailed)
    }
}

/// Selects the adapter for `credentials.adapter`. Unknown engines fail here,
/// before anything is dumped.
pub fn adapter_for(
    credentials: &Credentials,
    options: &DatabaseOptions,
    local_dir: &Path,
) -> Result<Box<dyn DatabaseAdapter>> {
    let adapter: Box<dyn DatabaseAdapter> = match EngineKind::from_adapter(&credentials.adapter)? {
        EngineKind::Mysql => Box::new(MysqlAdapter::new(credentials.clone(), local_dir)),
        EngineKind::Postgres => Box::new(PostgresAdapter::new(credentials.clone(), options, local_dir)),
    };
    Ok(adapter)
}

/// Stable, credential-derived file name prefix so orphaned dumps of this
/// database can be recognised by later runs.
pub fn dump_file_prefix(credentials: &Credentials) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "dump{}/{}/{}",
        credentials.database,
        credentials.username.as_deref().unwrap_or_default(),
        credentials.password.as_deref().unwrap_or_default()
    ));
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

/// Removes files in `dir` starting with `prefix` whose mtime is older than `max_age`.
/// `keep` is never removed. Files that cannot be removed are logged and skipped;
/// only an unreadable `dir` is an error.
pub fn sweep_stale_dumps(dir: &Path, prefix: &str, keep: &Path, max_age: Duration) -> Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let is_ours = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(prefix));
        if !is_ours || path == keep {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok());
        if age.is_some_and(|age| age > max_age) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed stale dump file {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove stale dump file {}: {}", path.display(), e),
            }
        }
    }

    if removed > 0 {
        info!("Swept {} stale dump file(s) from {}", removed, dir.display());
    }
    Ok(removed)
}
