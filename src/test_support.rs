//! Test doubles: an adapter driven by `sh`/`printf`/`cat` instead of real
//! database clients, and a local store that counts calls and injects failures.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempPath;

use crate::adapter::{CommandSpec, DatabaseAdapter, Pipeline};
use crate::config::Credentials;
use crate::errors::{AppError, Result};
use crate::orchestrator::BackupOrchestrator;
use crate::retention::RetentionPolicy;
use crate::store::{LocalStore, ObjectContent, RemoteStore};

#[derive(Debug, Clone)]
pub struct ScriptedAdapter {
    credentials: Credentials,
    local_dir: PathBuf,
    restore_marker: PathBuf,
    dump_content: String,
    fail_dump: bool,
    fail_restore: bool,
}

impl ScriptedAdapter {
    /// Dumps land in `<root>/scratch`; restores are recorded in `<root>/restored.out`.
    pub fn new(root: &Path) -> Self {
        let mut credentials = Credentials::new("scripted", "app");
        credentials.username = Some("backup".into());
        credentials.password = Some("secret".into());
        Self {
            credentials,
            local_dir: root.join("scratch"),
            restore_marker: root.join("restored.out"),
            dump_content: "dump".into(),
            fail_dump: false,
            fail_restore: false,
        }
    }

    pub fn dumping(mut self, content: &str) -> Self {
        self.dump_content = content.to_string();
        self
    }

    pub fn failing_dump(mut self) -> Self {
        self.fail_dump = true;
        self
    }

    pub fn failing_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }

    /// What the last successful restore replayed, if any.
    pub fn restored(&self) -> std::io::Result<Option<String>> {
        if !self.restore_marker.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&self.restore_marker).map(Some)
    }

    /// Files currently sitting in the scratch directory.
    pub fn local_dumps(&self) -> std::io::Result<Vec<PathBuf>> {
        if !self.local_dir.exists() {
            return Ok(Vec::new());
        }
        std::fs::read_dir(&self.local_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }
}

impl DatabaseAdapter for ScriptedAdapter {
    fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    fn dump_command(&self, destination: &Path) -> Pipeline {
        let stage = if self.fail_dump {
            CommandSpec::new("sh").arg("-c").arg("printf partial; exit 3")
        } else {
            CommandSpec::new("printf").arg("%s").arg(self.dump_content.clone())
        };
        Pipeline::new().stage(stage).write_to(destination)
    }

    fn restore_command(&self, source: &Path) -> Pipeline {
        if self.fail_restore {
            return Pipeline::new().stage(CommandSpec::new("sh").arg("-c").arg("exit 4"));
        }
        Pipeline::new()
            .stage(CommandSpec::new("cat"))
            .read_from(source)
            .write_to(&self.restore_marker)
    }
}

/// A [`LocalStore`] under `<root>/bucket` that counts every call.
#[derive(Debug, Clone)]
pub struct InstrumentedStore {
    inner: LocalStore,
    bucket: PathBuf,
    calls: Arc<AtomicUsize>,
    deleted: Arc<Mutex<Vec<String>>>,
    fail_stores: bool,
    fail_deletes: Arc<HashSet<String>>,
}

impl InstrumentedStore {
    pub fn new(root: &Path) -> Self {
        let bucket = root.join("bucket");
        Self {
            inner: LocalStore::new(bucket.clone(), &root.join("scratch")),
            bucket,
            calls: Arc::new(AtomicUsize::new(0)),
            deleted: Arc::new(Mutex::new(Vec::new())),
            fail_stores: false,
            fail_deletes: Arc::new(HashSet::new()),
        }
    }

    pub fn failing_stores(mut self) -> Self {
        self.fail_stores = true;
        self
    }

    pub fn failing_deletes(mut self, names: &[&str]) -> Self {
        self.fail_deletes = Arc::new(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Reads an object straight from disk without counting a call.
    pub fn read(&self, name: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.bucket.join(name))
    }

    /// Object names straight from disk, sorted, without counting a call.
    pub fn list_names(&self) -> std::io::Result<Vec<String>> {
        if !self.bucket.exists() {
            return Ok(Vec::new());
        }
        let mut names = std::fs::read_dir(&self.bucket)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for InstrumentedStore {
    async fn store(&self, name: &str, content: ObjectContent<'_>) -> Result<()> {
        self.record_call();
        if self.fail_stores {
            return Err(AppError::Storage(format!("injected store failure for {}", name)));
        }
        self.inner.store(name, content).await
    }

    async fn fetch(&self, name: &str) -> Result<TempPath> {
        self.record_call();
        self.inner.fetch(name).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.record_call();
        self.inner.list().await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.record_call();
        if self.fail_deletes.contains(name) {
            return Err(AppError::Storage(format!("injected delete failure for {}", name)));
        }
        self.inner.delete(name).await?;
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(name.to_string());
        }
        Ok(())
    }
}

/// Orchestrator for database `app` with a `staging` environment (`app_staging`).
pub fn orchestrator(adapter: ScriptedAdapter, store: InstrumentedStore) -> BackupOrchestrator {
    let credentials = adapter.credentials().clone();
    let environments = HashMap::from([(
        "staging".to_string(),
        Credentials::new("scripted", "app_staging"),
    )]);
    BackupOrchestrator::new(
        credentials,
        environments,
        Box::new(adapter),
        Box::new(store),
        RetentionPolicy::default(),
    )
}
