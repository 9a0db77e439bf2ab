// dbkeep/src/config/mod.rs
use chrono::TimeDelta;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::errors::{AppError, Result};
use crate::retention::RetentionPolicy;

/// Upper bound for either retention window, in days.
const MAX_RETENTION_DAYS: u32 = 3660;

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonDatabaseConfig {
    pub adapter: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonStorageConfig {
    pub provider: Option<String>,
    pub directory: Option<String>,
    // s3
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint_url: Option<String>,
    pub folder_prefix: Option<String>,
    pub force_path_style: Option<bool>,
    // local
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonDatabaseOptions {
    pub pg_version: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRetention {
    pub daily_hours: Option<u32>,
    pub weekly_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub database: Option<JsonDatabaseConfig>,
    pub environments: Option<HashMap<String, JsonDatabaseConfig>>,
    pub storage: Option<JsonStorageConfig>,
    pub local_dir: Option<PathBuf>,
    pub database_options: Option<JsonDatabaseOptions>,
    pub retention: Option<JsonRetention>,
}

// Application's internal configuration structs

/// Connection details for one database. Never persisted or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub adapter: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub encoding: Option<String>,
}

#[cfg(test)]
impl Credentials {
    pub fn new(adapter: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            database: database.into(),
            username: None,
            password: None,
            host: None,
            port: None,
            encoding: None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("adapter", &self.adapter)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Engine-specific knobs shared by every adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseOptions {
    pub pg_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint_url: Option<String>,
    pub folder_prefix: Option<String>,
    pub force_path_style: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    S3(S3Config),
    Local { root: PathBuf, directory: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub environments: HashMap<String, Credentials>,
    pub storage: StorageConfig,
    pub local_dir: PathBuf,
    pub database_options: DatabaseOptions,
    pub retention: RetentionPolicy,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            AppError::ConfigurationMissing(format!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)?;
        Self::from_raw(raw_json_config)
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let database = raw.database.as_ref().ok_or_else(|| {
            AppError::ConfigurationMissing("database section must be set in config.json".into())
        })?;
        let credentials = credentials_from_json(database, "database", None)?;

        let mut environments = HashMap::new();
        for (name, env_db) in raw.environments.iter().flatten() {
            let context = format!("environments.{}", name);
            let env_credentials = credentials_from_json(env_db, &context, Some(credentials.adapter.as_str()))?;
            environments.insert(name.clone(), env_credentials);
        }

        let storage = storage_from_json(raw.storage.as_ref())?;

        let local_dir = raw
            .local_dir
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(std::env::temp_dir);

        let database_options = DatabaseOptions {
            pg_version: raw.database_options.as_ref().and_then(|o| o.pg_version),
        };

        let retention = retention_from_json(raw.retention.as_ref())?;

        Ok(AppConfig {
            credentials,
            environments,
            storage,
            local_dir,
            database_options,
            retention,
        })
    }
}

/// `default_adapter` fills in an omitted `adapter`; environment entries inherit the
/// primary database's.
fn credentials_from_json(
    raw: &JsonDatabaseConfig,
    context: &str,
    default_adapter: Option<&str>,
) -> Result<Credentials> {
    let adapter = non_empty(&raw.adapter)
        .or_else(|| default_adapter.map(str::to_string))
        .ok_or_else(|| {
            AppError::ConfigurationMissing(format!("{}.adapter must be set in config.json", context))
        })?;
    let database = non_empty(&raw.database).ok_or_else(|| {
        AppError::ConfigurationMissing(format!("{}.database must be set in config.json", context))
    })?;

    Ok(Credentials {
        adapter,
        database,
        username: non_empty(&raw.username),
        // An empty password is still a password.
        password: raw.password.clone(),
        host: non_empty(&raw.host),
        port: raw.port,
        encoding: non_empty(&raw.encoding),
    })
}

fn storage_from_json(raw: Option<&JsonStorageConfig>) -> Result<StorageConfig> {
    let raw = raw.ok_or_else(|| {
        AppError::ConfigurationMissing("storage section must be set in config.json".into())
    })?;
    let directory = non_empty(&raw.directory).ok_or_else(|| {
        AppError::ConfigurationMissing("storage.directory must be set in config.json".into())
    })?;

    match non_empty(&raw.provider).as_deref().unwrap_or("s3") {
        "s3" => {
            let region = non_empty(&raw.region).ok_or_else(|| {
                AppError::InvalidConfig("storage.region is required for the s3 provider".into())
            })?;
            let access_key_id = non_empty(&raw.access_key_id);
            let secret_access_key = non_empty(&raw.secret_access_key);
            if access_key_id.is_some() != secret_access_key.is_some() {
                return Err(AppError::InvalidConfig(
                    "storage.access_key_id and storage.secret_access_key must be set together".into(),
                ));
            }
            if access_key_id.is_none() {
                warn!("No static S3 keys in config.json, falling back to the default AWS credential chain");
            }
            Ok(StorageConfig::S3(S3Config {
                bucket_name: directory,
                region,
                access_key_id,
                secret_access_key,
                endpoint_url: non_empty(&raw.endpoint_url),
                folder_prefix: non_empty(&raw.folder_prefix)
                    .map(|p| p.trim_matches('/').to_string())
                    .filter(|p| !p.is_empty()),
                force_path_style: raw.force_path_style.unwrap_or(false),
            }))
        }
        "local" => {
            let root = raw.root.clone().ok_or_else(|| {
                AppError::InvalidConfig("storage.root is required for the local provider".into())
            })?;
            Ok(StorageConfig::Local { root, directory })
        }
        other => Err(AppError::InvalidConfig(format!(
            "storage.provider '{}' is not supported (expected s3 or local)",
            other
        ))),
    }
}

fn retention_from_json(raw: Option<&JsonRetention>) -> Result<RetentionPolicy> {
    let mut retention = RetentionPolicy::default();
    let Some(raw) = raw else {
        return Ok(retention);
    };
    if let Some(hours) = raw.daily_hours {
        retention.daily_window =
            bounded_window("retention.daily_hours", hours, MAX_RETENTION_DAYS * 24, TimeDelta::try_hours)?;
    }
    if let Some(days) = raw.weekly_days {
        retention.weekly_window =
            bounded_window("retention.weekly_days", days, MAX_RETENTION_DAYS, TimeDelta::try_days)?;
    }
    Ok(retention)
}

fn bounded_window(
    field: &str,
    value: u32,
    max: u32,
    to_delta: fn(i64) -> Option<TimeDelta>,
) -> Result<TimeDelta> {
    if value > max {
        return Err(AppError::InvalidConfig(format!(
            "{} must be at most {} (got {})",
            field, max, value
        )));
    }
    to_delta(i64::from(value))
        .ok_or_else(|| AppError::InvalidConfig(format!("{} is out of range ({})", field, value)))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}
