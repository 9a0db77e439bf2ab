// dbkeep/src/adapter/postgres.rs
use std::path::{Path, PathBuf};

use super::{CommandSpec, DatabaseAdapter, Pipeline};
use crate::config::{Credentials, DatabaseOptions};

/// Assumed server/client major version when none is configured.
const DEFAULT_PG_VERSION: u32 = 9;

/// PostgreSQL / PostGIS via `pg_dump --compress` and `gunzip | psql`.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    credentials: Credentials,
    pg_version: u32,
    local_dir: PathBuf,
}

impl PostgresAdapter {
    pub fn new(credentials: Credentials, options: &DatabaseOptions, local_dir: &Path) -> Self {
        Self {
            credentials,
            pg_version: options.pg_version.unwrap_or(DEFAULT_PG_VERSION),
            local_dir: local_dir.to_path_buf(),
        }
    }

    fn connection_options(&self) -> Vec<String> {
        let creds = &self.credentials;
        let mut opts = Vec::new();
        if let Some(username) = &creds.username {
            opts.push("-U".to_string());
            opts.push(username.clone());
        }
        if let Some(host) = &creds.host {
            opts.push("-h".to_string());
            opts.push(host.clone());
        }
        if let Some(port) = creds.port {
            opts.push("-p".to_string());
            opts.push(port.to_string());
        }
        opts
    }

    // -w: never prompt for a password. Only passed to 9.x and newer clients.
    fn no_password_prompt(&self) -> Option<&'static str> {
        (self.pg_version >= 9).then_some("-w")
    }

    /// The password travels in the child's environment, never on its command line.
    fn with_password(&self, command: CommandSpec) -> CommandSpec {
        match &self.credentials.password {
            Some(password) => command.env("PGPASSWORD", password.clone()),
            None => command,
        }
    }
}

impl DatabaseAdapter for PostgresAdapter {
    fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    fn dump_command(&self, destination: &Path) -> Pipeline {
        let mut pg_dump = CommandSpec::new("pg_dump")
            .args(["--clean", "--format=p", "--compress=1"])
            .args(self.connection_options());
        if let Some(encoding) = &self.credentials.encoding {
            pg_dump = pg_dump.arg(format!("--encoding={}", encoding));
        }
        pg_dump = pg_dump
            .args(self.no_password_prompt())
            .arg(self.credentials.database.clone());

        Pipeline::new()
            .stage(self.with_password(pg_dump))
            .write_to(destination)
    }

    fn restore_command(&self, source: &Path) -> Pipeline {
        let mut psql = CommandSpec::new("psql")
            .args(self.connection_options())
            .args(self.no_password_prompt())
            .arg("-d")
            .arg(self.credentials.database.clone());
        if let Some(encoding) = &self.credentials.encoding {
            psql = psql.env("PGCLIENTENCODING", encoding.clone());
        }

        Pipeline::new()
            .stage(CommandSpec::new("gunzip").arg("-c"))
            .stage(self.with_password(psql))
            .read_from(source)
    }
}
