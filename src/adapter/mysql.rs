// dbkeep/src/adapter/mysql.rs
use std::path::{Path, PathBuf};

use super::{CommandSpec, DatabaseAdapter, Pipeline};
use crate::config::Credentials;

/// MySQL / MariaDB via `mysqldump | gzip` and `gunzip | mysql`.
#[derive(Debug, Clone)]
pub struct MysqlAdapter {
    credentials: Credentials,
    local_dir: PathBuf,
}

impl MysqlAdapter {
    pub fn new(credentials: Credentials, local_dir: &Path) -> Self {
        Self {
            credentials,
            local_dir: local_dir.to_path_buf(),
        }
    }

    /// Connection flags shared by `mysqldump` and `mysql`, database name last.
    fn mysql_options(&self) -> Vec<String> {
        let creds = &self.credentials;
        let mut opts = Vec::new();
        if let Some(username) = &creds.username {
            opts.push("-u".to_string());
            opts.push(username.clone());
        }
        if let Some(host) = &creds.host {
            opts.push("-h".to_string());
            opts.push(host.clone());
        }
        if let Some(port) = creds.port {
            opts.push("-P".to_string());
            opts.push(port.to_string());
        }
        if let Some(encoding) = &creds.encoding {
            opts.push(format!("--default-character-set={}", encoding));
        }
        opts.push(creds.database.clone());
        opts
    }

    /// The password travels in the child's environment, never on its command line.
    fn with_password(&self, command: CommandSpec) -> CommandSpec {
        match &self.credentials.password {
            Some(password) => command.env("MYSQL_PWD", password.clone()),
            None => command,
        }
    }
}

impl DatabaseAdapter for MysqlAdapter {
    fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    fn dump_command(&self, destination: &Path) -> Pipeline {
        Pipeline::new()
            .stage(
                self.with_password(
                    CommandSpec::new("mysqldump")
                        .args(["--quick", "--single-transaction", "--create-options"])
                        .args(self.mysql_options()),
                ),
            )
            .stage(CommandSpec::new("gzip").arg("-9"))
            .write_to(destination)
    }

    fn restore_command(&self, source: &Path) -> Pipeline {
        Pipeline::new()
            .stage(CommandSpec::new("gunzip").arg("-c"))
            .stage(self.with_password(CommandSpec::new("mysql").args(self.mysql_options())))
            .read_from(source)
    }
}
