// dbkeep/src/adapter/pipeline.rs
//! Structured process pipelines.
//!
//! Every stage is an argument vector handed straight to `std::process::Command`,
//! so credentials never pass through a shell. Stages are chained stdout to stdin,
//! the optional input file feeds the first stage and the optional output file
//! receives the last stage's stdout.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::debug;
use which::which;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{program} executable not found in PATH. Please ensure the database client tools are installed and in your PATH.")]
    NotFound { program: String },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("Pipeline I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pipeline has no stages")]
    Empty,
}

/// One program invocation: executable name, arguments and extra environment.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

// Environment values may carry passwords.
impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<CommandSpec>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, command: CommandSpec) -> Self {
        self.stages.push(command);
        self
    }

    pub fn read_from(mut self, path: &Path) -> Self {
        self.input = Some(path.to_path_buf());
        self
    }

    pub fn write_to(mut self, path: &Path) -> Self {
        self.output = Some(path.to_path_buf());
        self
    }

    /// Program names in stage order, e.g. `["mysqldump", "gzip"]`.
    pub fn programs(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.program.as_str()).collect()
    }

    /// Runs the pipeline to completion on the current thread.
    ///
    /// Every stage is waited for; the first stage (in pipeline order) that exited
    /// unsuccessfully is reported.
    pub fn run(&self) -> Result<(), PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut children: Vec<(String, Child)> = Vec::with_capacity(self.stages.len());
        let spawned = self.spawn_all(&mut children);
        if let Err(e) = spawned {
            for (_, child) in children.iter_mut() {
                let _ = child.kill();
                let _ = child.wait();
            }
            return Err(e);
        }

        let mut first_failure = None;
        for (program, mut child) in children {
            let status = child.wait()?;
            debug!(program = %program, %status, "pipeline stage finished");
            if !status.success() && first_failure.is_none() {
                first_failure = Some(PipelineError::Failed { program, status });
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Runs the pipeline on tokio's blocking pool.
    pub async fn run_blocking(self) -> Result<(), PipelineError> {
        tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?
    }

    fn spawn_all(&self, children: &mut Vec<(String, Child)>) -> Result<(), PipelineError> {
        let mut upstream: Option<Stdio> = match &self.input {
            Some(path) => Some(Stdio::from(File::open(path)?)),
            None => None,
        };
        let last = self.stages.len() - 1;

        for (i, stage) in self.stages.iter().enumerate() {
            let executable = which(&stage.program).map_err(|_| PipelineError::NotFound {
                program: stage.program.clone(),
            })?;

            let mut command = Command::new(executable);
            command.args(&stage.args);
            for (key, value) in &stage.env {
                command.env(key, value);
            }
            if let Some(stdin) = upstream.take() {
                command.stdin(stdin);
            }
            if i == last {
                if let Some(path) = &self.output {
                    command.stdout(Stdio::from(File::create(path)?));
                }
            } else {
                command.stdout(Stdio::piped());
            }

            debug!(program = %stage.program, args = ?stage.args, "spawning pipeline stage");
            let mut child = command.spawn().map_err(|source| PipelineError::Spawn {
                program: stage.program.clone(),
                source,
            })?;
            if i != last {
                upstream = child.stdout.take().map(Stdio::from);
            }
            children.push((stage.program.clone(), child));
        }
        Ok(())
    }
}
