//! External command used as a cache producer.
//!
//! The CLI's `run` subcommand memoises the standard output of an arbitrary
//! program, such as `terraform output -json vpc_id`. Empty output means the
//! program had nothing to report and is never cached.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Errors raised while running a [`CommandProducer`].
#[derive(thiserror::Error, Debug)]
pub enum ProducerError {
    /// The program could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        /// Program that failed
        program: String,
        /// Exit status
        status: ExitStatus,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The program's output was not valid UTF-8.
    #[error("{program} produced non UTF-8 output")]
    InvalidUtf8 {
        /// Program that produced the output
        program: String,
    },

    /// JSON normalisation was requested and the output did not parse.
    #[error("{program} produced invalid JSON: {source}")]
    InvalidJson {
        /// Program that produced the output
        program: String,
        /// The parse error
        #[source]
        source: serde_json::Error,
    },
}

/// Runs a program and returns its standard output as the cached payload.
#[derive(Debug, Clone)]
pub struct CommandProducer {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    normalize_json: bool,
    ignore_errors: bool,
}

impl CommandProducer {
    /// Create a producer for `program` with `args`.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            normalize_json: false,
            ignore_errors: false,
        }
    }

    /// Run the program from `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    /// Re-serialise the output as compact JSON before it is cached.
    #[must_use]
    pub fn normalize_json(mut self, enabled: bool) -> Self {
        self.normalize_json = enabled;
        self
    }

    /// Report failures as "no result" instead of an error.
    #[must_use]
    pub fn ignore_errors(mut self, enabled: bool) -> Self {
        self.ignore_errors = enabled;
        self
    }

    /// Run the program.
    ///
    /// Returns `Ok(None)` when the program printed nothing, or when it
    /// failed and errors are ignored.
    ///
    /// # Errors
    ///
    /// See [`ProducerError`].
    pub fn produce(&self) -> Result<Option<String>, ProducerError> {
        match self.run() {
            Ok(output) => Ok(output),
            Err(e) if self.ignore_errors => {
                log::warn!("Ignoring producer failure: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn run(&self) -> Result<Option<String>, ProducerError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        log::info!("Running {} {}", self.program, self.args.join(" "));
        let output = command.output().map_err(|source| ProducerError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ProducerError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| ProducerError::InvalidUtf8 {
            program: self.program.clone(),
        })?;
        if stdout.trim().is_empty() {
            return Ok(None);
        }

        if !self.normalize_json {
            return Ok(Some(stdout));
        }

        let value: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|source| ProducerError::InvalidJson {
                program: self.program.clone(),
                source,
            })?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(value.to_string()))
    }
}
