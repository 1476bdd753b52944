//! Subprocess execution.
//!
//! Every external tool goes through a [`CommandRunner`] so that agents can
//! be tested against scripted output. The real runner uses
//! `tokio::process` with `kill_on_drop`, and enforces the deadline carried
//! by the [`CommandSpec`].

use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, trace};

#[cfg(any(test, feature = "testing"))]
mod scripted;
#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedRunner;

// ============================================================================
// Constants
// ============================================================================

/// Deadline applied to commands unless the caller overrides it.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Error Types
// ============================================================================

/// Errors from launching or waiting on a subprocess.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Executable not on PATH
    #[error("command not found: {program}")]
    NotFound { program: String },

    /// Deadline expired before the process exited
    #[error("{program} timed out after {}ms", after.as_millis())]
    TimedOut { program: String, after: Duration },

    /// Any other spawn or wait failure
    #[error("{program} failed to run: {message}")]
    Io { program: String, message: String },
}

impl CommandError {
    fn from_io(program: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                program: program.to_string(),
            }
        } else {
            Self::Io {
                program: program.to_string(),
                message: err.to_string(),
            }
        }
    }
}

// ============================================================================
// Command Spec / Output
// ============================================================================

/// A command line plus its environment and deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// `None` means wait indefinitely
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Some(DEFAULT_COMMAND_TIMEOUT),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the deadline. Only the suspend call should need this.
    #[must_use]
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Exit 0 with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Non-zero exit with the given stderr.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Runs external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion, honouring `spec.timeout`.
    ///
    /// A non-zero exit is *not* an error; inspect [`CommandOutput::status`].
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealCommandRunner;

#[async_trait]
impl CommandRunner for RealCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec, "Running command");

        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match spec.timeout {
            Some(after) => match tokio::time::timeout(after, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(CommandError::TimedOut {
                        program: spec.program.clone(),
                        after,
                    })
                }
            },
            None => cmd.output().await,
        }
        .map_err(|e| CommandError::from_io(&spec.program, e))?;

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!(command = %spec, status = ?result.status, "Command finished");
        Ok(result)
    }
}
