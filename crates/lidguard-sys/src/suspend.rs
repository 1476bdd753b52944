//! Suspend request.
//!
//! Uses `systemctl suspend --ignore-inhibitors`, which goes straight past
//! any block-mode inhibitor. On success the call may not return until the
//! machine has been through a full suspend/resume cycle.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandRunner, CommandSpec};

/// Errors from a suspend request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SuspendError {
    /// Power command not installed
    #[error("suspend command unavailable: {0}")]
    CommandUnavailable(String),

    /// OS declined the request
    #[error("suspend rejected (exit {code:?}): {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// Anything else
    #[error("suspend failed: {0}")]
    Unknown(String),
}

impl From<CommandError> for SuspendError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound { program } => Self::CommandUnavailable(program),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Puts the machine to sleep.
#[async_trait]
pub trait Suspender: Send + Sync {
    async fn suspend(&self) -> Result<(), SuspendError>;
}

/// Suspends through systemd.
#[derive(Clone)]
pub struct SystemdSuspend {
    runner: Arc<dyn CommandRunner>,
}

impl SystemdSuspend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn spec() -> CommandSpec {
        // No deadline: the call legitimately blocks across the whole sleep
        CommandSpec::new("systemctl")
            .args(["suspend", "--ignore-inhibitors"])
            .no_timeout()
    }
}

#[async_trait]
impl Suspender for SystemdSuspend {
    async fn suspend(&self) -> Result<(), SuspendError> {
        info!("Requesting suspend (ignoring inhibitors)");
        let output = self.runner.run(&Self::spec()).await?;
        if output.succeeded() {
            Ok(())
        } else {
            Err(SuspendError::NonZeroExit {
                code: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, ScriptedRunner};

    #[tokio::test]
    async fn test_suspend_success() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("systemctl", &["suspend"], Ok(CommandOutput::success("")));
        let suspend = SystemdSuspend::new(runner.clone());
        assert!(suspend.suspend().await.is_ok());

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to_string(), "systemctl suspend --ignore-inhibitors");
        assert_eq!(calls[0].timeout, None);
    }

    #[tokio::test]
    async fn test_suspend_rejected() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            "systemctl",
            &["suspend"],
            Ok(CommandOutput::failure(1, "Access denied\n")),
        );
        let err = SystemdSuspend::new(runner).suspend().await.unwrap_err();
        assert_eq!(
            err,
            SuspendError::NonZeroExit {
                code: Some(1),
                stderr: "Access denied".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_suspend_tool_missing() {
        let runner = Arc::new(ScriptedRunner::new());
        let err = SystemdSuspend::new(runner).suspend().await.unwrap_err();
        assert_eq!(err, SuspendError::CommandUnavailable("systemctl".to_string()));
    }
}
