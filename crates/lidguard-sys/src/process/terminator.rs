//! Terminator that refuses protected process names.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use super::{ProcessSignaller, Signal, SignalError};

/// How often to check whether a terminated process has gone.
pub const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Errors from a termination request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TerminateError {
    /// Name is on the protected list; no signal was sent
    #[error("refusing to terminate protected process {0}")]
    Protected(String),

    /// Nothing by that name is running
    #[error("no running process named {0}")]
    NotRunning(String),

    /// Delivery failed
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// What happened after SIGTERM was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// All matching processes exited within the wait
    Exited { signalled: usize },
    /// Still running when the wait ran out
    StillRunning { signalled: usize },
}

/// Sends SIGTERM by name, except to protected names.
#[derive(Clone)]
pub struct SelectiveTerminator {
    signaller: Arc<dyn ProcessSignaller>,
    protected: Vec<String>,
}

impl SelectiveTerminator {
    pub fn new(signaller: Arc<dyn ProcessSignaller>, protected: Vec<String>) -> Self {
        Self {
            signaller,
            protected,
        }
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.iter().any(|p| p == name)
    }

    /// Terminates `name` and waits up to `wait` for it to exit.
    pub async fn terminate(
        &self,
        name: &str,
        wait: Duration,
    ) -> Result<TerminateOutcome, TerminateError> {
        if self.is_protected(name) {
            warn!(name, "Termination of protected process refused");
            return Err(TerminateError::Protected(name.to_string()));
        }

        let signalled = self.signaller.signal_by_name(name, Signal::Terminate)?;
        if signalled == 0 {
            return Err(TerminateError::NotRunning(name.to_string()));
        }
        info!(name, signalled, "Sent SIGTERM");

        let deadline = Instant::now() + wait;
        loop {
            if !self.signaller.is_running(name) {
                return Ok(TerminateOutcome::Exited { signalled });
            }
            if Instant::now() >= deadline {
                return Ok(TerminateOutcome::StillRunning { signalled });
            }
            sleep(TERMINATE_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingSignaller;

    fn terminator(signaller: Arc<RecordingSignaller>) -> SelectiveTerminator {
        SelectiveTerminator::new(signaller, vec!["gsd-media-keys".to_string()])
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_exits() {
        let signaller = Arc::new(RecordingSignaller::new());
        signaller.spawn("gsd-power", 1);
        let outcome = terminator(signaller.clone())
            .terminate("gsd-power", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome, TerminateOutcome::Exited { signalled: 1 });
        assert_eq!(signaller.calls(), vec![("gsd-power".to_string(), Signal::Terminate)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_stubborn_times_out() {
        let signaller = Arc::new(RecordingSignaller::new());
        signaller.spawn("gsd-power", 2);
        signaller.ignore_terminate("gsd-power");
        let start = Instant::now();
        let outcome = terminator(signaller)
            .terminate("gsd-power", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome, TerminateOutcome::StillRunning { signalled: 2 });
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_protected_never_signalled() {
        let signaller = Arc::new(RecordingSignaller::new());
        signaller.spawn("gsd-media-keys", 1);
        let err = terminator(signaller.clone())
            .terminate("gsd-media-keys", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err, TerminateError::Protected("gsd-media-keys".to_string()));
        assert!(signaller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_not_running() {
        let signaller = Arc::new(RecordingSignaller::new());
        let err = terminator(signaller)
            .terminate("gsd-power", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err, TerminateError::NotRunning("gsd-power".to_string()));
    }
}
