//! SIGHUP fallback for the shell.

use std::sync::Arc;

use async_trait::async_trait;
use lidguard_core::RefreshOutcome;
use lidguard_sys::{ProcessSignaller, Signal};

use super::RefreshStrategy;

/// Sends SIGHUP to every process named after the shell.
pub struct ShellSignalReload {
    signaller: Arc<dyn ProcessSignaller>,
    process_name: String,
}

impl ShellSignalReload {
    pub fn new(signaller: Arc<dyn ProcessSignaller>, process_name: String) -> Self {
        Self {
            signaller,
            process_name,
        }
    }
}

#[async_trait]
impl RefreshStrategy for ShellSignalReload {
    fn id(&self) -> &str {
        "shell-signal-reload"
    }

    async fn attempt(&self) -> RefreshOutcome {
        match self.signaller.signal_by_name(&self.process_name, Signal::Hangup) {
            Ok(0) => RefreshOutcome::Failed {
                reason: format!("no process named {}", self.process_name),
            },
            Ok(_) => RefreshOutcome::Succeeded,
            Err(e) => RefreshOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidguard_sys::process::RecordingSignaller;

    #[tokio::test]
    async fn test_delivered() {
        let signaller = Arc::new(RecordingSignaller::new());
        signaller.spawn("gnome-shell", 1);
        let strategy = ShellSignalReload::new(signaller.clone(), "gnome-shell".to_string());
        assert_eq!(strategy.attempt().await, RefreshOutcome::Succeeded);
        assert_eq!(signaller.calls(), vec![("gnome-shell".to_string(), Signal::Hangup)]);
        // SIGHUP leaves the shell running
        assert!(signaller.is_running("gnome-shell"));
    }

    #[tokio::test]
    async fn test_no_shell_running() {
        let signaller = Arc::new(RecordingSignaller::new());
        let strategy = ShellSignalReload::new(signaller, "gnome-shell".to_string());
        assert!(matches!(strategy.attempt().await, RefreshOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_refused() {
        let signaller = Arc::new(RecordingSignaller::new());
        signaller.spawn("gnome-shell", 1);
        signaller.refuse("gnome-shell");
        let strategy = ShellSignalReload::new(signaller, "gnome-shell".to_string());
        assert!(matches!(strategy.attempt().await, RefreshOutcome::Failed { .. }));
    }
}
