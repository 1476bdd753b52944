//! Session-bus shell re-exec.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lidguard_core::RefreshOutcome;
use lidguard_sys::{CommandError, CommandOutput, CommandRunner, CommandSpec, SessionEnv};
use tracing::debug;

use super::RefreshStrategy;
use crate::config::RefreshConfig;

/// Extra time the outer deadline gives gdbus to report its own timeout.
const OUTER_DEADLINE_GRACE: Duration = Duration::from_secs(1);

/// gdbus error text that means "the shell went away without answering".
const NO_REPLY_MARKERS: &[&str] = &[
    "Timeout was reached",
    "NoReply",
    "Remote peer disconnected",
];

/// Calls the shell's `Eval` method with a self re-exec expression.
pub struct ShellEvalRestart {
    runner: Arc<dyn CommandRunner>,
    session: SessionEnv,
    bus_name: String,
    object_path: String,
    method: String,
    expression: String,
    timeout: Duration,
}

impl ShellEvalRestart {
    pub fn new(runner: Arc<dyn CommandRunner>, session: SessionEnv, config: &RefreshConfig) -> Self {
        Self {
            runner,
            session,
            bus_name: config.bus_name.clone(),
            object_path: config.object_path.clone(),
            method: config.method.clone(),
            expression: config.expression.clone(),
            timeout: config.call_timeout(),
        }
    }

    fn spec(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("gdbus")
            .args(["call", "--session", "--timeout"])
            .arg(self.timeout.as_secs().to_string())
            .args(["--dest", self.bus_name.as_str()])
            .args(["--object-path", self.object_path.as_str()])
            .args(["--method", self.method.as_str()])
            .arg(self.expression.as_str())
            .timeout(self.timeout + OUTER_DEADLINE_GRACE);
        for (key, value) in self.session.env_pairs() {
            spec = spec.env(key, value);
        }
        spec
    }

    fn classify(result: Result<CommandOutput, CommandError>) -> RefreshOutcome {
        match result {
            Err(CommandError::TimedOut { .. }) => RefreshOutcome::TimedOut,
            Err(e) => RefreshOutcome::Failed {
                reason: e.to_string(),
            },
            Ok(out) if out.succeeded() => {
                let reply = out.stdout.trim();
                if reply.starts_with("(true") {
                    RefreshOutcome::Succeeded
                } else {
                    RefreshOutcome::Failed {
                        reason: format!("shell declined: {reply}"),
                    }
                }
            }
            Ok(out) => {
                if NO_REPLY_MARKERS.iter().any(|m| out.stderr.contains(m)) {
                    RefreshOutcome::TimedOut
                } else {
                    RefreshOutcome::Failed {
                        reason: format!("exit {:?}: {}", out.status, out.stderr.trim()),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl RefreshStrategy for ShellEvalRestart {
    fn id(&self) -> &str {
        "shell-eval-restart"
    }

    fn timeout_counts_as_success(&self) -> bool {
        true
    }

    async fn attempt(&self) -> RefreshOutcome {
        let spec = self.spec();
        debug!(command = %spec, runtime_dir = %self.session.runtime_dir().display(), "Asking shell to re-exec");
        Self::classify(self.runner.run(&spec).await)
    }
}
