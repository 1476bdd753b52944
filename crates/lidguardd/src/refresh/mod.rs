//! Desktop shell refresh chain.
//!
//! An ordered list of interchangeable strategies; the first one whose
//! outcome counts as success wins. The standard chain is:
//!
//! 1. [`ShellEvalRestart`] - ask the shell over the session bus to
//!    re-exec itself. A timeout counts as success because a shell that
//!    really restarts never gets to reply.
//! 2. [`ShellSignalReload`] - SIGHUP the shell process by name.

use std::sync::Arc;

use async_trait::async_trait;
use lidguard_core::{RefreshAttempt, RefreshOutcome, RefreshReport};
use lidguard_sys::{CommandRunner, ProcessSignaller, SessionEnv};
use tracing::{error, info, warn};

use crate::config::RefreshConfig;

mod eval;
mod signal;

pub use eval::ShellEvalRestart;
pub use signal::ShellSignalReload;

/// One way of restarting the desktop shell.
#[async_trait]
pub trait RefreshStrategy: Send + Sync {
    /// Short identifier used in logs and reports.
    fn id(&self) -> &str;

    /// Whether a timeout means the refresh worked.
    fn timeout_counts_as_success(&self) -> bool {
        false
    }

    async fn attempt(&self) -> RefreshOutcome;
}

/// Runs strategies in order until one succeeds.
pub struct RefreshChain {
    strategies: Vec<Box<dyn RefreshStrategy>>,
}

impl RefreshChain {
    pub fn new(strategies: Vec<Box<dyn RefreshStrategy>>) -> Self {
        Self { strategies }
    }

    /// Session-bus re-exec, then SIGHUP.
    pub fn standard(
        runner: Arc<dyn CommandRunner>,
        signaller: Arc<dyn ProcessSignaller>,
        session: SessionEnv,
        config: &RefreshConfig,
    ) -> Self {
        Self::new(vec![
            Box::new(ShellEvalRestart::new(runner, session, config)),
            Box::new(ShellSignalReload::new(signaller, config.shell_process.clone())),
        ])
    }

    pub fn strategy_ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    pub async fn run(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        for strategy in &self.strategies {
            let outcome = strategy.attempt().await;
            let attempt = RefreshAttempt {
                strategy: strategy.id().to_string(),
                outcome,
                timeout_counts_as_success: strategy.timeout_counts_as_success(),
            };
            let won = attempt.counts_as_success();
            if won {
                info!(strategy = %attempt.strategy, outcome = %attempt.outcome, "Shell refresh succeeded");
            } else {
                warn!(strategy = %attempt.strategy, outcome = %attempt.outcome, "Shell refresh strategy failed");
            }
            report.attempts.push(attempt);
            if won {
                return report;
            }
        }

        error!(attempts = report.attempts.len(), "All shell refresh strategies failed");
        report
    }
}
