//! Post-resume recovery orchestrator.
//!
//! Run once per resume event, as root. Every step is logged and recorded
//! in a [`RecoveryReport`]; a failing step never stops the ones after it.
//!
//! 1. log the lid state
//! 2. scan for block-mode sleep inhibitors held by the watched owners
//! 3. terminate the power owner if it is one of them (the media-key owner
//!    is never touched)
//! 4. unload and reload each configured kernel module
//! 5. re-log the lid state and re-scan; warn if the power owner still blocks

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lidguard_core::{
    DomainError, InhibitorRecord, OwnerRole, RecoveryReport, RecoveryStepResult, WatchSet,
};
use lidguard_sys::{
    CommandRunner, ElevatedSession, InhibitorScanner, LidSource, ModuleReloader, PrivilegeError,
    ProcessSignaller, SelectiveTerminator, TerminateError, TerminateOutcome,
};
use tracing::{error, info, warn};

use crate::config::RecoveryConfig;

/// Step names as they appear in reports.
pub mod steps {
    pub const LOG_LID_STATE: &str = "log-lid-state";
    pub const SCAN_INHIBITORS: &str = "scan-inhibitors";
    pub const TERMINATE_POWER_OWNER: &str = "terminate-power-owner";
    pub const RELOAD_MODULE: &str = "reload-module";
    pub const RECHECK_LID_STATE: &str = "recheck-lid-state";
    pub const RECHECK_INHIBITORS: &str = "recheck-inhibitors";
}

/// Runs the post-resume recovery sequence.
pub struct RecoveryOrchestrator {
    lid: Arc<dyn LidSource>,
    watch: WatchSet,
    scanner: InhibitorScanner,
    terminator: SelectiveTerminator,
    reloader: ModuleReloader,
    modules: Vec<String>,
    terminate_wait: Duration,
}

impl RecoveryOrchestrator {
    /// Builds the orchestrator from its collaborators.
    ///
    /// The media-key owner is put on the terminator's protected list, so it
    /// can't be signalled even if the policy below were wrong.
    pub fn new(
        lid: Arc<dyn LidSource>,
        runner: Arc<dyn CommandRunner>,
        signaller: Arc<dyn ProcessSignaller>,
        config: &RecoveryConfig,
    ) -> Result<Self, DomainError> {
        let watch = config.watch_set()?;
        let terminator =
            SelectiveTerminator::new(signaller, vec![watch.media_key_owner().to_string()]);
        Ok(Self {
            lid,
            scanner: InhibitorScanner::new(Arc::clone(&runner), watch.clone()),
            watch,
            terminator,
            reloader: ModuleReloader::new(runner),
            modules: config.modules.clone(),
            terminate_wait: config.terminate_wait(),
        })
    }

    /// Acquires privilege and runs. Fails fast if not root.
    pub async fn run_elevated(&self) -> Result<RecoveryReport, PrivilegeError> {
        let session = ElevatedSession::acquire()?;
        Ok(self.run(&session).await)
    }

    /// Runs every step. Always completes; check the report for failures.
    pub async fn run(&self, _session: &ElevatedSession) -> RecoveryReport {
        let mut report = RecoveryReport::new(Utc::now());
        info!(modules = ?self.modules, "Post-resume recovery starting");

        report.push(self.log_lid_state(steps::LOG_LID_STATE));

        let (scan_step, blockers) = self.scan(steps::SCAN_INHIBITORS).await;
        report.push(scan_step);

        report.push(self.handle_blockers(&blockers).await);

        for module in &self.modules {
            report.push(self.reload_module(module).await);
        }

        report.push(self.log_lid_state(steps::RECHECK_LID_STATE));

        let (mut recheck, blockers) = self.scan(steps::RECHECK_INHIBITORS).await;
        if blockers.iter().any(|r| r.role == OwnerRole::Power) {
            warn!(
                owner = self.watch.power_owner(),
                "Power owner still inhibiting sleep after recovery; giving up for this run"
            );
            report.power_owner_still_inhibiting = true;
            recheck = RecoveryStepResult::failed(
                steps::RECHECK_INHIBITORS,
                format!("{} still inhibiting sleep", self.watch.power_owner()),
            );
        }
        report.push(recheck);

        info!(
            failed_steps = report.failed_steps(),
            clean = report.is_clean(),
            "Post-resume recovery finished"
        );
        report
    }

    fn log_lid_state(&self, step: &str) -> RecoveryStepResult {
        let state = self.lid.read();
        info!(step, lid = %state, "Lid state");
        if state.is_known() {
            RecoveryStepResult::ok(step, format!("lid {state}"))
        } else {
            RecoveryStepResult::failed(step, "lid state unavailable")
        }
    }

    async fn scan(&self, step: &str) -> (RecoveryStepResult, Vec<InhibitorRecord>) {
        match self.scanner.scan_sleep_blockers().await {
            Ok(blockers) => {
                for record in &blockers {
                    info!(owner = %record.owner, scope = %record.scope, mode = %record.mode, "Sleep inhibitor");
                }
                let owners: Vec<&str> = blockers.iter().map(|r| r.owner.as_str()).collect();
                let message = if owners.is_empty() {
                    "no watched sleep blockers".to_string()
                } else {
                    format!("sleep blocked by {}", owners.join(", "))
                };
                (RecoveryStepResult::ok(step, message), blockers)
            }
            Err(e) => {
                error!(step, error = %e, "Inhibitor scan failed");
                (RecoveryStepResult::failed(step, e.to_string()), Vec::new())
            }
        }
    }

    /// Terminates the power owner if it blocks sleep. Never touches the
    /// media-key owner.
    async fn handle_blockers(&self, blockers: &[InhibitorRecord]) -> RecoveryStepResult {
        let step = steps::TERMINATE_POWER_OWNER;

        if blockers.iter().any(|r| r.role == OwnerRole::MediaKeys) {
            info!(
                owner = self.watch.media_key_owner(),
                "Media-key owner is inhibiting sleep; leaving it alone"
            );
        }

        if !blockers.iter().any(|r| r.role == OwnerRole::Power) {
            return RecoveryStepResult::ok(step, "power owner not inhibiting");
        }

        let name = self.watch.power_owner();
        match self.terminator.terminate(name, self.terminate_wait).await {
            Ok(TerminateOutcome::Exited { signalled }) => {
                info!(name, signalled, "Power owner exited");
                RecoveryStepResult::ok(step, format!("{name} terminated"))
            }
            Ok(TerminateOutcome::StillRunning { signalled }) => {
                warn!(name, signalled, "Power owner still running after SIGTERM");
                RecoveryStepResult::failed(
                    step,
                    format!("{name} still running after {}ms", self.terminate_wait.as_millis()),
                )
            }
            Err(e @ TerminateError::NotRunning(_)) => {
                warn!(name, "Power owner listed as inhibitor but no process found");
                RecoveryStepResult::failed(step, e.to_string())
            }
            Err(e) => {
                error!(name, error = %e, "Failed to terminate power owner");
                RecoveryStepResult::failed(step, e.to_string())
            }
        }
    }

    async fn reload_module(&self, module: &str) -> RecoveryStepResult {
        let step = format!("{}:{module}", steps::RELOAD_MODULE);
        match self.reloader.reload(module).await {
            Ok(unload) => RecoveryStepResult::ok(step, format!("unload {unload}; loaded")),
            Err(e) => {
                error!(module, error = %e, "Module reload failed");
                RecoveryStepResult::failed(step, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidguard_core::LidState;
    use lidguard_sys::command::{CommandOutput, ScriptedRunner};
    use lidguard_sys::process::RecordingSignaller;

    struct FixedLid(LidState);

    impl LidSource for FixedLid {
        fn read(&self) -> LidState {
            self.0
        }
        fn is_available(&self) -> bool {
            self.0.is_known()
        }
    }

    #[tokio::test]
    async fn test_clean_run_without_inhibitors() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("systemd-inhibit", &["--list"], Ok(CommandOutput::success("WHO UID\n")));
        runner.on("modprobe", &[], Ok(CommandOutput::success("")));
        let signaller = Arc::new(RecordingSignaller::new());

        let orchestrator = RecoveryOrchestrator::new(
            Arc::new(FixedLid(LidState::Open)),
            runner,
            signaller.clone(),
            &RecoveryConfig::default(),
        )
        .unwrap();
        let session = ElevatedSession::acquire_as(0).unwrap();
        let report = orchestrator.run(&session).await;

        assert!(report.is_clean(), "{report:?}");
        assert!(signaller.calls().is_empty());
        assert_eq!(
            report.outcomes(),
            vec![
                (steps::LOG_LID_STATE, true),
                (steps::SCAN_INHIBITORS, true),
                (steps::TERMINATE_POWER_OWNER, true),
                ("reload-module:button", true),
                (steps::RECHECK_LID_STATE, true),
                (steps::RECHECK_INHIBITORS, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_lid_is_logged_not_fatal() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("systemd-inhibit", &["--list"], Ok(CommandOutput::success("")));
        runner.on("modprobe", &[], Ok(CommandOutput::success("")));
        let orchestrator = RecoveryOrchestrator::new(
            Arc::new(FixedLid(LidState::Unknown)),
            runner,
            Arc::new(RecordingSignaller::new()),
            &RecoveryConfig::default(),
        )
        .unwrap();
        let session = ElevatedSession::acquire_as(0).unwrap();
        let report = orchestrator.run(&session).await;
        assert_eq!(report.failed_steps(), 2);
        assert_eq!(report.steps.len(), 6);
    }
}
