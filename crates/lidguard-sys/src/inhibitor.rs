//! Power-inhibitor registry scanner.

use std::sync::Arc;

use lidguard_core::{parse_inhibitor_list, InhibitorRecord, WatchSet};
use thiserror::Error;
use tracing::debug;

use crate::command::{CommandError, CommandRunner, CommandSpec};

/// Errors from querying the inhibitor registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    /// `systemd-inhibit` not installed
    #[error("inhibitor query tool missing: {0}")]
    ToolMissing(String),

    /// Query exited non-zero
    #[error("inhibitor query failed (exit {code:?}): {stderr}")]
    QueryFailed { code: Option<i32>, stderr: String },

    /// Spawn/timeout failure
    #[error(transparent)]
    Command(CommandError),
}

impl From<CommandError> for ScanError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound { program } => Self::ToolMissing(program),
            other => Self::Command(other),
        }
    }
}

/// Lists inhibitors held by the watched owners.
#[derive(Clone)]
pub struct InhibitorScanner {
    runner: Arc<dyn CommandRunner>,
    watch: WatchSet,
}

impl InhibitorScanner {
    pub fn new(runner: Arc<dyn CommandRunner>, watch: WatchSet) -> Self {
        Self { runner, watch }
    }

    pub fn watch(&self) -> &WatchSet {
        &self.watch
    }

    /// Returns every record that mentions a watched owner.
    pub async fn scan(&self) -> Result<Vec<InhibitorRecord>, ScanError> {
        let spec = CommandSpec::new("systemd-inhibit").args(["--list", "--no-pager"]);
        let output = self.runner.run(&spec).await?;
        if !output.succeeded() {
            return Err(ScanError::QueryFailed {
                code: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        let records = parse_inhibitor_list(&output.stdout, &self.watch);
        debug!(count = records.len(), "Watched inhibitors found");
        Ok(records)
    }

    /// Like [`scan`](Self::scan), keeping only block-mode sleep inhibitors.
    pub async fn scan_sleep_blockers(&self) -> Result<Vec<InhibitorRecord>, ScanError> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter(InhibitorRecord::blocks_sleep)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, ScriptedRunner};
    use lidguard_core::OwnerRole;

    const LISTING: &str = "\
WHO            UID  USER PID  COMM           WHAT              WHY                          MODE
gsd-power      1000 kai  2100 gsd-power      sleep             GNOME needs to lock screen   block
gsd-media-keys 1000 kai  2098 gsd-media-keys handle-power-key  GNOME handling keypresses    block
gsd-media-keys 1000 kai  2098 gsd-media-keys sleep             GNOME handling keypresses    delay

3 inhibitors listed.
";

    #[tokio::test]
    async fn test_scan_and_filter() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("systemd-inhibit", &["--list"], Ok(CommandOutput::success(LISTING)));
        let scanner = InhibitorScanner::new(runner, WatchSet::default());

        assert_eq!(scanner.scan().await.unwrap().len(), 3);
        let blockers = scanner.scan_sleep_blockers().await.unwrap();
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].role, OwnerRole::Power);
    }

    #[tokio::test]
    async fn test_scan_tool_missing() {
        let runner = Arc::new(ScriptedRunner::new());
        let scanner = InhibitorScanner::new(runner, WatchSet::default());
        assert_eq!(
            scanner.scan().await.unwrap_err(),
            ScanError::ToolMissing("systemd-inhibit".to_string())
        );
    }

    #[tokio::test]
    async fn test_scan_query_failed() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            "systemd-inhibit",
            &["--list"],
            Ok(CommandOutput::failure(1, "Failed to connect to bus")),
        );
        let scanner = InhibitorScanner::new(runner, WatchSet::default());
        assert!(matches!(
            scanner.scan().await,
            Err(ScanError::QueryFailed { code: Some(1), .. })
        ));
    }
}
