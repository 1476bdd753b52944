//! Kernel module unload/reload via `modprobe`.
//!
//! Unloading is best effort: a module that is already gone, in use, or
//! built into the kernel is reported but not treated as an error. Loading
//! is the part that has to work.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::{CommandError, CommandRunner, CommandSpec};

/// Errors from loading a module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleError {
    /// `modprobe` exited non-zero
    #[error("failed to load module {module} (exit {code:?}): {stderr}")]
    LoadFailed {
        module: String,
        code: Option<i32>,
        stderr: String,
    },

    /// `modprobe` could not be run
    #[error("failed to load module {module}: {source}")]
    Command {
        module: String,
        #[source]
        source: CommandError,
    },
}

/// How an unload went. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadOutcome {
    Unloaded,
    AlreadyAbsent,
    Busy,
    Builtin,
    /// Unclassified failure, carries the reason
    Failed(String),
}

impl UnloadOutcome {
    fn classify(stderr: &str) -> Self {
        let lower = stderr.to_ascii_lowercase();
        if lower.contains("not currently loaded") || lower.contains("not found") {
            Self::AlreadyAbsent
        } else if lower.contains("in use") {
            Self::Busy
        } else if lower.contains("builtin") {
            Self::Builtin
        } else {
            Self::Failed(stderr.trim().to_string())
        }
    }
}

impl fmt::Display for UnloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => f.write_str("unloaded"),
            Self::AlreadyAbsent => f.write_str("already absent"),
            Self::Busy => f.write_str("busy"),
            Self::Builtin => f.write_str("builtin"),
            Self::Failed(reason) => write!(f, "unload failed: {reason}"),
        }
    }
}

/// Reloads kernel modules.
#[derive(Clone)]
pub struct ModuleReloader {
    runner: Arc<dyn CommandRunner>,
}

impl ModuleReloader {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// `modprobe -r <module>`; never fails.
    pub async fn unload(&self, module: &str) -> UnloadOutcome {
        let spec = CommandSpec::new("modprobe").args(["-r", module]);
        let outcome = match self.runner.run(&spec).await {
            Ok(out) if out.succeeded() => UnloadOutcome::Unloaded,
            Ok(out) => UnloadOutcome::classify(&out.stderr),
            Err(e) => UnloadOutcome::Failed(e.to_string()),
        };
        debug!(module, outcome = %outcome, "Module unload");
        outcome
    }

    /// `modprobe <module>`.
    pub async fn load(&self, module: &str) -> Result<(), ModuleError> {
        let spec = CommandSpec::new("modprobe").arg(module);
        let out = self
            .runner
            .run(&spec)
            .await
            .map_err(|source| ModuleError::Command {
                module: module.to_string(),
                source,
            })?;
        if out.succeeded() {
            Ok(())
        } else {
            Err(ModuleError::LoadFailed {
                module: module.to_string(),
                code: out.status,
                stderr: out.stderr.trim().to_string(),
            })
        }
    }

    /// Unloads then loads `module`. Only the load can fail.
    pub async fn reload(&self, module: &str) -> Result<UnloadOutcome, ModuleError> {
        let unload = self.unload(module).await;
        if let UnloadOutcome::Failed(reason) = &unload {
            warn!(module, reason = %reason, "Unload failed, reloading anyway");
        }
        self.load(module).await?;
        info!(module, unload = %unload, "Module reloaded");
        Ok(unload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, ScriptedRunner};

    #[test]
    fn test_classify_unload_stderr() {
        assert_eq!(
            UnloadOutcome::classify("modprobe: FATAL: Module button is not currently loaded."),
            UnloadOutcome::AlreadyAbsent
        );
        assert_eq!(
            UnloadOutcome::classify("modprobe: FATAL: Module button not found in directory"),
            UnloadOutcome::AlreadyAbsent
        );
        assert_eq!(
            UnloadOutcome::classify("modprobe: FATAL: Module button is in use."),
            UnloadOutcome::Busy
        );
        assert_eq!(
            UnloadOutcome::classify("modprobe: FATAL: Module button is builtin."),
            UnloadOutcome::Builtin
        );
        assert!(matches!(UnloadOutcome::classify("weird"), UnloadOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_reload_tolerates_absent() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            "modprobe",
            &["-r"],
            Ok(CommandOutput::failure(1, "Module button is not currently loaded")),
        );
        runner.on("modprobe", &[], Ok(CommandOutput::success("")));
        let reloader = ModuleReloader::new(runner.clone());

        assert_eq!(reloader.reload("button").await, Ok(UnloadOutcome::AlreadyAbsent));
        assert_eq!(
            runner.command_lines(),
            vec!["modprobe -r button".to_string(), "modprobe button".to_string()]
        );
    }

    #[tokio::test]
    async fn test_reload_load_failure_surfaces() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("modprobe", &["-r"], Ok(CommandOutput::success("")));
        runner.on(
            "modprobe",
            &[],
            Ok(CommandOutput::failure(1, "could not insert 'button'")),
        );
        let err = ModuleReloader::new(runner).reload("button").await.unwrap_err();
        assert!(matches!(err, ModuleError::LoadFailed { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_reload_without_modprobe() {
        let runner = Arc::new(ScriptedRunner::new());
        let err = ModuleReloader::new(runner).reload("button").await.unwrap_err();
        assert!(matches!(err, ModuleError::Command { .. }));
    }
}
