//! Audit records for a post-resume recovery run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one recovery step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStepResult {
    /// Step name, e.g. `scan-inhibitors` or `reload-module:button`
    pub step: String,
    /// Whether the step did what it set out to do
    pub succeeded: bool,
    /// Human-readable detail
    pub message: String,
}

impl RecoveryStepResult {
    pub fn ok(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            succeeded: false,
            message: message.into(),
        }
    }
}

/// Full trail of one recovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Steps in execution order
    pub steps: Vec<RecoveryStepResult>,
    /// Power owner was still blocking sleep at the final re-check
    pub power_owner_still_inhibiting: bool,
}

impl RecoveryReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            steps: Vec::new(),
            power_owner_still_inhibiting: false,
        }
    }

    pub fn push(&mut self, result: RecoveryStepResult) {
        self.steps.push(result);
    }

    /// Number of failed steps.
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.succeeded).count()
    }

    /// True if every step succeeded and nothing is left inhibiting.
    pub fn is_clean(&self) -> bool {
        self.failed_steps() == 0 && !self.power_owner_still_inhibiting
    }

    /// Step outcomes without the timestamp, for comparing runs.
    pub fn outcomes(&self) -> Vec<(&str, bool)> {
        self.steps
            .iter()
            .map(|s| (s.step.as_str(), s.succeeded))
            .collect()
    }
}
