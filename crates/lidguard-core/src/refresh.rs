//! Shell refresh attempt records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened when a strategy ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RefreshOutcome {
    /// Explicit success
    Succeeded,

    /// No reply before the deadline
    TimedOut,

    /// Definite failure
    Failed { reason: String },
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// One strategy invocation within a refresh chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshAttempt {
    /// Strategy identifier
    pub strategy: String,
    /// Raw outcome
    pub outcome: RefreshOutcome,
    /// Whether this strategy treats a timeout as success
    pub timeout_counts_as_success: bool,
}

impl RefreshAttempt {
    /// Applies the strategy's timeout policy to the outcome.
    pub fn counts_as_success(&self) -> bool {
        match self.outcome {
            RefreshOutcome::Succeeded => true,
            RefreshOutcome::TimedOut => self.timeout_counts_as_success,
            RefreshOutcome::Failed { .. } => false,
        }
    }
}

/// Result of running the whole chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Attempts in the order they ran
    pub attempts: Vec<RefreshAttempt>,
}

impl RefreshReport {
    /// True if any attempt counted as success.
    pub fn succeeded(&self) -> bool {
        self.attempts.iter().any(RefreshAttempt::counts_as_success)
    }

    /// The attempt that won, if any.
    pub fn winner(&self) -> Option<&RefreshAttempt> {
        self.attempts.iter().find(|a| a.counts_as_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(outcome: RefreshOutcome, timeout_ok: bool) -> RefreshAttempt {
        RefreshAttempt {
            strategy: "test".to_string(),
            outcome,
            timeout_counts_as_success: timeout_ok,
        }
    }

    #[test]
    fn test_timeout_policy() {
        assert!(attempt(RefreshOutcome::TimedOut, true).counts_as_success());
        assert!(!attempt(RefreshOutcome::TimedOut, false).counts_as_success());
    }

    #[test]
    fn test_failure_never_counts() {
        let a = attempt(
            RefreshOutcome::Failed {
                reason: "no".to_string(),
            },
            true,
        );
        assert!(!a.counts_as_success());
    }

    #[test]
    fn test_report_winner() {
        let report = RefreshReport {
            attempts: vec![
                attempt(
                    RefreshOutcome::Failed {
                        reason: "denied".to_string(),
                    },
                    true,
                ),
                attempt(RefreshOutcome::Succeeded, false),
            ],
        };
        assert!(report.succeeded());
        assert_eq!(
            report.winner().map(|a| &a.outcome),
            Some(&RefreshOutcome::Succeeded)
        );
        assert!(!RefreshReport::default().succeeded());
    }

    #[test]
    fn test_outcome_display() {
        let failed = RefreshOutcome::Failed {
            reason: "exit 1".to_string(),
        };
        assert_eq!(failed.to_string(), "failed: exit 1");
    }
}
