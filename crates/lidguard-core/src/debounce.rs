//! Lid-close debounce state machine.
//!
//! The monitor feeds every reading into a [`Debouncer`], which decides when
//! enough consecutive `Closed` readings have been seen to force a suspend.
//!
//! ```text
//!            Closed                 Closed (n+1 >= threshold)
//!   Open ─────────────▶ ClosedPending(1) ─ ─ ─ ─ ─ ─ ─▶ Trigger
//!    ▲                      │    ▲
//!    │        Open          │    │ Unknown (hold)
//!    └──────────────────────┘────┘
//! ```
//!
//! An `Unknown` reading neither advances nor resets the count, so a transient
//! read gap during a module reload can't erase an in-progress detection.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::lid::LidState;

/// Default number of consecutive closed readings before suspend.
pub const DEFAULT_CLOSE_THRESHOLD: u32 = 2;

/// Debounce state as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// No close in progress
    Open,

    /// `n` consecutive closed readings observed (n >= 1)
    ClosedPending(u32),
}

/// What the monitor should do after a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    /// Lid open, counter cleared
    Reset,

    /// Closed, but below threshold; carries the current count
    Pending(u32),

    /// Threshold reached, suspend now
    Trigger,

    /// Unknown reading, nothing changed; back off before resampling
    Hold,
}

/// Counts consecutive closed readings.
#[derive(Debug, Clone)]
pub struct Debouncer {
    state: MonitorState,
    threshold: u32,
}

impl Debouncer {
    /// Creates a debouncer that triggers after `threshold` closed readings.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidThreshold` if `threshold` is zero.
    pub fn new(threshold: u32) -> DomainResult<Self> {
        if threshold == 0 {
            return Err(DomainError::InvalidThreshold(threshold));
        }
        Ok(Self {
            state: MonitorState::Open,
            threshold,
        })
    }

    /// Feeds one reading into the state machine.
    pub fn observe(&mut self, reading: LidState) -> DebounceDecision {
        match reading {
            LidState::Open => {
                self.state = MonitorState::Open;
                DebounceDecision::Reset
            }
            LidState::Unknown => DebounceDecision::Hold,
            LidState::Closed => {
                let n = self.counter().saturating_add(1);
                self.state = MonitorState::ClosedPending(n);
                if n >= self.threshold {
                    DebounceDecision::Trigger
                } else {
                    DebounceDecision::Pending(n)
                }
            }
        }
    }

    /// Clears the counter. Called after every suspend attempt, win or lose.
    pub fn reset(&mut self) {
        self.state = MonitorState::Open;
    }

    /// Current state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Number of consecutive closed readings seen so far.
    pub fn counter(&self) -> u32 {
        match self.state {
            MonitorState::Open => 0,
            MonitorState::ClosedPending(n) => n,
        }
    }

    /// Configured threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self {
            state: MonitorState::Open,
            threshold: DEFAULT_CLOSE_THRESHOLD,
        }
    }
}
