//! Signal delivery by process name.
//!
//! Lookup uses `sysinfo` with exact name matching (the kernel's `comm`,
//! truncated to 15 bytes), and delivery goes through `sysinfo`'s
//! `kill_with`.

use std::ffi::OsStr;
use std::fmt;

use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::{debug, warn};

mod terminator;
pub use terminator::{SelectiveTerminator, TerminateError, TerminateOutcome, TERMINATE_POLL_INTERVAL};

#[cfg(any(test, feature = "testing"))]
mod recording;
#[cfg(any(test, feature = "testing"))]
pub use recording::RecordingSignaller;

/// Signals the agents send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGTERM
    Terminate,
    /// SIGHUP
    Hangup,
}

impl Signal {
    fn as_sysinfo(self) -> sysinfo::Signal {
        match self {
            Self::Terminate => sysinfo::Signal::Term,
            Self::Hangup => sysinfo::Signal::Hangup,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Hangup => f.write_str("SIGHUP"),
        }
    }
}

/// Errors from signal delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalError {
    /// Matching processes exist but none accepted the signal
    #[error("{signal} refused by all {matched} process(es) named {name}")]
    Refused {
        name: String,
        signal: Signal,
        matched: usize,
    },
}

/// Finds processes by name and signals them.
pub trait ProcessSignaller: Send + Sync {
    /// Signals every process called `name`. Returns how many received it;
    /// zero means nothing by that name was running.
    fn signal_by_name(&self, name: &str, signal: Signal) -> Result<usize, SignalError>;

    /// Whether any process called `name` is running.
    fn is_running(&self, name: &str) -> bool;
}

/// Real signaller backed by a fresh process table snapshot per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoSignaller;

impl SysinfoSignaller {
    /// Process table only: names and pids, no CPU, memory or disk data.
    fn snapshot() -> System {
        System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::new()))
    }
}

impl ProcessSignaller for SysinfoSignaller {
    fn signal_by_name(&self, name: &str, signal: Signal) -> Result<usize, SignalError> {
        let system = Self::snapshot();
        let target = OsStr::new(name);
        let mut matched = 0;
        let mut delivered = 0;

        for (pid, process) in system.processes() {
            let pname: &OsStr = process.name().as_ref();
            if pname != target {
                continue;
            }
            matched += 1;
            match process.kill_with(signal.as_sysinfo()) {
                Some(true) => {
                    debug!(pid = pid.as_u32(), name, %signal, "Signal delivered");
                    delivered += 1;
                }
                Some(false) => warn!(pid = pid.as_u32(), name, %signal, "Signal delivery failed"),
                None => warn!(%signal, "Signal not supported on this platform"),
            }
        }

        if matched > 0 && delivered == 0 {
            return Err(SignalError::Refused {
                name: name.to_string(),
                signal,
                matched,
            });
        }
        Ok(delivered)
    }

    fn is_running(&self, name: &str) -> bool {
        let system = Self::snapshot();
        let target = OsStr::new(name);
        system.processes().values().any(|p| {
            let pname: &OsStr = p.name().as_ref();
            pname == target
        })
    }
}
