//! In-memory process table for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{ProcessSignaller, Signal, SignalError};

#[derive(Default)]
struct Table {
    running: HashMap<String, usize>,
    ignores_terminate: HashSet<String>,
    refuses: HashSet<String>,
    calls: Vec<(String, Signal)>,
}

/// A [`ProcessSignaller`] over a fake process table.
///
/// SIGTERM removes the named processes unless told to ignore it. SIGHUP
/// leaves them running. Every call is recorded.
#[derive(Default)]
pub struct RecordingSignaller {
    table: Mutex<Table>,
}

impl RecordingSignaller {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds `count` processes called `name`.
    pub fn spawn(&self, name: &str, count: usize) {
        *self.table().running.entry(name.to_string()).or_insert(0) += count;
    }

    /// `name` survives SIGTERM.
    pub fn ignore_terminate(&self, name: &str) {
        self.table().ignores_terminate.insert(name.to_string());
    }

    /// Delivery to `name` fails outright.
    pub fn refuse(&self, name: &str) {
        self.table().refuses.insert(name.to_string());
    }

    /// Every (name, signal) pair requested so far.
    pub fn calls(&self) -> Vec<(String, Signal)> {
        self.table().calls.clone()
    }

    /// Names that were sent SIGTERM.
    pub fn terminated_names(&self) -> Vec<String> {
        self.table()
            .calls
            .iter()
            .filter(|(_, s)| *s == Signal::Terminate)
            .map(|(n, _)| n.clone())
            .collect()
    }
}

impl ProcessSignaller for RecordingSignaller {
    fn signal_by_name(&self, name: &str, signal: Signal) -> Result<usize, SignalError> {
        let mut table = self.table();
        table.calls.push((name.to_string(), signal));

        let matched = table.running.get(name).copied().unwrap_or(0);
        if matched == 0 {
            return Ok(0);
        }
        if table.refuses.contains(name) {
            return Err(SignalError::Refused {
                name: name.to_string(),
                signal,
                matched,
            });
        }
        if signal == Signal::Terminate && !table.ignores_terminate.contains(name) {
            table.running.remove(name);
        }
        Ok(matched)
    }

    fn is_running(&self, name: &str) -> bool {
        self.table().running.get(name).is_some_and(|n| *n > 0)
    }
}
