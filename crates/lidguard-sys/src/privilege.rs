//! Scoped elevated-privilege handle.
//!
//! Operations that need root take an `&ElevatedSession`. The handle is
//! acquired once at the start of the operation and dropped at the end;
//! there is no background timer keeping credentials warm.

use std::time::Instant;

use thiserror::Error;
use tracing::debug;

/// Errors from privilege acquisition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrivilegeError {
    #[error("root privileges required (effective uid {euid}); re-run with sudo")]
    NotElevated { euid: u32 },
}

/// Proof that the current operation runs with root privileges.
#[derive(Debug)]
pub struct ElevatedSession {
    euid: u32,
    acquired_at: Instant,
}

impl ElevatedSession {
    /// Acquires a session for the current process.
    pub fn acquire() -> Result<Self, PrivilegeError> {
        // SAFETY: geteuid has no preconditions and cannot fail
        let euid = unsafe { libc::geteuid() };
        Self::acquire_as(euid)
    }

    /// Acquires a session for the given effective uid.
    pub fn acquire_as(euid: u32) -> Result<Self, PrivilegeError> {
        if euid != 0 {
            return Err(PrivilegeError::NotElevated { euid });
        }
        debug!("Elevated session acquired");
        Ok(Self {
            euid,
            acquired_at: Instant::now(),
        })
    }

    pub fn euid(&self) -> u32 {
        self.euid
    }

    /// Seconds since acquisition.
    pub fn held_for_secs(&self) -> u64 {
        self.acquired_at.elapsed().as_secs()
    }
}

impl Drop for ElevatedSession {
    fn drop(&mut self) {
        debug!(held_secs = self.held_for_secs(), "Elevated session released");
    }
}
