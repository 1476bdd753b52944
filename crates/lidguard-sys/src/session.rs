//! Per-user session environment.
//!
//! Session-bus calls need `XDG_RUNTIME_DIR` and a bus address. When the
//! agent runs from a resume hook or under `sudo` those are usually missing,
//! so both are derived from the user id using the `/run/user/<uid>`
//! convention.

use std::env;
use std::path::{Path, PathBuf};

/// Base directory for per-user runtime dirs.
pub const RUNTIME_DIR_BASE: &str = "/run/user";

/// Resolved session environment for session-bus calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnv {
    runtime_dir: PathBuf,
    bus_address: String,
}

impl SessionEnv {
    /// Resolves from explicit values; used by [`SessionEnv::from_process`].
    pub fn resolve(runtime_dir: Option<String>, bus_address: Option<String>, uid: u32) -> Self {
        let runtime_dir = runtime_dir
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(RUNTIME_DIR_BASE).join(uid.to_string()));
        let bus_address = bus_address
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("unix:path={}", runtime_dir.join("bus").display()));
        Self {
            runtime_dir,
            bus_address,
        }
    }

    /// Resolves from this process's environment and user id.
    ///
    /// `SUDO_UID` wins over the real uid so that `sudo lidguard
    /// refresh-shell` still reaches the invoking user's session.
    pub fn from_process() -> Self {
        let uid = env::var("SUDO_UID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(current_uid);
        Self::resolve(
            env::var("XDG_RUNTIME_DIR").ok(),
            env::var("DBUS_SESSION_BUS_ADDRESS").ok(),
            uid,
        )
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn bus_address(&self) -> &str {
        &self.bus_address
    }

    /// Environment pairs to pass to a session-bus command.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        vec![
            (
                "XDG_RUNTIME_DIR".to_string(),
                self.runtime_dir.display().to_string(),
            ),
            (
                "DBUS_SESSION_BUS_ADDRESS".to_string(),
                self.bus_address.clone(),
            ),
        ]
    }
}

fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail
    unsafe { libc::getuid() }
}
