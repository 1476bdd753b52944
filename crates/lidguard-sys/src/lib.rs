//! lidguard-sys - OS-facing leaves of the lidguard agents
//!
//! Each module wraps one external facility:
//! - `command` - async subprocess runner with deadlines
//! - `lid` - ACPI lid state file reader
//! - `suspend` - `systemctl suspend --ignore-inhibitors`
//! - `inhibitor` - `systemd-inhibit --list` scanner
//! - `process` - signal delivery by process name, selective terminator
//! - `module` - `modprobe` unload/reload
//! - `session` - per-user runtime dir and session bus resolution
//! - `privilege` - scoped elevated-session handle
//!
//! Seams that tests need to replace are traits (`CommandRunner`,
//! `LidSource`, `Suspender`, `ProcessSignaller`). Test doubles live behind
//! the `testing` feature.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Every OS failure is mapped to a typed error or degraded reading

pub mod command;
pub mod inhibitor;
pub mod lid;
pub mod module;
pub mod privilege;
pub mod process;
pub mod session;
pub mod suspend;

pub use command::{CommandError, CommandOutput, CommandRunner, CommandSpec, RealCommandRunner};
pub use inhibitor::{InhibitorScanner, ScanError};
pub use lid::{LidSource, LidStateReader};
pub use module::{ModuleError, ModuleReloader, UnloadOutcome};
pub use privilege::{ElevatedSession, PrivilegeError};
pub use process::{
    ProcessSignaller, SelectiveTerminator, Signal, SignalError, SysinfoSignaller, TerminateError,
    TerminateOutcome,
};
pub use session::SessionEnv;
pub use suspend::{Suspender, SuspendError, SystemdSuspend};
