//! lidguard Core - Shared types for lid suspend enforcement and resume recovery
//!
//! This crate provides the pure domain logic shared between the OS-facing
//! layer (lidguard-sys) and the agents (lidguardd). Nothing in here performs
//! I/O, so every rule can be pinned by plain unit tests.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod debounce;
pub mod error;
pub mod inhibitor;
pub mod lid;
pub mod recovery;
pub mod refresh;

// Re-exports for convenience
pub use debounce::{DebounceDecision, Debouncer, MonitorState, DEFAULT_CLOSE_THRESHOLD};
pub use error::{DomainError, DomainResult};
pub use inhibitor::{parse_inhibitor_list, InhibitMode, InhibitorRecord, OwnerRole, WatchSet};
pub use lid::LidState;
pub use recovery::{RecoveryReport, RecoveryStepResult};
pub use refresh::{RefreshAttempt, RefreshOutcome, RefreshReport};
