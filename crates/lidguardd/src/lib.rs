//! lidguardd - the lidguard agents
//!
//! This crate holds the three agents and their configuration:
//! - `monitor` - polls the lid and forces a suspend once it is confirmed closed
//! - `recovery` - post-resume cleanup of stuck sleep inhibitors and the lid driver
//! - `refresh` - restarts the desktop shell through an ordered strategy chain
//! - `config` - TOML configuration shared by all of them
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        lidguard                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────┐   read    ┌──────────────┐                 │
//! │  │  LidMonitor  │──────────▶│  LidSource   │                 │
//! │  │ (debounced)  │  suspend  ├──────────────┤                 │
//! │  │              │──────────▶│  Suspender   │                 │
//! │  └──────────────┘           └──────────────┘                 │
//! │                                                              │
//! │  ┌──────────────────────┐   ┌──────────────────────────┐     │
//! │  │ RecoveryOrchestrator │──▶│ InhibitorScanner         │     │
//! │  │ (one-shot, root)     │   │ SelectiveTerminator      │     │
//! │  └──────────────────────┘   │ ModuleReloader           │     │
//! │                             └──────────────────────────┘     │
//! │  ┌──────────────────────┐   ┌──────────────────────────┐     │
//! │  │ RefreshChain         │──▶│ ShellEvalRestart (gdbus) │     │
//! │  │ (first success wins) │   │ ShellSignalReload (HUP)  │     │
//! │  └──────────────────────┘   └──────────────────────────┘     │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The agents share no state. Each is wired from `lidguard-sys` leaves
//! behind traits, so tests swap in scripted doubles.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or degrade to a report entry
//! - The monitor loop survives every tick failure

pub mod config;
pub mod monitor;
pub mod recovery;
pub mod refresh;

pub use config::{AgentConfig, ConfigError, MonitorConfig, RecoveryConfig, RefreshConfig};
pub use monitor::{spawn_monitor_task, LidMonitor, MonitorError, MonitorStats, TickReport};
pub use recovery::RecoveryOrchestrator;
pub use refresh::{RefreshChain, RefreshStrategy, ShellEvalRestart, ShellSignalReload};
