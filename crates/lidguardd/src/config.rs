//! Agent configuration.
//!
//! Loaded from TOML. Every section and key is optional; anything missing
//! takes the built-in default, so an absent file is the same as an empty
//! one.
//!
//! ```toml
//! [monitor]
//! poll_interval_ms = 500
//! close_threshold = 2
//!
//! [recovery]
//! modules = ["button"]
//!
//! [refresh]
//! call_timeout_secs = 5
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lidguard_core::{DomainError, WatchSet, DEFAULT_CLOSE_THRESHOLD};
use lidguard_sys::lid::{PRIMARY_LID_PATH, SECONDARY_LID_PATH};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "LIDGUARD_CONFIG";

/// System-wide config location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/lidguard/config.toml";

// ============================================================================
// Error Types
// ============================================================================

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File named explicitly but unreadable
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type error
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Value out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Domain rule violated
    #[error(transparent)]
    Domain(#[from] DomainError),
}

// ============================================================================
// Sections
// ============================================================================

/// `[monitor]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Lid state files, tried in order
    pub lid_paths: Vec<PathBuf>,
    pub poll_interval_ms: u64,
    /// Wait after an Unknown reading
    pub unknown_backoff_ms: u64,
    /// Consecutive closed readings before suspend
    pub close_threshold: u32,
    pub settle_after_suspend_secs: u64,
    pub settle_after_failure_secs: u64,
    /// Wait after a faulted tick
    pub fault_backoff_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            lid_paths: vec![
                PathBuf::from(PRIMARY_LID_PATH),
                PathBuf::from(SECONDARY_LID_PATH),
            ],
            poll_interval_ms: 500,
            unknown_backoff_ms: 5_000,
            close_threshold: DEFAULT_CLOSE_THRESHOLD,
            settle_after_suspend_secs: 10,
            settle_after_failure_secs: 5,
            fault_backoff_secs: 5,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn unknown_backoff(&self) -> Duration {
        Duration::from_millis(self.unknown_backoff_ms)
    }

    pub fn settle_after_suspend(&self) -> Duration {
        Duration::from_secs(self.settle_after_suspend_secs)
    }

    pub fn settle_after_failure(&self) -> Duration {
        Duration::from_secs(self.settle_after_failure_secs)
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_secs(self.fault_backoff_secs)
    }
}

/// `[recovery]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Never terminated
    pub media_key_owner: String,
    /// Terminated when it blocks sleep
    pub power_owner: String,
    /// Kernel modules reloaded on every run, in order
    pub modules: Vec<String>,
    pub terminate_wait_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        let watch = WatchSet::default();
        Self {
            media_key_owner: watch.media_key_owner().to_string(),
            power_owner: watch.power_owner().to_string(),
            modules: vec!["button".to_string()],
            terminate_wait_ms: 2_000,
        }
    }
}

impl RecoveryConfig {
    pub fn terminate_wait(&self) -> Duration {
        Duration::from_millis(self.terminate_wait_ms)
    }

    pub fn watch_set(&self) -> Result<WatchSet, DomainError> {
        WatchSet::new(self.media_key_owner.clone(), self.power_owner.clone())
    }
}

/// `[refresh]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Process name for the reload-signal fallback
    pub shell_process: String,
    pub bus_name: String,
    pub object_path: String,
    pub method: String,
    pub expression: String,
    pub call_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            shell_process: "gnome-shell".to_string(),
            bus_name: "org.gnome.Shell".to_string(),
            object_path: "/org/gnome/Shell".to_string(),
            method: "org.gnome.Shell.Eval".to_string(),
            expression: "global.reexec_self()".to_string(),
            call_timeout_secs: 5,
        }
    }
}

impl RefreshConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

// ============================================================================
// Top-level Config
// ============================================================================

/// Full agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub monitor: MonitorConfig,
    pub recovery: RecoveryConfig,
    pub refresh: RefreshConfig,
}

impl AgentConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from an explicit file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Loads using the standard lookup order.
    ///
    /// 1. `explicit` (from `--config`)
    /// 2. `$LIDGUARD_CONFIG`
    /// 3. `<config dir>/lidguard/config.toml`
    /// 4. `/etc/lidguard/config.toml`
    /// 5. defaults
    ///
    /// Explicit paths must exist; discovered ones are skipped if missing.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }
        for candidate in default_locations() {
            if candidate.exists() {
                debug!(path = %candidate.display(), "Loading config");
                return Self::from_file(&candidate);
            }
        }
        debug!("No config file found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Checks ranges and cross-field rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.lid_paths.is_empty() {
            return Err(ConfigError::Invalid {
                field: "monitor.lid_paths",
                reason: "at least one path required".to_string(),
            });
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor.poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.monitor.close_threshold == 0 {
            return Err(DomainError::InvalidThreshold(0).into());
        }
        if self.refresh.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh.call_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.recovery.modules.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "recovery.modules",
                reason: "module names must not be empty".to_string(),
            });
        }
        self.recovery.watch_set()?;
        Ok(())
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("lidguard").join("config.toml"));
    }
    locations.push(PathBuf::from(SYSTEM_CONFIG_PATH));
    locations
}
