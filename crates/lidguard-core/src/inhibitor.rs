//! Power-inhibitor listing parser.
//!
//! `systemd-inhibit --list` prints a column-aligned table whose column
//! widths shift with content, and whose WHY column is free text. Rather
//! than trusting a column schema, each line is matched token by token:
//!
//! - owner: the watched process name appearing anywhere in the line
//! - mode:  the last token that is exactly `block` or `delay`
//! - scope: the first token that looks like a WHAT list (`sleep`,
//!   `idle`, `shutdown`, `handle-*`, colon separated)
//!
//! All of that lives in [`parse_inhibitor_list`] so any format drift shows
//! up as a failing sample-line test here rather than silent misclassification.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Types
// ============================================================================

/// Inhibitor lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InhibitMode {
    /// Transition is refused outright
    Block,

    /// Transition is postponed for a bounded time
    Delay,
}

impl InhibitMode {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "block" => Some(Self::Block),
            "delay" => Some(Self::Delay),
            _ => None,
        }
    }
}

impl fmt::Display for InhibitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::Delay => f.write_str("delay"),
        }
    }
}

/// Which watched owner a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerRole {
    /// Media-key handler. Never terminated.
    MediaKeys,

    /// Power-policy daemon. Terminated when it blocks sleep.
    Power,
}

impl fmt::Display for OwnerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MediaKeys => f.write_str("media-keys"),
            Self::Power => f.write_str("power"),
        }
    }
}

/// The fixed pair of inhibitor owners the recovery run cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSet {
    media_key_owner: String,
    power_owner: String,
}

impl WatchSet {
    /// Creates a watch set.
    ///
    /// # Errors
    ///
    /// Returns an error if either name is empty or both are the same.
    pub fn new(media_key_owner: impl Into<String>, power_owner: impl Into<String>) -> DomainResult<Self> {
        let media_key_owner = media_key_owner.into();
        let power_owner = power_owner.into();
        if media_key_owner.trim().is_empty() {
            return Err(DomainError::EmptyOwner {
                role: OwnerRole::MediaKeys.to_string(),
            });
        }
        if power_owner.trim().is_empty() {
            return Err(DomainError::EmptyOwner {
                role: OwnerRole::Power.to_string(),
            });
        }
        if media_key_owner == power_owner {
            return Err(DomainError::DuplicateOwner(power_owner));
        }
        Ok(Self {
            media_key_owner,
            power_owner,
        })
    }

    pub fn media_key_owner(&self) -> &str {
        &self.media_key_owner
    }

    pub fn power_owner(&self) -> &str {
        &self.power_owner
    }

    /// Returns the owner name for a role.
    pub fn owner(&self, role: OwnerRole) -> &str {
        match role {
            OwnerRole::MediaKeys => &self.media_key_owner,
            OwnerRole::Power => &self.power_owner,
        }
    }

    /// Finds which watched owner a line mentions.
    ///
    /// When both names occur (one may be a prefix of the other) the longer
    /// match wins.
    fn match_line(&self, line: &str) -> Option<OwnerRole> {
        let mut candidates = [
            (OwnerRole::MediaKeys, self.media_key_owner.as_str()),
            (OwnerRole::Power, self.power_owner.as_str()),
        ];
        candidates.sort_by_key(|(_, name)| std::cmp::Reverse(name.len()));
        candidates
            .iter()
            .find(|(_, name)| line.contains(name))
            .map(|(role, _)| *role)
    }
}

impl Default for WatchSet {
    fn default() -> Self {
        Self {
            media_key_owner: "gsd-media-keys".to_string(),
            power_owner: "gsd-power".to_string(),
        }
    }
}

/// One inhibitor line that mentions a watched owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InhibitorRecord {
    /// Watched owner name as configured
    pub owner: String,
    /// Role of that owner
    pub role: OwnerRole,
    /// Lock mode
    pub mode: InhibitMode,
    /// WHAT list, e.g. `sleep` or `handle-lid-switch:sleep`
    pub scope: String,
    /// The untouched source line
    pub raw: String,
}

impl InhibitorRecord {
    /// True for a `block` lock whose scope includes sleep.
    pub fn blocks_sleep(&self) -> bool {
        self.mode == InhibitMode::Block && self.scope.contains("sleep")
    }
}

// ============================================================================
// Parsing
// ============================================================================

const WHAT_KEYWORDS: &[&str] = &["sleep", "idle", "shutdown", "handle-"];

fn is_scope_token(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_ascii_lowercase() || c == '-' || c == ':')
        && WHAT_KEYWORDS.iter().any(|kw| token.contains(kw))
}

/// Parses `systemd-inhibit --list` output.
///
/// The first line is the header and is skipped. Lines that don't mention a
/// watched owner, or carry no recognisable mode token, are dropped. The
/// returned records are unfiltered by mode/scope; use
/// [`InhibitorRecord::blocks_sleep`] for that.
pub fn parse_inhibitor_list(output: &str, watch: &WatchSet) -> Vec<InhibitorRecord> {
    let mut records = Vec::new();

    for line in output.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }

        let Some(role) = watch.match_line(line) else {
            continue;
        };

        let tokens: Vec<&str> = line.split_whitespace().collect();

        let Some(mode) = tokens.iter().rev().find_map(|t| InhibitMode::from_token(t)) else {
            trace!(line, "Watched inhibitor line has no mode token");
            continue;
        };

        let scope = tokens
            .iter()
            .find(|t| is_scope_token(t))
            .map(|t| (*t).to_string())
            .unwrap_or_default();

        records.push(InhibitorRecord {
            owner: watch.owner(role).to_string(),
            role,
            mode,
            scope,
            raw: line.to_string(),
        });
    }

    records
}
