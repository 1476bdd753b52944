//! Lid state classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single reading of the lid switch.
///
/// Derived from the raw text of the ACPI lid state file, which looks like
/// `state:      open` or `state:      closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LidState {
    /// Lid is open
    Open,

    /// Lid is closed
    Closed,

    /// Source missing, unreadable, or empty
    Unknown,
}

impl LidState {
    /// Classifies raw lid source text.
    ///
    /// Any text containing "closed" (case-insensitive) is `Closed`. Blank
    /// text is `Unknown`, since a source that reads back empty is usually
    /// mid-reload. Everything else is `Open`.
    pub fn from_source_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Unknown;
        }
        if trimmed.to_ascii_lowercase().contains("closed") {
            Self::Closed
        } else {
            Self::Open
        }
    }

    /// Returns true if this reading carries information.
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for LidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
