//! Lid state source.
//!
//! The ACPI button driver exposes the lid switch as a small text file. The
//! file can vanish for a moment while the `button` module is reloaded, so
//! every failure degrades to `LidState::Unknown` instead of an error.
//!
//! Reads are plain blocking `std::fs` calls; async callers should go
//! through `spawn_blocking`.

use std::fs;
use std::path::{Path, PathBuf};

use lidguard_core::LidState;
use tracing::{debug, trace};

/// Primary lid state path.
pub const PRIMARY_LID_PATH: &str = "/proc/acpi/button/lid/LID0/state";

/// Fallback lid state path used by firmware that names the device `LID`.
pub const SECONDARY_LID_PATH: &str = "/proc/acpi/button/lid/LID/state";

/// Anything that can produce a lid reading.
pub trait LidSource: Send + Sync {
    /// Samples the lid. Never fails; problems read as `Unknown`.
    fn read(&self) -> LidState;

    /// Whether the source could produce a reading right now.
    fn is_available(&self) -> bool;
}

/// Reads the lid state from the first usable path in a list.
#[derive(Debug, Clone)]
pub struct LidStateReader {
    paths: Vec<PathBuf>,
}

impl LidStateReader {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Reads the lid and reports which path answered.
    pub fn read_with_source(&self) -> Option<(&Path, LidState)> {
        for path in &self.paths {
            if !path.exists() {
                trace!(path = %path.display(), "Lid source missing");
                continue;
            }
            match fs::read_to_string(path) {
                Ok(text) => return Some((path.as_path(), LidState::from_source_text(&text))),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Failed to read lid source");
                }
            }
        }
        None
    }
}

impl Default for LidStateReader {
    fn default() -> Self {
        Self::new(vec![
            PathBuf::from(PRIMARY_LID_PATH),
            PathBuf::from(SECONDARY_LID_PATH),
        ])
    }
}

impl LidSource for LidStateReader {
    fn read(&self) -> LidState {
        self.read_with_source()
            .map(|(_, state)| state)
            .unwrap_or(LidState::Unknown)
    }

    fn is_available(&self) -> bool {
        self.paths.iter().any(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_state(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        write!(f, "{text}").unwrap();
        path
    }

    #[test]
    fn test_reads_primary() {
        let dir = tempfile::tempdir().unwrap();
        let primary = write_state(dir.path(), "LID0", "state:      closed\n");
        let secondary = write_state(dir.path(), "LID", "state:      open\n");
        let reader = LidStateReader::new(vec![primary.clone(), secondary]);
        assert_eq!(reader.read(), LidState::Closed);
        let (path, _) = reader.read_with_source().unwrap();
        assert_eq!(path, primary.as_path());
    }

    #[test]
    fn test_falls_back_to_secondary() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = write_state(dir.path(), "LID", "state:      open\n");
        let reader = LidStateReader::new(vec![dir.path().join("LID0"), secondary]);
        assert_eq!(reader.read(), LidState::Open);
        assert!(reader.is_available());
    }

    #[test]
    fn test_neither_exists_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let reader = LidStateReader::new(vec![dir.path().join("LID0"), dir.path().join("LID")]);
        assert_eq!(reader.read(), LidState::Unknown);
        assert!(!reader.is_available());
    }

    #[test]
    fn test_unreadable_path_falls_through() {
        // A directory exists but can't be read as a string
        let dir = tempfile::tempdir().unwrap();
        let secondary = write_state(dir.path(), "LID", "state: closed");
        let reader = LidStateReader::new(vec![dir.path().to_path_buf(), secondary]);
        assert_eq!(reader.read(), LidState::Closed);
    }

    #[test]
    fn test_source_disappears() {
        let dir = tempfile::tempdir().unwrap();
        let primary = write_state(dir.path(), "LID0", "state: closed");
        let reader = LidStateReader::new(vec![primary.clone()]);
        assert_eq!(reader.read(), LidState::Closed);
        fs::remove_file(&primary).unwrap();
        assert_eq!(reader.read(), LidState::Unknown);
    }
}
