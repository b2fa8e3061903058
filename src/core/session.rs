//! Session activation flag
//!
//! Lives in memory; mirrored to a small JSON file when a path is configured
//! so a restarted process resumes monitoring.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct FlagFile {
    active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFlag {
    active: bool,
    path: Option<PathBuf>,
}

impl SessionFlag {
    /// Flag that is never written anywhere
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Flag backed by `path`; a missing file reads as inactive
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let active = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<FlagFile>(&content)?.active,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), active, "session flag loaded");
        Ok(Self {
            active,
            path: Some(path),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Copy of the current state that is never written back
    pub fn detached(&self) -> Self {
        Self {
            active: self.active,
            path: None,
        }
    }

    /// Update the flag. The in-memory value changes even if the file write
    /// fails.
    pub fn set(&mut self, active: bool) -> Result<(), SessionError> {
        self.active = active;
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string(&FlagFile { active })?;
        std::fs::write(path, content).map_err(|e| {
            warn!(path = %path.display(), error = %e, "session flag not saved");
            SessionError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_flag() {
        let mut flag = SessionFlag::in_memory();
        assert!(!flag.is_active());
        flag.set(true).unwrap();
        assert!(flag.is_active());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut flag = SessionFlag::open(&path).unwrap();
        assert!(!flag.is_active());
        flag.set(true).unwrap();

        let reopened = SessionFlag::open(&path).unwrap();
        assert!(reopened.is_active());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"active":true}"#);
    }

    #[test]
    fn test_detached_flag_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut flag = SessionFlag::open(&path).unwrap().detached();
        flag.set(true).unwrap();
        assert!(flag.is_active());
        assert!(!path.exists());

        SessionFlag::open(&path).unwrap().set(true).unwrap();
        let mut flag = SessionFlag::open(&path).unwrap().detached();
        assert!(flag.is_active());
        flag.set(false).unwrap();
        assert!(SessionFlag::open(&path).unwrap().is_active());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "yes").unwrap();
        assert!(matches!(SessionFlag::open(&path), Err(SessionError::Json(_))));
    }
}
