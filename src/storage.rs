//! Persisted session record, restored on the next start.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::MailboxSession;

/// A single JSON file holding `{ "address", "expiresAt" }`.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    path: PathBuf,
}

impl SessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<MailboxSession>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let session = serde_json::from_str::<MailboxSession>(&contents).map_err(|e| {
            Error::MalformedResponse(format!("session file {}: {e}", self.path.display()))
        })?;
        Ok(Some(session))
    }

    /// Write `session`, replacing the stored one in a single rename.
    pub fn save(&self, session: &MailboxSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        let staging = self.staging_path();
        fs::write(&staging, contents)?;
        fs::rename(&staging, &self.path)?;
        tracing::debug!(path = %self.path.display(), address = %session.address, "saved session");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    /// Remove the stored session; already absent is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "cleared session");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> MailboxSession {
        MailboxSession::new(
            "abcd123456@example.com",
            Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path().join("session.json"));
        assert!(storage.load().unwrap().is_none());
        storage.clear().unwrap();
    }

    #[test]
    fn save_creates_parents_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path().join("nested").join("session.json"));
        storage.save(&sample()).unwrap();
        assert_eq!(storage.load().unwrap(), Some(sample()));
        assert!(!storage.staging_path().exists());

        let raw = fs::read_to_string(storage.path()).unwrap();
        assert!(raw.contains("\"expiresAt\""));

        storage.clear().unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn corrupt_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{\"address\": 12").unwrap();
        let err = SessionStorage::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }
}
