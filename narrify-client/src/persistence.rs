//! Persisted session medium.
//!
//! A small string-valued key/value store that survives process restarts and
//! is shared by every client process on the machine. [`SessionStore`] is the
//! only writer.
//!
//! [`SessionStore`]: crate::session::SessionStore

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

/// Medium key holding the bearer credential.
pub const TOKEN_KEY: &str = "token";
/// Medium key holding the display identity.
pub const USERNAME_KEY: &str = "username";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Session medium unavailable: {0}")]
    Unavailable(String),
}

/// Opaque value that changes whenever the medium's contents may have changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    Missing,
    File { modified: Option<SystemTime>, len: u64 },
    Revision(u64),
}

/// Key/value storage backing the session.
pub trait SessionMedium: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
    fn fingerprint(&self) -> Result<Fingerprint, PersistenceError>;
}

/// JSON object file on disk.
#[derive(Debug, Clone)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SessionMedium for FileMedium {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }

    fn fingerprint(&self) -> Result<Fingerprint, PersistenceError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(Fingerprint::File {
                modified: meta.modified().ok(),
                len: meta.len(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Fingerprint::Missing),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process medium. Writes can be made to fail to simulate a full or
/// disabled store.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    values: Mutex<BTreeMap<String, String>>,
    revision: Mutex<u64>,
    fail_writes: AtomicBool,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium pre-populated with a stored session.
    pub fn with_session(token: &str, username: &str) -> Self {
        let medium = Self::new();
        {
            let mut values = medium.values.lock().unwrap_or_else(PoisonError::into_inner);
            values.insert(TOKEN_KEY.to_string(), token.to_string());
            values.insert(USERNAME_KEY.to_string(), username.to_string());
        }
        medium
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Write bypassing failure injection, as another process sharing the
    /// medium would.
    pub fn write_external(&self, key: &str, value: Option<&str>) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(value) => {
                values.insert(key.to_string(), value.to_string());
            }
            None => {
                values.remove(key);
            }
        }
        self.bump();
    }

    fn bump(&self) {
        *self.revision.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("quota exceeded".to_string()));
        }
        Ok(())
    }
}

impl SessionMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.bump();
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        self.bump();
        Ok(())
    }

    fn fingerprint(&self) -> Result<Fingerprint, PersistenceError> {
        Ok(Fingerprint::Revision(
            *self.revision.lock().unwrap_or_else(PoisonError::into_inner),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_medium_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path().join("session.json"));
        assert_eq!(medium.read(TOKEN_KEY).unwrap(), None);
        assert_eq!(medium.fingerprint().unwrap(), Fingerprint::Missing);
    }

    #[test]
    fn file_medium_round_trips_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path().join("nested/dir/session.json"));
        medium.write(TOKEN_KEY, "abc").unwrap();
        medium.write(USERNAME_KEY, "amy").unwrap();
        assert_eq!(medium.read(TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        medium.remove(TOKEN_KEY).unwrap();
        assert_eq!(medium.read(TOKEN_KEY).unwrap(), None);
        assert_eq!(medium.read(USERNAME_KEY).unwrap().as_deref(), Some("amy"));
    }

    #[test]
    fn file_medium_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let medium = FileMedium::new(path);
        assert!(matches!(
            medium.read(TOKEN_KEY),
            Err(PersistenceError::Serde(_))
        ));
    }

    #[test]
    fn memory_medium_write_failure_keeps_values() {
        let medium = MemoryMedium::with_session("t", "amy");
        medium.set_fail_writes(true);
        assert!(medium.remove(TOKEN_KEY).is_err());
        assert_eq!(medium.read(TOKEN_KEY).unwrap().as_deref(), Some("t"));
    }

    #[test]
    fn memory_medium_external_write_changes_fingerprint() {
        let medium = MemoryMedium::new();
        let before = medium.fingerprint().unwrap();
        medium.write_external(TOKEN_KEY, Some("t"));
        assert_ne!(medium.fingerprint().unwrap(), before);
    }
}
