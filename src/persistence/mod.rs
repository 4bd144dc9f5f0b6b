//! Durable key/value storage for the cached calibration record.
//!
//! Values are opaque strings (the calibration engine stores JSON). Two
//! implementations: an in-memory map for tests and a directory of JSON files
//! for desktop use.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;

/// Key under which the calibration offset record is stored
pub const CALIBRATION_KEY: &str = "slopeMeterCalibration";

/// Trait implemented by persistent stores.
pub trait PersistentStore: Send + Sync {
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// `Ok(None)` when nothing is stored under `key`
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Volatile store backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, PersistenceError> {
        self.entries.lock().map_err(|_| PersistenceError::Unavailable {
            reason: "memory store lock poisoned".to_string(),
        })
    }
}

impl PersistentStore for MemoryStore {
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Store that keeps one `<key>.json` file per key inside a directory.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl PersistentStore for JsonFileStore {
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.root).map_err(|err| PersistenceError::Unavailable {
            reason: format!("creating {}: {}", self.root.display(), err),
        })?;

        let path = self.path_for(key);
        fs::write(&path, value).map_err(|err| PersistenceError::WriteFailed {
            reason: format!("writing {}: {}", path.display(), err),
        })?;
        log::debug!("[JsonFileStore] Saved {} to {}", key, path.display());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PersistenceError::Unavailable {
                reason: format!("reading {}: {}", path.display(), err),
            }),
        }
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PersistenceError::WriteFailed {
                reason: format!("removing {}: {}", path.display(), err),
            }),
        }
    }
}
