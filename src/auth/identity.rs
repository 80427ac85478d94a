use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("local store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("local store holds invalid data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("local store lock poisoned")]
    Poisoned,
}

/// Small persistent key-value store kept in one JSON file. Without a path
/// the entries only live in memory.
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: Mutex<Map<String, Value>>,
}

impl LocalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LocalStoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => serde_json::from_str(&text)?,
            Ok(_) => Map::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "opened local store");

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Map::new()),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, LocalStoreError> {
        let entries = self.entries.lock().map_err(|_| LocalStoreError::Poisoned)?;
        match entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), LocalStoreError> {
        let mut entries = self.entries.lock().map_err(|_| LocalStoreError::Poisoned)?;
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        self.flush(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut entries = self.entries.lock().map_err(|_| LocalStoreError::Poisoned)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    /// Drops every entry.
    pub fn clear(&self) -> Result<(), LocalStoreError> {
        let mut entries = self.entries.lock().map_err(|_| LocalStoreError::Poisoned)?;
        if !entries.is_empty() {
            entries.clear();
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn flush(&self, entries: &Map<String, Value>) -> Result<(), LocalStoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
