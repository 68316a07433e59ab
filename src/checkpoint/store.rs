//! Where persisted actors live between sessions.
//!
//! The runtime only produces and consumes [`PersistedState`] values; a
//! [`SnapshotStore`] decides where they are kept. Stores are injected into
//! the [`WorkflowHost`](crate::host::WorkflowHost); there is no global
//! registry.

use super::{CheckpointError, PersistedState};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Invalid snapshot id '{id}'")]
    InvalidId { id: String },
}

/// Key-value storage for persisted actor trees.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, id: &str, state: &PersistedState) -> Result<(), StoreError>;

    fn load(&self, id: &str) -> Result<Option<PersistedState>, StoreError>;

    /// Returns whether an entry was removed.
    fn remove(&self, id: &str) -> Result<bool, StoreError>;

    /// Stored ids, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// In-process store. Entries are kept as encoded JSON so every save and load
/// goes through the same format as a durable store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, id: &str, state: &PersistedState) -> Result<(), StoreError> {
        let json = state.to_json()?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), json);
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<PersistedState>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(id) {
            Some(json) => Ok(Some(PersistedState::from_json(json)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// One JSON file per id in a directory.
///
/// Writes go to a temporary file that is then renamed over the target, so a
/// crash mid-write never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidId { id: id.to_string() });
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl SnapshotStore for FileStore {
    fn save(&self, id: &str, state: &PersistedState) -> Result<(), StoreError> {
        let path = self.path(id)?;
        let json = state.to_json_pretty()?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &path)?;

        debug!(id, path = %path.display(), "snapshot saved");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<PersistedState>, StoreError> {
        let path = self.path(id)?;
        match fs::read_to_string(&path) {
            Ok(json) => Ok(Some(PersistedState::from_json(&json)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
