//! One pretty-printed JSON document per user under a root directory.
//!
//! Writes go to a uniquely named temp file in the same directory and are then
//! renamed over `<key>.json`, so a reader never sees a half-written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{StateStore, StoreError, UserKey};
use crate::memory::types::UserState;

const EXTENSION: &str = "json";

pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory {}", root.display()))?;
        tracing::info!(root = %root.display(), "json state store ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &UserKey) -> PathBuf {
        self.root.join(format!("{key}.{EXTENSION}"))
    }
}

fn io_error(key: &UserKey, source: std::io::Error) -> StoreError {
    StoreError::Io {
        key: key.to_string(),
        source,
    }
}

impl StateStore for FileStateStore {
    fn backend(&self) -> &'static str {
        "json"
    }

    fn read(&self, key: &UserKey) -> Result<Option<UserState>, StoreError> {
        let contents = match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(key, e)),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, key: &UserKey, state: &UserState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;

        let target = self.path_for(key);
        let tmp = self
            .root
            .join(format!(".{key}.{}.tmp", uuid::Uuid::now_v7().simple()));

        std::fs::write(&tmp, json).map_err(|e| io_error(key, e))?;
        if let Err(e) = std::fs::rename(&tmp, &target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_error(key, e));
        }

        tracing::debug!(user = %key, turns = state.history().len(), "state saved");
        Ok(())
    }

    fn remove(&self, key: &UserKey) -> Result<bool, StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn keys(&self) -> Result<Vec<UserKey>, StoreError> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| StoreError::Io {
            key: "*".into(),
            source,
        })?;

        let mut keys: Vec<UserKey> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(EXTENSION))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(UserKey::parse)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}
