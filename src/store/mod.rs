//! Durable per-user state.
//!
//! Provides the [`StateStore`] trait, the sanitized [`UserKey`] every lookup goes
//! through, and two backends: [`file::FileStateStore`] (one JSON document per
//! user) and [`sqlite::SqliteStateStore`]. A store is created via [`open_store`]
//! from configuration.

pub mod file;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Result;

use crate::memory::types::UserState;

/// Storage key derived from an external sender identifier.
///
/// Only ASCII digits and `+`, `-`, `_` survive sanitization, so a key is
/// always safe as a file name or primary key. An identifier with none of
/// those characters maps to the shared key `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey(String);

impl UserKey {
    pub fn sanitize(sender_id: &str) -> Self {
        let safe: String = sender_id.chars().filter(|c| is_key_char(*c)).collect();
        if safe.is_empty() {
            Self("_".into())
        } else {
            Self(safe)
        }
    }

    /// Accept `raw` only if it is already a valid key.
    pub fn parse(raw: &str) -> Option<Self> {
        (!raw.is_empty() && raw.chars().all(is_key_char)).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '_')
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stored state for {key} is malformed: {reason}")]
    Malformed { key: String, reason: String },
    #[error("failed to serialize state for {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("state store lock poisoned")]
    Poisoned,
}

/// Load/save of [`UserState`] by [`UserKey`].
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait StateStore: Send + Sync {
    /// Short backend name for logs and diagnostics.
    fn backend(&self) -> &'static str;

    /// Stored state, `Ok(None)` if the user has never been saved.
    fn read(&self, key: &UserKey) -> Result<Option<UserState>, StoreError>;

    /// Replace the stored state for `key`.
    fn save(&self, key: &UserKey, state: &UserState) -> Result<(), StoreError>;

    /// Delete the stored state. Returns whether anything was removed.
    fn remove(&self, key: &UserKey) -> Result<bool, StoreError>;

    /// Every key with stored state, sorted.
    fn keys(&self) -> Result<Vec<UserKey>, StoreError>;

    /// Stored state, or a fresh one when it is missing or malformed.
    ///
    /// Any other failure is returned, so a transient read error never leads
    /// to the real record being overwritten with a blank one.
    fn read_or_fresh(&self, key: &UserKey) -> Result<UserState, StoreError> {
        match self.read(key) {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Ok(UserState::default()),
            Err(e @ StoreError::Malformed { .. }) => {
                tracing::warn!(user = %key, error = %e, "discarding malformed state");
                Ok(UserState::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`read_or_fresh`](Self::read_or_fresh), falling back to a fresh
    /// state on any error.
    fn load(&self, key: &UserKey) -> UserState {
        self.read_or_fresh(key).unwrap_or_else(|e| {
            tracing::warn!(user = %key, error = %e, "state unavailable, using a fresh one");
            UserState::default()
        })
    }
}

/// Create a state store from config.
///
/// Supported backends: `"json"` (default) and `"sqlite"`.
pub fn open_store(config: &crate::config::AkiraConfig) -> Result<Arc<dyn StateStore>> {
    match config.storage.backend.as_str() {
        "json" => {
            let store = file::FileStateStore::open(config.resolved_store_dir())?;
            Ok(Arc::new(store))
        }
        "sqlite" => {
            let store = sqlite::SqliteStateStore::open(config.resolved_db_path())?;
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("unknown storage backend: {other}. Supported: json, sqlite"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_only_safe_characters() {
        assert_eq!(
            UserKey::sanitize("whatsapp:+34 600-123_456").as_str(),
            "+34600-123_456"
        );
        assert_eq!(UserKey::sanitize("../../etc/passwd").as_str(), "_");
        assert_eq!(UserKey::sanitize("").as_str(), "_");
        // non-ASCII digits are dropped too
        assert_eq!(UserKey::sanitize("٣12").as_str(), "12");
    }

    #[test]
    fn parse_rejects_unsafe_keys() {
        assert!(UserKey::parse("+123").is_some());
        assert!(UserKey::parse("abc").is_none());
        assert!(UserKey::parse("12/34").is_none());
        assert!(UserKey::parse("").is_none());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = crate::config::AkiraConfig::default();
        config.storage.backend = "cloud".into();
        let err = open_store(&config).err().unwrap();
        assert!(err.to_string().contains("unknown storage backend"));
    }
}
