//! SQLite-backed state store.
//!
//! Each save replaces the user's items and turns inside one transaction and
//! bumps the per-user `revision` counter.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use super::{StateStore, StoreError, UserKey};
use crate::memory::types::{Role, Turn, UserMemory, UserState};

pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = crate::db::open_database(path)?;
        Ok(Self::from_connection(conn))
    }

    /// A throwaway store backed by an in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(crate::db::open_in_memory()?))
    }

    /// Wrap an already initialized and migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// How many times the user's state has been saved, `None` if never.
    pub fn revision(&self, key: &UserKey) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        let revision = conn
            .query_row(
                "SELECT revision FROM users WHERE user_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(revision)
    }

    /// Integrity and row counts for `doctor`.
    pub fn health(&self) -> Result<crate::db::HealthReport> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        crate::db::check_database_health(&conn)
    }
}

fn malformed(key: &UserKey, reason: impl Into<String>) -> StoreError {
    StoreError::Malformed {
        key: key.to_string(),
        reason: reason.into(),
    }
}

impl StateStore for SqliteStateStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn read(&self, key: &UserKey) -> Result<Option<UserState>, StoreError> {
        let conn = self.lock()?;

        let user_name: Option<Option<String>> = conn
            .query_row(
                "SELECT user_name FROM users WHERE user_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(user_name) = user_name else {
            return Ok(None);
        };

        let mut memory = UserMemory {
            user_name,
            ..Default::default()
        };

        let mut stmt = conn.prepare(
            "SELECT kind, content FROM user_items WHERE user_key = ?1 ORDER BY kind, position",
        )?;
        let items = stmt.query_map(params![key.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for item in items {
            let (kind, content) = item?;
            match kind.as_str() {
                "like" => memory.likes.push(content),
                "fact" => memory.facts.push(content),
                other => return Err(malformed(key, format!("unknown item kind: {other}"))),
            }
        }

        let mut stmt =
            conn.prepare("SELECT role, content FROM turns WHERE user_key = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![key.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut history = Vec::new();
        for row in rows {
            let (role, content) = row?;
            let role: Role = role.parse().map_err(|e: String| malformed(key, e))?;
            history.push(Turn { role, content });
        }

        Ok(Some(UserState::from_parts(memory, history)))
    }

    fn save(&self, key: &UserKey, state: &UserState) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO users (user_key, user_name, created_at, updated_at, revision) \
             VALUES (?1, ?2, ?3, ?3, 1) \
             ON CONFLICT(user_key) DO UPDATE SET \
                user_name = excluded.user_name, \
                updated_at = excluded.updated_at, \
                revision = users.revision + 1",
            params![key.as_str(), state.memory.user_name, now],
        )?;
        tx.execute(
            "DELETE FROM user_items WHERE user_key = ?1",
            params![key.as_str()],
        )?;
        tx.execute("DELETE FROM turns WHERE user_key = ?1", params![key.as_str()])?;

        {
            let mut insert_item = tx.prepare(
                "INSERT INTO user_items (user_key, kind, position, content) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let items = state
                .memory
                .likes
                .iter()
                .enumerate()
                .map(|(i, like)| ("like", i, like))
                .chain(
                    state
                        .memory
                        .facts
                        .iter()
                        .enumerate()
                        .map(|(i, fact)| ("fact", i, fact)),
                );
            for (kind, position, content) in items {
                insert_item.execute(params![key.as_str(), kind, position as i64, content])?;
            }

            let mut insert_turn = tx.prepare(
                "INSERT INTO turns (user_key, seq, role, content) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (seq, turn) in state.history().iter().enumerate() {
                insert_turn.execute(params![
                    key.as_str(),
                    seq as i64,
                    turn.role.as_str(),
                    turn.content
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(user = %key, turns = state.history().len(), "state saved");
        Ok(())
    }

    fn remove(&self, key: &UserKey) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM users WHERE user_key = ?1",
            params![key.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn keys(&self) -> Result<Vec<UserKey>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT user_key FROM users ORDER BY user_key")?;
        let raw: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(raw
            .iter()
            .filter_map(|k| {
                let parsed = UserKey::parse(k);
                if parsed.is_none() {
                    tracing::warn!(key = %k, "skipping invalid user key in database");
                }
                parsed
            })
            .collect())
    }
}
