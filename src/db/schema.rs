//! SQL DDL for the SQLite state backend.
//!
//! Defines the `users`, `user_items` (likes and facts), `turns`, and
//! `schema_meta` tables. All DDL uses `IF NOT EXISTS` for idempotent
//! initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- One row per sanitized user key
CREATE TABLE IF NOT EXISTS users (
    user_key TEXT PRIMARY KEY,
    user_name TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Likes and facts, in the order they were recorded
CREATE TABLE IF NOT EXISTS user_items (
    user_key TEXT NOT NULL REFERENCES users(user_key) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK(kind IN ('like','fact')),
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    PRIMARY KEY (user_key, kind, position)
);

-- Conversation history
CREATE TABLE IF NOT EXISTS turns (
    user_key TEXT NOT NULL REFERENCES users(user_key) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL CHECK(role IN ('user','assistant')),
    content TEXT NOT NULL,
    PRIMARY KEY (user_key, seq)
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
