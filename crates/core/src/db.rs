// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed storage for the sync queue.
//!
//! The [`Database`] struct owns the connection. Operation log access lives
//! in [`crate::oplog`], sync history in [`crate::history`]; this module holds
//! the schema, migrations, and the small key/value meta table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};

/// SQL schema for the sync queue database.
pub const SCHEMA: &str = r#"
-- Pending mutations; seq gives enqueue order
CREATE TABLE IF NOT EXISTS pending_ops (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    last_attempt_at TEXT
);

-- Audit trail of sync attempts
CREATE TABLE IF NOT EXISTS sync_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    op_id TEXT NOT NULL,
    operation TEXT NOT NULL,
    status TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    error TEXT,
    payload TEXT
);

-- Process-independent scalars (last_sync_at, last_error)
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pending_entity ON pending_ops(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_sync_log_timestamp ON sync_log(timestamp);
"#;

const META_LAST_SYNC_AT: &str = "last_sync_at";

/// Parse a string value from the database, returning a rusqlite error on parse failure.
pub(crate) fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

/// Parse an RFC3339 timestamp from the database.
pub(crate) fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

/// Parse a JSON column from the database.
pub(crate) fn parse_json(
    value: &str,
    column: &str,
) -> std::result::Result<serde_json::Value, rusqlite::Error> {
    serde_json::from_str(value).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid JSON in column '{column}'"
            ))),
        )
    })
}

/// Run schema creation and all migrations on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    migrate_add_last_attempt_at(conn)?;
    Ok(())
}

/// Migration: queues written before backoff scheduling lack `last_attempt_at`.
fn migrate_add_last_attempt_at(conn: &Connection) -> Result<()> {
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('pending_ops') WHERE name = 'last_attempt_at'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !has_column {
        conn.execute("ALTER TABLE pending_ops ADD COLUMN last_attempt_at TEXT", [])?;
    }
    Ok(())
}

/// SQLite database connection with sync queue operations.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating and migrating if needed.
    ///
    /// Pending operations written by a previous process are visible
    /// immediately through [`Database::list_pending`].
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // FULL sync: a committed enqueue must survive power loss
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Returns the time of the last drain pass that emptied the queue.
    pub fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_LAST_SYNC_AT],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            None => Ok(None),
            Some(s) => Ok(Some(parse_timestamp(&s, "meta.value")?)),
        }
    }

    /// Records the time of a drain pass that emptied the queue.
    pub fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![META_LAST_SYNC_AT, at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Returns SQLite's data version counter.
    ///
    /// The value changes whenever another connection commits to the same
    /// file, which lets a long-running process notice operations enqueued by
    /// a separate CLI invocation. Writes through this connection do not
    /// change it.
    pub fn data_version(&self) -> Result<i64> {
        let version = self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
