// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;
use tempfile::TempDir;

#[test]
fn migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    run_migrations(&db.conn).unwrap();
    run_migrations(&db.conn).unwrap();
}

#[test]
fn migration_adds_missing_last_attempt_at() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE pending_ops (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT
        );",
    )
    .unwrap();

    run_migrations(&conn).unwrap();

    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('pending_ops') WHERE name = 'last_attempt_at'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(has_column);
}

#[test]
fn open_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("queue.db");

    Database::open(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn last_sync_at_roundtrips_and_overwrites() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.last_sync_at().unwrap().is_none());

    let first = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();

    db.set_last_sync_at(first).unwrap();
    assert_eq!(db.last_sync_at().unwrap(), Some(first));

    db.set_last_sync_at(second).unwrap();
    assert_eq!(db.last_sync_at().unwrap(), Some(second));
}

#[test]
fn last_sync_at_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.db");
    let at = Utc.with_ymd_and_hms(2026, 5, 4, 3, 2, 1).unwrap();

    Database::open(&path).unwrap().set_last_sync_at(at).unwrap();

    let db = Database::open(&path).unwrap();
    assert_eq!(db.last_sync_at().unwrap(), Some(at));
}

#[test]
fn data_version_changes_only_for_foreign_commits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.db");
    let reader = Database::open(&path).unwrap();
    let writer = Database::open(&path).unwrap();

    let before = reader.data_version().unwrap();
    reader.set_last_sync_at(Utc::now()).unwrap();
    assert_eq!(reader.data_version().unwrap(), before);

    writer.set_last_sync_at(Utc::now()).unwrap();
    assert_ne!(reader.data_version().unwrap(), before);
}
