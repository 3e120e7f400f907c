// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable operation log.
//!
//! Pending operations live in the `pending_ops` table, ordered by an
//! autoincrement sequence so that [`Database::list_pending`] always returns
//! enqueue order. Each mutating call is a single autocommit statement: once
//! it returns `Ok`, the change is on disk.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{parse_db, parse_json, parse_timestamp, Database};
use crate::error::{Error, Result};
use crate::op::{OpId, OpKind, PendingOperation};

const SELECT_COLUMNS: &str = "id, action, entity_type, entity_id, payload, created_at,
                              attempts, last_error, last_attempt_at";

fn row_to_op(row: &Row<'_>) -> std::result::Result<PendingOperation, rusqlite::Error> {
    let id: String = row.get(0)?;
    let action: String = row.get(1)?;
    let entity_type: String = row.get(2)?;
    let payload: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let last_attempt_at: Option<String> = row.get(8)?;

    Ok(PendingOperation {
        id: OpId::from(id),
        kind: OpKind::new(
            parse_db(&action, "action")?,
            parse_db(&entity_type, "entity_type")?,
        ),
        entity_id: row.get(3)?,
        payload: parse_json(&payload, "payload")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        attempts: row.get(6)?,
        last_error: row.get(7)?,
        last_attempt_at: last_attempt_at
            .map(|s| parse_timestamp(&s, "last_attempt_at"))
            .transpose()?,
    })
}

impl Database {
    /// Appends a new operation and returns it.
    ///
    /// The operation is committed before this returns. An error means the
    /// mutation is NOT queued.
    pub fn enqueue(
        &self,
        kind: OpKind,
        entity_id: &str,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<PendingOperation> {
        if entity_id.trim().is_empty() {
            return Err(Error::FieldEmpty { field: "entity id" });
        }

        let op = PendingOperation::new(kind, entity_id, payload, now);
        self.insert_op(&op)?;
        Ok(op)
    }

    /// Inserts an already-built operation at the tail of the log.
    pub fn insert_op(&self, op: &PendingOperation) -> Result<()> {
        let payload = serde_json::to_string(&op.payload)?;
        self.conn.execute(
            "INSERT INTO pending_ops (id, action, entity_type, entity_id, payload,
             created_at, attempts, last_error, last_attempt_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                op.id.as_str(),
                op.kind.action.as_str(),
                op.kind.entity_type.as_str(),
                op.entity_id,
                payload,
                op.created_at.to_rfc3339(),
                op.attempts,
                op.last_error,
                op.last_attempt_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Deletes an operation. Returns false if it was already gone.
    pub fn remove(&self, id: &OpId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM pending_ops WHERE id = ?1", params![id.as_str()])?;
        Ok(changed > 0)
    }

    /// Records a failed execution attempt, leaving the operation queued.
    ///
    /// Returns the updated operation, or `None` if it no longer exists.
    pub fn record_attempt_failure(
        &self,
        id: &OpId,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PendingOperation>> {
        let changed = self.conn.execute(
            "UPDATE pending_ops
             SET attempts = attempts + 1, last_error = ?2, last_attempt_at = ?3
             WHERE id = ?1",
            params![id.as_str(), error, at.to_rfc3339()],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_op(id)
    }

    /// Returns a single operation by ID.
    pub fn get_op(&self, id: &OpId) -> Result<Option<PendingOperation>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM pending_ops WHERE id = ?1");
        let op = self
            .conn
            .query_row(&sql, params![id.as_str()], row_to_op)
            .optional()?;
        Ok(op)
    }

    /// Returns all pending operations in enqueue order.
    pub fn list_pending(&self) -> Result<Vec<PendingOperation>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM pending_ops ORDER BY seq");
        let mut stmt = self.conn.prepare(&sql)?;
        let ops = stmt
            .query_map([], row_to_op)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    /// Returns the number of pending operations.
    pub fn pending_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_ops", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Makes every backed-off operation due immediately.
    ///
    /// Attempt counts are kept, so a further failure backs off again from
    /// where it left off. Returns the number of operations touched.
    pub fn reset_backoff(&self) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE pending_ops SET last_attempt_at = NULL WHERE last_attempt_at IS NOT NULL",
            [],
        )?;
        Ok(changed)
    }
}

#[cfg(test)]
#[path = "oplog_tests.rs"]
mod tests;
