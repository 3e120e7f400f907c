// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync history: one row per execution attempt.
//!
//! Failed entries keep the operation payload so a rejected mutation can be
//! reviewed (and re-entered by hand) after it has left the queue.

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::{parse_db, parse_json, parse_timestamp, Database};
use crate::error::{Error, Result};
use crate::op::{OpId, PendingOperation};

/// Outcome recorded for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    /// Confirmed by the remote.
    Success,
    /// Failed, still queued for retry.
    Pending,
    /// Rejected by the remote and dropped from the queue.
    Failed,
}

impl SyncLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Success => "success",
            SyncLogStatus::Pending => "pending",
            SyncLogStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncLogStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(SyncLogStatus::Success),
            "pending" => Ok(SyncLogStatus::Pending),
            "failed" => Ok(SyncLogStatus::Failed),
            _ => Err(Error::InvalidLogStatus(s.to_string())),
        }
    }
}

/// A recorded sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Row ID, zero until stored.
    pub id: i64,
    pub op_id: OpId,
    /// Human-readable kind, e.g. `"update task"`.
    pub operation: String,
    pub status: SyncLogStatus,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl SyncLogEntry {
    /// Builds an entry for an attempt on `op`.
    ///
    /// The payload is only kept for `Failed`, where the queue no longer has it.
    pub fn for_op(
        op: &PendingOperation,
        status: SyncLogStatus,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        SyncLogEntry {
            id: 0,
            op_id: op.id.clone(),
            operation: op.kind.to_string(),
            status,
            timestamp,
            error,
            payload: (status == SyncLogStatus::Failed).then(|| op.payload.clone()),
        }
    }
}

impl Database {
    /// Appends an entry to the sync history and returns its row ID.
    pub fn record_sync_log(&self, entry: &SyncLogEntry) -> Result<i64> {
        let payload = entry
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO sync_log (op_id, operation, status, timestamp, error, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.op_id.as_str(),
                entry.operation,
                entry.status.as_str(),
                entry.timestamp.to_rfc3339(),
                entry.error,
                payload,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Returns the most recent entries, newest first.
    pub fn recent_sync_logs(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, op_id, operation, status, timestamp, error, payload
             FROM sync_log ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                let op_id: String = row.get(1)?;
                let status: String = row.get(3)?;
                let timestamp: String = row.get(4)?;
                let payload: Option<String> = row.get(6)?;
                Ok(SyncLogEntry {
                    id: row.get(0)?,
                    op_id: OpId::from(op_id),
                    operation: row.get(2)?,
                    status: parse_db(&status, "status")?,
                    timestamp: parse_timestamp(&timestamp, "timestamp")?,
                    error: row.get(5)?,
                    payload: payload.map(|p| parse_json(&p, "payload")).transpose()?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Deletes entries older than `days` days before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn clear_sync_logs_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - TimeDelta::days(i64::from(days));
        // RFC3339 strings in UTC compare lexicographically in time order
        let removed = self.conn.execute(
            "DELETE FROM sync_log WHERE timestamp < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
