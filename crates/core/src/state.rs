// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync state and the read-only status derived from it.
//!
//! [`SyncState`] has a single owner (the sync engine). Presentation code only
//! ever sees [`SyncStatus`], which is recomputed from the state on every read
//! and carries no state of its own.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::{parse_json, Database};
use crate::error::Result;
use crate::op::PendingOperation;

const META_LAST_ERROR: &str = "last_error";

/// Category of a state-level sync error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// The remote permanently rejected an operation; it was dropped from the queue.
    Rejected,
    /// An operation has kept failing past the escalation threshold.
    Stalled,
    /// The operation log could not be read or written.
    Storage,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::Rejected => "rejected",
            SyncErrorKind::Stalled => "stalled",
            SyncErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Most recent unrecoverable sync failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorInfo {
    pub kind: SyncErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
    /// The operation involved. For rejections this is the only remaining
    /// copy of the discarded mutation.
    pub operation: Option<PendingOperation>,
}

impl SyncErrorInfo {
    pub fn rejected(op: PendingOperation, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        SyncErrorInfo {
            kind: SyncErrorKind::Rejected,
            message: message.into(),
            at,
            operation: Some(op),
        }
    }

    pub fn stalled(op: PendingOperation, at: DateTime<Utc>) -> Self {
        let message = format!(
            "{} {} has failed {} times: {}",
            op.kind,
            op.entity_id,
            op.attempts,
            op.last_error.as_deref().unwrap_or("unknown error")
        );
        SyncErrorInfo {
            kind: SyncErrorKind::Stalled,
            message,
            at,
            operation: Some(op),
        }
    }

    pub fn storage(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        SyncErrorInfo {
            kind: SyncErrorKind::Storage,
            message: message.into(),
            at,
            operation: None,
        }
    }

    /// Returns true if a successful send of `op` resolves this error.
    ///
    /// Rejections stay until acknowledged. A stall clears once its own
    /// operation goes through, a storage error on any success.
    pub fn cleared_by_success_of(&self, op: &PendingOperation) -> bool {
        match self.kind {
            SyncErrorKind::Rejected => false,
            SyncErrorKind::Stalled => self.operation.as_ref().is_some_and(|o| o.id == op.id),
            SyncErrorKind::Storage => true,
        }
    }
}

impl fmt::Display for SyncErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Process-wide sync state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    pub is_online: bool,
    pub is_syncing: bool,
    /// Enqueue order.
    pub pending_operations: Vec<PendingOperation>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub error: Option<SyncErrorInfo>,
}

impl SyncState {
    /// Returns the derived status for presentation code.
    pub fn status(&self) -> SyncStatus {
        SyncStatus::from(self)
    }
}

/// Read-only snapshot for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub pending_count: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub has_errors: bool,
}

impl From<&SyncState> for SyncStatus {
    fn from(state: &SyncState) -> Self {
        SyncStatus {
            is_online: state.is_online,
            // A pass that outlives a disconnect only finishes calls already in flight
            is_syncing: state.is_syncing && state.is_online,
            pending_count: state.pending_operations.len(),
            last_sync_at: state.last_sync_at,
            has_errors: state.error.is_some()
                || state.pending_operations.iter().any(PendingOperation::has_failed),
        }
    }
}

impl Database {
    /// Returns the persisted state error, if any.
    ///
    /// Kept so that a process other than the one that hit the error (e.g.
    /// `tsq status` while `tsq run` drains) can still report it.
    pub fn last_error(&self) -> Result<Option<SyncErrorInfo>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_LAST_ERROR],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            None => Ok(None),
            Some(s) => {
                let value = parse_json(&s, "meta.last_error")?;
                Ok(Some(serde_json::from_value(value)?))
            }
        }
    }

    /// Persists (or with `None`, clears) the state error.
    pub fn set_last_error(&self, error: Option<&SyncErrorInfo>) -> Result<()> {
        match error {
            Some(info) => {
                self.conn.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![META_LAST_ERROR, serde_json::to_string(info)?],
                )?;
            }
            None => {
                self.conn
                    .execute("DELETE FROM meta WHERE key = ?1", params![META_LAST_ERROR])?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
