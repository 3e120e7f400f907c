// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Text rendering for command output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tsq_core::{PendingOperation, SyncErrorInfo, SyncLogEntry, SyncStatus};

use crate::sync::{DrainReport, SkipReason};

/// Characters of an operation ID shown in tables.
const SHORT_ID_LEN: usize = 8;

/// Longest error excerpt shown inline.
const MAX_INLINE_ERROR: usize = 60;

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

/// Describes an error with the operation it concerns, if any.
pub fn format_error(error: &SyncErrorInfo) -> String {
    match &error.operation {
        Some(op) => format!("{} ({} {})", error, op.kind, op.entity_id),
        None => error.to_string(),
    }
}

/// Everything `tsq status` knows, for both text and JSON output.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub remote: Option<String>,
    pub runner_active: bool,
    #[serde(flatten)]
    pub status: SyncStatus,
    /// Operations whose last attempt failed.
    pub failing: usize,
    pub error: Option<SyncErrorInfo>,
}

pub fn format_status(view: &StatusView) -> Vec<String> {
    let remote = match view.remote.as_deref() {
        Some(url) if view.status.is_online => format!("{url} (online)"),
        Some(url) => format!("{url} (offline)"),
        None => "not configured".to_string(),
    };
    let runner = if view.runner_active {
        "running"
    } else {
        "stopped"
    };
    let pending = if view.failing > 0 {
        format!("{} ({} failing)", view.status.pending_count, view.failing)
    } else {
        view.status.pending_count.to_string()
    };
    let last_sync = view
        .status
        .last_sync_at
        .map(format_time)
        .unwrap_or_else(|| "never".to_string());

    let mut lines = vec![
        format!("remote:    {remote}"),
        format!("runner:    {runner}"),
        format!("pending:   {pending}"),
        format!("last sync: {last_sync}"),
    ];
    if let Some(error) = &view.error {
        lines.push(format!("error:     {}", format_error(error)));
        lines.push("  hint: run 'tsq ack' to clear".to_string());
    }
    lines
}

/// One line per pending operation.
///
/// ```text
/// 3f2a9c1e  update task      t1  attempts=2  last error: 503 Service Unavailable
/// ```
pub fn format_pending(op: &PendingOperation) -> String {
    let mut line = format!(
        "{}  {:<16} {}",
        short_id(op.id.as_str()),
        op.kind.to_string(),
        op.entity_id
    );
    if op.attempts > 0 {
        line.push_str(&format!("  attempts={}", op.attempts));
    }
    if let Some(error) = &op.last_error {
        line.push_str(&format!(
            "  last error: {}",
            truncate(error, MAX_INLINE_ERROR)
        ));
    }
    line
}

pub fn format_log_entry(entry: &SyncLogEntry) -> String {
    let mut line = format!(
        "{}  {:<7}  {:<16} {}",
        format_time(entry.timestamp),
        entry.status.as_str(),
        entry.operation,
        short_id(entry.op_id.as_str())
    );
    if let Some(error) = &entry.error {
        line.push_str(&format!("  {}", truncate(error, MAX_INLINE_ERROR)));
    }
    line
}

/// Summary of a one-shot sync or retry.
pub fn format_report(report: &DrainReport, pending: usize) -> String {
    match report.skipped {
        Some(SkipReason::Offline) => {
            format!("remote unreachable; {pending} operation(s) remain queued")
        }
        Some(SkipReason::AlreadySyncing) => "a sync pass is already running".to_string(),
        Some(SkipReason::NothingPending) => "nothing to sync".to_string(),
        None => {
            let mut parts = vec![format!("{} applied", report.succeeded)];
            if report.retried > 0 {
                parts.push(format!("{} retrying", report.retried));
            }
            if report.rejected > 0 {
                parts.push(format!("{} rejected", report.rejected));
            }
            if report.deferred > 0 {
                parts.push(format!("{} backing off", report.deferred));
            }
            format!("synced: {}; {} pending", parts.join(", "), pending)
        }
    }
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
