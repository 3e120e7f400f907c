// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios for the sync module.
//!
//! These drive an engine and runner together against the mock remote:
//! - Offline edits followed by reconnect
//! - Restart in the middle of a partially synced queue
//! - Mixed success, transient and permanent outcomes across entities

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::time::Duration;

use serde_json::json;
use tempfile::tempdir;
use tsq_core::{Action, Database, SyncErrorKind, SyncLogStatus, SyncState};

use super::engine::SkipReason;
use super::runner::{self, RunnerConfig};
use super::test_helpers::{test_config, Harness, MockRemote, Outcome};

async fn wait_until(h: &Harness, pred: impl Fn(&SyncState) -> bool) {
    let mut rx = h.engine.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
        .await
        .expect("condition not reached")
        .unwrap();
}

/// Offline edit A then B of the same field must leave B on the server.
#[tokio::test]
async fn last_offline_edit_wins_after_reconnect() {
    let h = Harness::new();
    h.connectivity.set_online(false);

    h.enqueue(Action::Update, "T1", json!({"title": "A"}));
    h.enqueue(Action::Update, "T1", json!({"title": "B"}));
    assert_eq!(h.engine.status().pending_count, 2);
    assert_eq!(h.engine.drain().await.skipped, Some(SkipReason::Offline));

    h.connectivity.set_online(true);
    let report = h.engine.drain().await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(h.remote.entity("T1"), Some(json!({"title": "B"})));
    let titles: Vec<_> = h
        .remote
        .calls()
        .into_iter()
        .map(|op| op.payload["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("A"), json!("B")]);
    assert_eq!(h.engine.status().pending_count, 0);
}

#[tokio::test]
async fn pending_count_tracks_enqueues_minus_settled() {
    let h = Harness::new();
    h.remote.script("t2", [Outcome::Retryable("busy")]);
    h.remote.script("t3", [Outcome::Permanent("invalid")]);
    h.connectivity.set_online(false);

    for id in ["t1", "t2", "t3", "t4"] {
        h.enqueue(Action::Create, id, json!({}));
    }
    assert_eq!(h.engine.status().pending_count, 4);

    h.connectivity.set_online(true);
    h.engine.drain().await;

    // t1, t4 applied; t3 rejected; t2 still queued
    let status = h.engine.status();
    assert_eq!(status.pending_count, 1);
    assert!(status.has_errors);
    assert_eq!(h.engine.state().pending_operations[0].entity_id, "t2");
    // A later success may clear the rejection; history keeps it
    let rejected = h
        .engine
        .history(10)
        .unwrap()
        .into_iter()
        .find(|e| e.status == SyncLogStatus::Failed)
        .unwrap();
    assert_eq!(rejected.error.as_deref(), Some("invalid"));
}

#[tokio::test]
async fn rejection_error_survives_when_nothing_else_succeeds() {
    let h = Harness::new();
    h.remote.script("t1", [Outcome::Permanent("410 gone")]);
    h.enqueue(Action::Delete, "t1", json!(null));

    h.engine.drain().await;

    let error = h.engine.state().error.unwrap();
    assert_eq!(error.kind, SyncErrorKind::Rejected);
    assert_eq!(error.to_string(), "rejected: 410 gone");
}

#[tokio::test]
async fn restart_mid_queue_resumes_where_it_left_off() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");

    {
        let h = Harness::with(Database::open(&path).unwrap(), MockRemote::new(), test_config());
        h.remote.script("t1", [Outcome::Ok, Outcome::Retryable("reset")]);
        h.enqueue(Action::Create, "t1", json!({"title": "x"}));
        h.enqueue(Action::Update, "t1", json!({"title": "y"}));
        h.enqueue(Action::Delete, "t1", json!(null));
        h.engine.drain().await;
        assert_eq!(h.engine.status().pending_count, 2);
    }

    let h = Harness::with(Database::open(&path).unwrap(), MockRemote::new(), test_config());
    let state = h.engine.state();
    assert_eq!(state.pending_operations.len(), 2);
    assert_eq!(state.pending_operations[0].attempts, 1);
    assert_eq!(state.pending_operations[0].kind.action, Action::Update);

    h.engine.drain().await;
    let actions: Vec<Action> = h.remote.calls().into_iter().map(|op| op.kind.action).collect();
    assert_eq!(actions, vec![Action::Update, Action::Delete]);
}

#[tokio::test]
async fn runner_syncs_offline_work_on_reconnect() {
    let h = Harness::with_remote(MockRemote::with_delay(Duration::from_millis(5)));
    h.connectivity.set_online(false);
    let config = RunnerConfig {
        poll_interval: Duration::from_secs(3600),
        refresh_interval: Duration::from_secs(3600),
        history_retention_days: None,
    };
    let handle = runner::spawn(h.engine.clone(), config);

    h.enqueue(Action::Create, "p1", json!({"name": "Home"}));
    h.enqueue(Action::Create, "t1", json!({"title": "Milk"}));
    h.enqueue(Action::Update, "t1", json!({"done": true}));

    h.connectivity.set_online(true);
    wait_until(&h, |s| s.pending_operations.is_empty() && !s.is_syncing).await;
    handle.shutdown().await;

    assert_eq!(
        h.remote.entity("t1"),
        Some(json!({"title": "Milk", "done": true}))
    );
    assert_eq!(h.remote.entity("p1"), Some(json!({"name": "Home"})));
    let status = h.engine.status();
    assert!(status.last_sync_at.is_some());
    assert!(!status.has_errors);
}

#[tokio::test]
async fn drain_passes_never_overlap_under_runner() {
    let h = Harness::with_remote(MockRemote::with_delay(Duration::from_millis(20)));
    let config = RunnerConfig {
        poll_interval: Duration::from_millis(5),
        refresh_interval: Duration::from_secs(3600),
        history_retention_days: None,
    };
    let handle = runner::spawn(h.engine.clone(), config);
    for i in 0..5 {
        h.enqueue(Action::Update, "t1", json!({ "n": i }));
    }

    // Manual passes race with the runner's ticks
    for _ in 0..5 {
        h.engine.drain().await;
    }
    wait_until(&h, |s| s.pending_operations.is_empty() && !s.is_syncing).await;
    handle.shutdown().await;

    let ns: Vec<_> = h.remote.calls().into_iter().map(|op| op.payload["n"].clone()).collect();
    assert_eq!(ns, (0..5).map(|i| json!(i)).collect::<Vec<_>>());
}
