// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use chrono::TimeDelta;
use serde_json::json;
use tsq_core::{Action, EntityType, OpKind, PendingOperation, SyncLogStatus};

fn record(db: &Database, entity_id: &str, at: DateTime<Utc>) {
    let op = PendingOperation::new(
        OpKind::new(Action::Update, EntityType::Task),
        entity_id,
        json!({}),
        at,
    );
    db.record_sync_log(&SyncLogEntry::for_op(&op, SyncLogStatus::Success, None, at))
        .unwrap();
}

#[test]
fn lists_newest_first_up_to_limit() {
    let db = Database::open_in_memory().unwrap();
    let now = Utc::now();
    for (i, id) in ["old", "mid", "new"].into_iter().enumerate() {
        record(&db, id, now - TimeDelta::minutes(10 - i as i64));
    }

    let (entries, pruned) = run_impl(&db, 2, None, now).unwrap();

    assert_eq!(pruned, None);
    assert_eq!(entries.len(), 2);
    assert!(entries[0].timestamp > entries[1].timestamp);
}

#[test]
fn prune_runs_before_listing() {
    let db = Database::open_in_memory().unwrap();
    let now = Utc::now();
    record(&db, "ancient", now - TimeDelta::days(40));
    record(&db, "recent", now - TimeDelta::days(1));

    let (entries, pruned) = run_impl(&db, 10, Some(30), now).unwrap();

    assert_eq!(pruned, Some(1));
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].timestamp, now - TimeDelta::days(1));
}
