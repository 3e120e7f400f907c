// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync engine: owns [`SyncState`] and drains the operation log.
//!
//! A drain pass groups pending operations into per-entity chains. Chains run
//! concurrently up to `max_workers`; operations within a chain run strictly
//! in enqueue order, and the first retryable failure (or not-yet-due
//! backoff) stops its chain for the rest of the pass. A pass repeats rounds
//! until a round starts no new work, so operations enqueued mid-pass on an
//! unblocked entity go out in the same pass.
//!
//! Locking: the database mutex is taken before the state channel, and no
//! guard is ever held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tsq_core::{
    BackoffPolicy, ClockSource, Database, EntityKey, OpId, OpKind, PendingOperation, SyncErrorInfo,
    SyncLogEntry, SyncLogStatus, SyncState, SyncStatus,
};

use super::connectivity::ConnectivityMonitor;
use super::remote::{Remote, RemoteError, RemoteResult};
use crate::error::Result;

/// Tunables for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Entity chains executed concurrently.
    pub max_workers: usize,
    pub backoff: BackoffPolicy,
    /// Attempts after which a still-failing operation is reported as stalled.
    pub escalate_after: u32,
    /// Upper bound on a single remote call.
    pub call_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_workers: 4,
            backoff: BackoffPolicy::default(),
            escalate_after: 10,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a drain pass did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadySyncing,
    NothingPending,
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Operations applied remotely and removed from the log.
    pub succeeded: usize,
    /// Operations that failed transiently and stay queued.
    pub retried: usize,
    /// Operations the remote refused; removed and reported as an error.
    pub rejected: usize,
    /// Chains left untouched because their head is still backing off.
    pub deferred: usize,
    /// Set when the pass returned without attempting anything.
    pub skipped: Option<SkipReason>,
}

impl DrainReport {
    fn skipped(reason: SkipReason) -> Self {
        DrainReport {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    /// Number of remote calls made.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.retried + self.rejected
    }

    fn absorb(&mut self, chain: &ChainOutcome) {
        self.succeeded += chain.succeeded;
        self.retried += chain.retried;
        self.rejected += chain.rejected;
        self.deferred += chain.deferred;
    }
}

/// What happened to one entity chain within a round.
#[derive(Debug, Default)]
struct ChainOutcome {
    key: Option<EntityKey>,
    succeeded: usize,
    retried: usize,
    rejected: usize,
    deferred: usize,
    /// The chain must not be revisited during this pass.
    blocked: bool,
}

/// Handle to the engine. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    db: Mutex<Database>,
    /// Last `PRAGMA data_version` seen, to spot writes by other processes.
    seen_version: AtomicI64,
    state: watch::Sender<SyncState>,
    remote: Arc<dyn Remote>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    clock: Arc<dyn ClockSource>,
    config: EngineConfig,
    enqueued: Notify,
}

/// Resets `is_syncing` however the pass ends.
struct SyncingGuard<'a> {
    state: &'a watch::Sender<SyncState>,
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.is_syncing = false);
    }
}

impl SyncEngine {
    /// Create an engine over an opened log.
    ///
    /// Pending operations and the last successful sync time persisted by a
    /// previous process are loaded immediately.
    pub fn new(
        db: Database,
        remote: Arc<dyn Remote>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        clock: Arc<dyn ClockSource>,
        config: EngineConfig,
    ) -> Result<Self> {
        let state = SyncState {
            is_online: connectivity.current_status(),
            is_syncing: false,
            pending_operations: db.list_pending()?,
            last_sync_at: db.last_sync_at()?,
            error: db.last_error()?,
        };
        let seen_version = db.data_version()?;
        let (state, _rx) = watch::channel(state);

        Ok(SyncEngine {
            inner: Arc::new(EngineInner {
                db: Mutex::new(db),
                seen_version: AtomicI64::new(seen_version),
                state,
                remote,
                connectivity,
                clock,
                config,
                enqueued: Notify::new(),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Durably queue a mutation. Never touches the network.
    ///
    /// When this returns `Ok`, the operation is on disk and visible in
    /// [`SyncEngine::status`].
    pub fn enqueue(
        &self,
        kind: OpKind,
        entity_id: &str,
        payload: serde_json::Value,
    ) -> Result<OpId> {
        let now = self.inner.clock.now();
        let op = {
            let db = self.inner.lock_db();
            let op = db.enqueue(kind, entity_id, payload, now)?;
            self.inner
                .state
                .send_modify(|s| s.pending_operations.push(op.clone()));
            op
        };
        tracing::debug!("enqueued {} {} as {}", op.kind, op.entity_id, op.id);
        self.inner.enqueued.notify_one();
        Ok(op.id)
    }

    /// Derived snapshot for status indicators.
    pub fn status(&self) -> SyncStatus {
        self.inner.state.borrow().status()
    }

    /// Full copy of the current state.
    pub fn state(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    /// Resolves after the next [`SyncEngine::enqueue`] (or immediately if
    /// one happened since the last wait).
    pub async fn enqueue_notified(&self) {
        self.inner.enqueued.notified().await;
    }

    /// Receiver for connectivity transitions of the engine's monitor.
    pub fn connectivity_changes(&self) -> watch::Receiver<bool> {
        self.inner.connectivity.subscribe()
    }

    /// Pull the current connectivity into the state. Returns it.
    pub fn refresh_online(&self) -> bool {
        let online = self.inner.connectivity.current_status();
        self.inner.state.send_if_modified(|s| {
            if s.is_online == online {
                return false;
            }
            s.is_online = online;
            true
        });
        online
    }

    /// Reload pending operations and the reported error if another process
    /// wrote to the log (an enqueue, or an acknowledged error).
    ///
    /// Returns true if the log changed.
    pub fn refresh_from_log(&self) -> Result<bool> {
        let db = self.inner.lock_db();
        let version = db.data_version()?;
        if self.inner.seen_version.swap(version, Ordering::SeqCst) == version {
            return Ok(false);
        }
        let ops = db.list_pending()?;
        let error = db.last_error()?;
        self.inner.replace_pending(ops);
        self.inner.state.send_if_modified(|s| {
            if s.error == error {
                return false;
            }
            s.error = error;
            true
        });
        Ok(true)
    }

    /// Clear the reported error. Returns false if there was none.
    pub fn acknowledge_error(&self) -> Result<bool> {
        let db = self.inner.lock_db();
        db.set_last_error(None)?;
        Ok(self.inner.state.send_if_modified(|s| s.error.take().is_some()))
    }

    /// Earliest future time at which a backed-off operation becomes due.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        let now = self.inner.clock.now();
        let state = self.inner.state.borrow();
        self.inner
            .config
            .backoff
            .earliest_deadline(&state.pending_operations, now)
    }

    /// Time left until [`SyncEngine::next_deadline`], if there is one.
    pub fn time_until_due(&self) -> Option<Duration> {
        let now = self.inner.clock.now();
        let deadline = self.next_deadline()?;
        Some((deadline - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// True if some pending operation could be attempted right now.
    pub fn has_due_work(&self) -> bool {
        let now = self.inner.clock.now();
        let state = self.inner.state.borrow();
        state
            .pending_operations
            .iter()
            .any(|op| self.inner.config.backoff.is_due(op, now))
    }

    /// Make every backed-off operation due, then drain.
    pub async fn retry_now(&self) -> Result<DrainReport> {
        {
            let db = self.inner.lock_db();
            let reset = db.reset_backoff()?;
            let ops = db.list_pending()?;
            self.inner.replace_pending(ops);
            tracing::info!("reset backoff on {} operation(s)", reset);
        }
        Ok(self.drain().await)
    }

    /// Most recent sync history entries, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        Ok(self.inner.lock_db().recent_sync_logs(limit)?)
    }

    /// Remove sync history older than `days`.
    pub fn prune_history(&self, days: u32) -> Result<usize> {
        let now = self.inner.clock.now();
        let removed = self.inner.lock_db().clear_sync_logs_older_than(days, now)?;
        if removed > 0 {
            tracing::info!("pruned {} sync log entries older than {} days", removed, days);
        }
        Ok(removed)
    }

    /// Run one drain pass.
    ///
    /// Never fails: remote errors are classified per operation and storage
    /// errors are reported through the state.
    pub async fn drain(&self) -> DrainReport {
        let inner = &*self.inner;

        if !self.refresh_online() {
            return DrainReport::skipped(SkipReason::Offline);
        }

        let started = inner.state.send_if_modified(|s| {
            if s.is_syncing {
                return false;
            }
            s.is_syncing = true;
            true
        });
        if !started {
            return DrainReport::skipped(SkipReason::AlreadySyncing);
        }
        let _guard = SyncingGuard { state: &inner.state };

        let nothing_pending = inner.state.borrow().pending_operations.is_empty();
        if nothing_pending {
            return DrainReport::skipped(SkipReason::NothingPending);
        }

        let mut report = DrainReport::default();
        let mut blocked: HashSet<EntityKey> = HashSet::new();

        loop {
            if !self.refresh_online() {
                tracing::info!("went offline mid-pass, stopping");
                break;
            }

            let pending = match inner.reload_pending() {
                Ok(ops) => ops,
                Err(e) => {
                    inner.report_storage_error(&e);
                    break;
                }
            };
            let chains = group_chains(pending, &blocked);
            if chains.is_empty() {
                break;
            }

            let outcomes: Vec<ChainOutcome> = stream::iter(chains)
                .map(|(key, ops)| inner.run_chain(key, ops))
                .buffer_unordered(inner.config.max_workers.max(1))
                .collect()
                .await;

            for outcome in outcomes {
                report.absorb(&outcome);
                if let (true, Some(key)) = (outcome.blocked, outcome.key) {
                    blocked.insert(key);
                }
            }
        }

        let emptied = inner.state.borrow().pending_operations.is_empty();
        if emptied {
            inner.mark_synced();
        }

        tracing::info!(
            "sync pass: {} applied, {} retrying, {} rejected, {} deferred",
            report.succeeded,
            report.retried,
            report.rejected,
            report.deferred
        );
        report
    }
}

/// Group operations into chains keyed by entity, ordered by first
/// appearance, skipping chains already blocked this pass.
fn group_chains(
    ops: Vec<PendingOperation>,
    blocked: &HashSet<EntityKey>,
) -> Vec<(EntityKey, Vec<PendingOperation>)> {
    let mut chains: Vec<(EntityKey, Vec<PendingOperation>)> = Vec::new();
    let mut index: HashMap<EntityKey, usize> = HashMap::new();

    for op in ops {
        let key = op.entity_key();
        if blocked.contains(&key) {
            continue;
        }
        match index.get(&key) {
            Some(&i) => chains[i].1.push(op),
            None => {
                index.insert(key.clone(), chains.len());
                chains.push((key, vec![op]));
            }
        }
    }
    chains
}

impl EngineInner {
    fn lock_db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_pending(&self, ops: Vec<PendingOperation>) {
        self.state.send_if_modified(|s| {
            if s.pending_operations == ops {
                return false;
            }
            s.pending_operations = ops;
            true
        });
    }

    /// Re-read the log so the pass sees operations from any source.
    fn reload_pending(&self) -> Result<Vec<PendingOperation>> {
        let db = self.lock_db();
        let ops = db.list_pending()?;
        self.replace_pending(ops.clone());
        Ok(ops)
    }

    async fn run_chain(&self, key: EntityKey, ops: Vec<PendingOperation>) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();

        for op in ops {
            if !self.connectivity.current_status() {
                outcome.blocked = true;
                break;
            }
            if !self.config.backoff.is_due(&op, self.clock.now()) {
                tracing::debug!("{} {} not due yet, deferring {}", op.kind, op.entity_id, key);
                outcome.deferred += 1;
                outcome.blocked = true;
                break;
            }

            let mut result = self.call_remote(&op).await;
            // A refusal observed while the link was dropping is not trustworthy
            if let Err(RemoteError::Permanent(message)) = &result {
                if !self.connectivity.current_status() {
                    result = Err(RemoteError::Retryable(message.clone()));
                }
            }

            match result {
                Ok(()) => {
                    if let Err(e) = self.complete(&op) {
                        self.report_storage_error(&e);
                        outcome.blocked = true;
                        break;
                    }
                    outcome.succeeded += 1;
                }
                Err(RemoteError::Retryable(message)) => {
                    if let Err(e) = self.fail_attempt(&op, &message) {
                        self.report_storage_error(&e);
                    }
                    outcome.retried += 1;
                    outcome.blocked = true;
                    break;
                }
                Err(RemoteError::Permanent(message)) => {
                    outcome.rejected += 1;
                    if let Err(e) = self.reject(&op, &message) {
                        self.report_storage_error(&e);
                        outcome.blocked = true;
                        break;
                    }
                }
            }
        }

        outcome.key = Some(key);
        outcome
    }

    /// Execute one remote call, bounded by the call timeout. A panic inside
    /// the remote is caught and counted as a transient failure.
    async fn call_remote(&self, op: &PendingOperation) -> RemoteResult<()> {
        tracing::debug!("sending {} {} ({})", op.kind, op.entity_id, op.id);
        let call = AssertUnwindSafe(async { self.remote.execute(op).await }).catch_unwind();

        match tokio::time::timeout(self.config.call_timeout, call).await {
            Err(_) => Err(RemoteError::Retryable(format!(
                "timed out after {}ms",
                self.config.call_timeout.as_millis()
            ))),
            Ok(Err(panic)) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!("remote panicked on {}: {}", op.id, message);
                Err(RemoteError::Retryable(format!("remote call panicked: {message}")))
            }
            Ok(Ok(result)) => result,
        }
    }

    fn complete(&self, op: &PendingOperation) -> Result<()> {
        let now = self.clock.now();
        let db = self.lock_db();
        db.remove(&op.id)?;
        self.record_history(&db, op, SyncLogStatus::Success, None, now);

        let resolves_error = self
            .state
            .borrow()
            .error
            .as_ref()
            .is_some_and(|e| e.cleared_by_success_of(op));
        if resolves_error {
            self.persist_error(&db, None);
        }
        self.state.send_modify(|s| {
            s.pending_operations.retain(|p| p.id != op.id);
            if resolves_error {
                s.error = None;
            }
        });
        tracing::debug!("applied {} {}", op.kind, op.entity_id);
        Ok(())
    }

    fn fail_attempt(&self, op: &PendingOperation, message: &str) -> Result<()> {
        let now = self.clock.now();
        let db = self.lock_db();
        let Some(updated) = db.record_attempt_failure(&op.id, message, now)? else {
            return Ok(());
        };
        self.record_history(&db, &updated, SyncLogStatus::Pending, Some(message), now);

        tracing::warn!(
            "{} {} failed (attempt {}): {}",
            updated.kind,
            updated.entity_id,
            updated.attempts,
            message
        );

        let stalled = (updated.attempts > self.config.escalate_after)
            .then(|| SyncErrorInfo::stalled(updated.clone(), now));
        if let Some(info) = &stalled {
            self.persist_error(&db, Some(info));
        }
        self.state.send_modify(|s| {
            if let Some(slot) = s.pending_operations.iter_mut().find(|p| p.id == updated.id) {
                *slot = updated.clone();
            }
            if stalled.is_some() {
                s.error = stalled;
            }
        });
        Ok(())
    }

    fn reject(&self, op: &PendingOperation, message: &str) -> Result<()> {
        let now = self.clock.now();
        let db = self.lock_db();
        let abandoned = db
            .record_attempt_failure(&op.id, message, now)?
            .unwrap_or_else(|| op.clone());
        db.remove(&op.id)?;
        self.record_history(&db, &abandoned, SyncLogStatus::Failed, Some(message), now);

        tracing::warn!(
            "{} {} rejected, dropping {}: {}",
            op.kind,
            op.entity_id,
            op.id,
            message
        );

        let info = SyncErrorInfo::rejected(abandoned, message, now);
        self.persist_error(&db, Some(&info));
        self.state.send_modify(|s| {
            s.pending_operations.retain(|p| p.id != op.id);
            s.error = Some(info);
        });
        Ok(())
    }

    /// History is best-effort: losing an entry must not fail the attempt.
    fn record_history(
        &self,
        db: &Database,
        op: &PendingOperation,
        status: SyncLogStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) {
        let entry = SyncLogEntry::for_op(op, status, error.map(str::to_string), at);
        if let Err(e) = db.record_sync_log(&entry) {
            tracing::warn!("failed to record sync history for {}: {}", op.id, e);
        }
    }

    /// Errors are persisted so other processes can report them. Failing to
    /// do so only costs that visibility.
    fn persist_error(&self, db: &Database, error: Option<&SyncErrorInfo>) {
        if let Err(e) = db.set_last_error(error) {
            tracing::warn!("failed to persist sync error: {}", e);
        }
    }

    fn report_storage_error(&self, err: &crate::error::Error) {
        tracing::warn!("storage error during sync: {}", err);
        let info = SyncErrorInfo::storage(err.to_string(), self.clock.now());
        self.persist_error(&self.lock_db(), Some(&info));
        self.state.send_modify(|s| s.error = Some(info));
    }

    fn mark_synced(&self) {
        let now = self.clock.now();
        if let Err(e) = self.lock_db().set_last_sync_at(now) {
            tracing::warn!("failed to persist last sync time: {}", e);
        }
        self.state.send_modify(|s| s.last_sync_at = Some(now));
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
