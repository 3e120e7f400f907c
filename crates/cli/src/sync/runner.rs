// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background task that decides when to drain.
//!
//! Scheduling is level-triggered: any wake-up (enqueue, reconnect, periodic
//! tick, backoff deadline, or a write by another process) runs a full pass,
//! and the pass itself works out what is due. A pass is never interrupted;
//! shutdown waits for the current one to finish.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::engine::SyncEngine;

/// Runner timing.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Drain at least this often even with no other trigger.
    pub poll_interval: Duration,
    /// How often to check the log for writes by other processes.
    pub refresh_interval: Duration,
    /// Prune sync history older than this many days on start.
    pub history_retention_days: Option<u32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            poll_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(1),
            history_retention_days: Some(30),
        }
    }
}

/// Why the runner woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Reconnected,
    Enqueued,
    LogChanged,
    Tick,
    BackoffElapsed,
}

/// Handle to a running runner task.
pub struct RunnerHandle {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl RunnerHandle {
    /// Token that stops the runner when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop the runner and wait for any in-flight pass to finish.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        self.wait().await;
    }

    /// Wait for the runner to stop on its own (after the token is cancelled).
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::warn!("sync runner task failed: {}", e);
        }
    }
}

/// Spawn the runner. Must be called within a tokio runtime.
pub fn spawn(engine: SyncEngine, config: RunnerConfig) -> RunnerHandle {
    let cancel_token = CancellationToken::new();
    let task_token = cancel_token.clone();
    let task = tokio::spawn(async move {
        run_loop(engine, config, task_token).await;
    });
    RunnerHandle { cancel_token, task }
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

async fn run_loop(engine: SyncEngine, config: RunnerConfig, cancel_token: CancellationToken) {
    if let Some(days) = config.history_retention_days {
        if let Err(e) = engine.prune_history(days) {
            tracing::warn!("failed to prune sync history: {}", e);
        }
    }

    let mut online_rx = engine.connectivity_changes();
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut refresh = tokio::time::interval(config.refresh_interval);
    refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!("sync runner started");

    loop {
        let backoff_wait = engine.time_until_due();

        let trigger = tokio::select! {
            _ = cancel_token.cancelled() => break,

            changed = online_rx.changed() => {
                if changed.is_err() {
                    tracing::warn!("connectivity monitor went away, stopping runner");
                    break;
                }
                let online = *online_rx.borrow_and_update();
                engine.refresh_online();
                if !online {
                    tracing::info!("offline, pausing sync");
                    continue;
                }
                Trigger::Reconnected
            }

            _ = engine.enqueue_notified() => Trigger::Enqueued,

            _ = refresh.tick() => match engine.refresh_from_log() {
                Ok(true) => Trigger::LogChanged,
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!("failed to check log for changes: {}", e);
                    continue;
                }
            },

            _ = poll.tick() => Trigger::Tick,

            _ = sleep_for(backoff_wait) => Trigger::BackoffElapsed,
        };

        tracing::debug!("drain triggered: {:?}", trigger);
        engine.drain().await;
    }

    tracing::info!("sync runner stopped");
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
