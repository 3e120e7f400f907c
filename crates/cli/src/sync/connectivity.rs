// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity monitoring.
//!
//! A monitor answers "are we online right now?" and lets interested parties
//! wait for that answer to change. Subscribers only ever see actual
//! transitions; repeated reports of the same value are swallowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;

use super::remote::Remote;

/// Source of online/offline information.
pub trait ConnectivityMonitor: Send + Sync {
    /// Current reachability.
    fn current_status(&self) -> bool;

    /// Receiver that is notified on every online/offline transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Sets `online` on `tx`, notifying receivers only on change.
fn publish(tx: &watch::Sender<bool>, online: bool) -> bool {
    tx.send_if_modified(|current| {
        if *current == online {
            return false;
        }
        *current = online;
        true
    })
}

/// Connectivity controlled by the caller.
///
/// Used for one-shot syncs, where reachability is probed once up front, and
/// in tests.
#[derive(Debug)]
pub struct ManualConnectivity {
    tx: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        ManualConnectivity { tx }
    }

    /// Report a new status. Returns true if it differs from the previous one.
    pub fn set_online(&self, online: bool) -> bool {
        publish(&self.tx, online)
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn current_status(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Connectivity derived from a platform signal and periodic probes.
///
/// Online means the platform reports a network AND the last probe of the
/// remote succeeded; a platform signal alone is not trusted (captive
/// portals). Starts offline until the first probe answers. The background
/// task stops when the monitor is dropped or cancelled.
pub struct ProbingMonitor {
    shared: Arc<ProbeShared>,
    cancel_token: CancellationToken,
}

struct ProbeShared {
    tx: watch::Sender<bool>,
    platform_online: AtomicBool,
    probe_ok: AtomicBool,
    /// Wakes the probe loop early, e.g. when the platform comes back.
    wake: Notify,
}

impl ProbeShared {
    fn recompute(&self) -> bool {
        let online =
            self.platform_online.load(Ordering::SeqCst) && self.probe_ok.load(Ordering::SeqCst);
        if publish(&self.tx, online) {
            if online {
                tracing::info!("remote reachable, going online");
            } else {
                tracing::info!("remote unreachable, going offline");
            }
        }
        online
    }
}

impl ProbingMonitor {
    /// Start probing `remote` every `interval`. Must be called within a
    /// tokio runtime.
    pub fn spawn(remote: Arc<dyn Remote>, interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(false);
        let shared = Arc::new(ProbeShared {
            tx,
            platform_online: AtomicBool::new(true),
            probe_ok: AtomicBool::new(false),
            wake: Notify::new(),
        });
        let cancel_token = CancellationToken::new();

        let task_shared = Arc::clone(&shared);
        let task_token = cancel_token.clone();
        tokio::spawn(async move {
            probe_loop(remote, interval, task_shared, task_token).await;
        });

        ProbingMonitor {
            shared,
            cancel_token,
        }
    }

    /// Feed the host platform's network signal.
    ///
    /// Going offline takes effect immediately. Coming back triggers a probe
    /// rather than flipping online directly.
    pub fn set_platform_online(&self, online: bool) {
        self.shared.platform_online.store(online, Ordering::SeqCst);
        if online {
            self.shared.wake.notify_one();
        } else {
            self.shared.recompute();
        }
    }

    /// Stop the background probe task.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for ProbingMonitor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl ConnectivityMonitor for ProbingMonitor {
    fn current_status(&self) -> bool {
        *self.shared.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.shared.tx.subscribe()
    }
}

async fn probe_loop(
    remote: Arc<dyn Remote>,
    interval: Duration,
    shared: Arc<ProbeShared>,
    cancel_token: CancellationToken,
) {
    loop {
        // No point probing while the platform says there is no network
        if shared.platform_online.load(Ordering::SeqCst) {
            let reachable = tokio::select! {
                _ = cancel_token.cancelled() => return,
                reachable = remote.probe() => reachable,
            };
            shared.probe_ok.store(reachable, Ordering::SeqCst);
            shared.recompute();
        }

        tokio::select! {
            _ = cancel_token.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
            _ = shared.wake.notified() => {}
        }
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
