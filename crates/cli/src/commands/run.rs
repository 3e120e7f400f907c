// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `tsq run`: keep the queue drained until interrupted.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use fs2::FileExt;
use tsq_core::SystemClock;

use crate::error::{Error, Result};
use crate::sync::{runner, ConnectivityMonitor, ProbingMonitor, Remote, SyncEngine};

use super::{lock_state_dir, runtime, Context};

pub fn run(ctx: &Context) -> Result<()> {
    let remote: Arc<dyn Remote> = Arc::new(ctx.remote()?);
    let _lock = lock_state_dir(ctx)?;

    let rt = runtime()?;
    rt.block_on(run_async(ctx, remote))
}

async fn run_async(ctx: &Context, remote: Arc<dyn Remote>) -> Result<()> {
    let monitor = Arc::new(ProbingMonitor::spawn(
        remote.clone(),
        ctx.config.sync.probe_interval(),
    ));
    let connectivity: Arc<dyn ConnectivityMonitor> = monitor.clone();
    let engine = SyncEngine::new(
        ctx.open_db()?,
        remote,
        connectivity,
        Arc::new(SystemClock),
        ctx.engine_config(),
    )?;

    let status = engine.status();
    tracing::info!(
        "runner started for {} with {} pending",
        ctx.state_dir.display(),
        status.pending_count
    );
    println!(
        "Syncing {} ({} pending). Press Ctrl-C to stop.",
        ctx.state_dir.display(),
        status.pending_count
    );

    let handle = runner::spawn(engine.clone(), ctx.config.sync.runner_config());
    wait_for_shutdown_signal().await;

    tracing::info!("shutdown requested, waiting for in-flight pass");
    handle.shutdown().await;
    monitor.cancel();

    println!("Stopped with {} pending", engine.status().pending_count);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Acquire an exclusive lock on the lock file.
///
/// The lock is released when the returned file is dropped.
pub(crate) fn acquire_lock(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    // Non-blocking: a second runner fails fast
    file.try_lock_exclusive()
        .map_err(|e| Error::Io(std::io::Error::other(format!("lock already held: {}", e))))?;

    Ok(file)
}

/// Returns true if some process holds the runner lock.
pub(crate) fn is_locked(path: &Path) -> bool {
    let Ok(file) = OpenOptions::new().read(true).write(true).open(path) else {
        return false;
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            false
        }
        Err(_) => true,
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
