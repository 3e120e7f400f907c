// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod ack;
pub mod enqueue;
pub mod init;
pub mod log;
pub mod pending;
pub mod retry;
pub mod run;
pub mod status;
pub mod sync;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tsq_core::{Database, SystemClock};

use crate::config::{db_path, lock_path, resolve_state_dir, Config};
use crate::error::{Error, Result};
use crate::sync::{EngineConfig, HttpRemote, ManualConnectivity, Remote, SyncEngine};

/// Resolved state directory and its configuration.
#[derive(Debug)]
pub struct Context {
    pub state_dir: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn load(state_dir: Option<&Path>) -> Result<Self> {
        let state_dir = resolve_state_dir(state_dir)?;
        let config = Config::load(&state_dir)?;
        Ok(Context { state_dir, config })
    }

    /// Opens the queue database, creating the state directory if needed.
    pub fn open_db(&self) -> Result<Database> {
        fs::create_dir_all(&self.state_dir)?;
        Ok(Database::open(&db_path(&self.state_dir))?)
    }

    /// HTTP client for the configured remote.
    pub fn remote(&self) -> Result<HttpRemote> {
        let remote = self.config.require_remote()?;
        HttpRemote::new(&remote.url, remote.timeout(), &remote.health_path)
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.config.sync.engine_config(self.config.call_timeout())
    }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(std::io::Error::other(format!("tokio: {}", e))))
}

/// Takes the state directory's drain lock, held until the file is dropped.
///
/// Only one process may drain a queue at a time.
pub(crate) fn lock_state_dir(ctx: &Context) -> Result<File> {
    fs::create_dir_all(&ctx.state_dir)?;
    run::acquire_lock(&lock_path(&ctx.state_dir))
        .map_err(|_| Error::AlreadyRunning(ctx.state_dir.display().to_string()))
}

/// Engine for a command that syncs once and exits.
///
/// Connectivity is decided by a single probe up front.
pub(crate) async fn one_shot_engine(
    ctx: &Context,
    remote: Arc<dyn Remote>,
) -> Result<SyncEngine> {
    let online = remote.probe().await;
    if !online {
        tracing::info!("remote unreachable; operations stay queued");
    }
    SyncEngine::new(
        ctx.open_db()?,
        remote,
        Arc::new(ManualConnectivity::new(online)),
        Arc::new(SystemClock),
        ctx.engine_config(),
    )
}

/// Prints `value` as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
