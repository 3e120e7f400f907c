// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use tsq_core::{Database, SyncState};

use crate::cli::OutputFormat;
use crate::config::lock_path;
use crate::display::{format_status, StatusView};
use crate::error::Result;
use crate::sync::Remote;

use super::run::is_locked;
use super::{print_json, runtime, Context};

pub fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let online = match ctx.config.remote {
        Some(_) => {
            let remote = ctx.remote()?;
            runtime()?.block_on(remote.probe())
        }
        None => false,
    };
    let db = ctx.open_db()?;
    let view = run_impl(ctx, &db, online)?;

    match output {
        OutputFormat::Text => {
            for line in format_status(&view) {
                println!("{}", line);
            }
        }
        OutputFormat::Json => print_json(&view)?,
    }
    Ok(())
}

/// Assembles the status from the persisted log, with connectivity supplied
/// by the caller.
pub(crate) fn run_impl(ctx: &Context, db: &Database, online: bool) -> Result<StatusView> {
    let pending = db.list_pending()?;
    let failing = pending.iter().filter(|op| op.has_failed()).count();
    let runner_active = is_locked(&lock_path(&ctx.state_dir));
    let state = SyncState {
        is_online: online,
        // Only a runner drains in the background; a pass may or may not be
        // in progress, so report it as idle
        is_syncing: false,
        pending_operations: pending,
        last_sync_at: db.last_sync_at()?,
        error: db.last_error()?,
    };

    Ok(StatusView {
        remote: ctx.config.remote.as_ref().map(|r| r.url.clone()),
        runner_active,
        status: state.status(),
        failing,
        error: state.error,
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
