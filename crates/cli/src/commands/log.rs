// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use tsq_core::{Database, SyncLogEntry};

use crate::cli::OutputFormat;
use crate::display::format_log_entry;
use crate::error::Result;

use super::{print_json, Context};

pub fn run(ctx: &Context, limit: usize, prune: Option<u32>, output: OutputFormat) -> Result<()> {
    let db = ctx.open_db()?;
    let (entries, pruned) = run_impl(&db, limit, prune, Utc::now())?;

    if let Some(removed) = pruned {
        // Keep JSON on stdout parseable
        eprintln!("Pruned {} entries", removed);
    }
    match output {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No sync history");
            }
            for entry in &entries {
                println!("{}", format_log_entry(entry));
            }
        }
    }
    Ok(())
}

/// Optionally prunes entries older than `prune` days, then returns the
/// newest `limit` entries and the number pruned.
pub(crate) fn run_impl(
    db: &Database,
    limit: usize,
    prune: Option<u32>,
    now: DateTime<Utc>,
) -> Result<(Vec<SyncLogEntry>, Option<usize>)> {
    let pruned = match prune {
        Some(days) => Some(db.clear_sync_logs_older_than(days, now)?),
        None => None,
    };
    let entries = db.recent_sync_logs(limit)?;
    Ok((entries, pruned))
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
