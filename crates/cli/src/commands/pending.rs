// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use tsq_core::{Database, PendingOperation};

use crate::cli::OutputFormat;
use crate::display::format_pending;
use crate::error::Result;

use super::{print_json, Context};

pub fn run(ctx: &Context, limit: Option<usize>, output: OutputFormat) -> Result<()> {
    let db = ctx.open_db()?;
    let (ops, total) = run_impl(&db, limit)?;

    match output {
        OutputFormat::Json => print_json(&ops)?,
        OutputFormat::Text => {
            if ops.is_empty() {
                println!("No pending operations");
                return Ok(());
            }
            for op in &ops {
                println!("{}", format_pending(op));
            }
            if total > ops.len() {
                println!("... and {} more", total - ops.len());
            }
        }
    }
    Ok(())
}

/// Returns up to `limit` operations in send order, plus the total count.
pub(crate) fn run_impl(
    db: &Database,
    limit: Option<usize>,
) -> Result<(Vec<PendingOperation>, usize)> {
    let mut ops = db.list_pending()?;
    let total = ops.len();
    if let Some(limit) = limit {
        ops.truncate(limit);
    }
    Ok((ops, total))
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
