// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use tsq_core::{Database, SyncErrorInfo};

use crate::display::format_error;
use crate::error::Result;

use super::Context;

pub fn run(ctx: &Context) -> Result<()> {
    let db = ctx.open_db()?;
    match run_impl(&db)? {
        Some(error) => println!("Cleared: {}", format_error(&error)),
        None => println!("No error to acknowledge"),
    }
    Ok(())
}

/// Clears the persisted error and returns it. A running engine picks the
/// change up on its next log refresh.
pub(crate) fn run_impl(db: &Database) -> Result<Option<SyncErrorInfo>> {
    let error = db.last_error()?;
    if error.is_some() {
        db.set_last_error(None)?;
    }
    Ok(error)
}

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;
