// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::display::{format_error, format_report};
use crate::error::Result;
use crate::sync::{DrainReport, Remote};

use super::{lock_state_dir, one_shot_engine, print_json, runtime, Context};

/// Outcome of a one-shot pass, as printed.
#[derive(Debug, Serialize)]
pub(crate) struct PassOutput {
    #[serde(flatten)]
    pub report: DrainReport,
    pub pending_count: usize,
    pub error: Option<String>,
}

pub fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let remote: Arc<dyn Remote> = Arc::new(ctx.remote()?);
    let result = runtime()?.block_on(run_impl(ctx, remote))?;
    print_pass(&result, output)
}

/// Drains once against `remote` and waits for the pass to finish.
///
/// Refused while `tsq run` or another pass holds the drain lock.
pub(crate) async fn run_impl(ctx: &Context, remote: Arc<dyn Remote>) -> Result<PassOutput> {
    let _lock = lock_state_dir(ctx)?;
    let engine = one_shot_engine(ctx, remote).await?;
    let report = engine.drain().await;
    Ok(pass_output(report, &engine.state()))
}

pub(crate) fn pass_output(report: DrainReport, state: &tsq_core::SyncState) -> PassOutput {
    PassOutput {
        report,
        pending_count: state.pending_operations.len(),
        error: state.error.as_ref().map(format_error),
    }
}

pub(crate) fn print_pass(result: &PassOutput, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Text => {
            println!("{}", format_report(&result.report, result.pending_count));
            if let Some(error) = &result.error {
                println!("error: {}", error);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
