// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::sync::Remote;

use super::sync::{pass_output, print_pass, PassOutput};
use super::{lock_state_dir, one_shot_engine, runtime, Context};

pub fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let remote: Arc<dyn Remote> = Arc::new(ctx.remote()?);
    let result = runtime()?.block_on(run_impl(ctx, remote))?;
    print_pass(&result, output)
}

/// Clears backoff on every queued operation, then drains once.
pub(crate) async fn run_impl(ctx: &Context, remote: Arc<dyn Remote>) -> Result<PassOutput> {
    let _lock = lock_state_dir(ctx)?;
    let engine = one_shot_engine(ctx, remote).await?;
    let report = engine.retry_now().await?;
    Ok(pass_output(report, &engine.state()))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
