// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use crate::config::{config_path, resolve_state_dir, Config, RemoteConfig};
use crate::error::{Error, Result};

use super::Context;

pub fn run(state_dir: Option<&Path>, remote: Option<String>, force: bool) -> Result<()> {
    let state_dir = resolve_state_dir(state_dir)?;
    let ctx = run_impl(&state_dir, remote, force)?;

    println!("Initialized sync queue at {}", ctx.state_dir.display());
    match &ctx.config.remote {
        Some(remote) => println!("Remote: {}", remote.url),
        None => println!("No remote configured; operations will be queued only"),
    }
    Ok(())
}

/// Writes the config and creates the database. Returns the new context.
pub(crate) fn run_impl(state_dir: &Path, remote: Option<String>, force: bool) -> Result<Context> {
    let path = config_path(state_dir);
    if path.exists() && !force {
        return Err(Error::AlreadyInitialized(state_dir.display().to_string()));
    }

    // Keep tuning from an existing config when re-initializing
    let mut config = if path.exists() {
        Config::load(state_dir).unwrap_or_default()
    } else {
        Config::default()
    };
    config.remote = match remote {
        Some(url) => {
            let remote = RemoteConfig::new(url.trim_end_matches('/'));
            if remote.validate_url().is_some() {
                return Err(Error::InvalidRemoteUrl(url));
            }
            Some(remote)
        }
        None => None,
    };
    config.save(state_dir)?;

    let ctx = Context {
        state_dir: state_dir.to_path_buf(),
        config,
    };
    ctx.open_db()?;
    Ok(ctx)
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
