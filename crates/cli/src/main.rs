// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fs;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tsqrs::config::{log_path, resolve_state_dir};
use tsqrs::{env, Cli, Command};

fn main() {
    let cli = Cli::parse();
    setup_logging(&cli);
    if let Err(e) = tsqrs::run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Installs the tracing subscriber.
///
/// `tsq run` is long-lived and logs to `<state_dir>/tsq.log` at `info`;
/// every other command logs warnings to stderr. `TSQ_LOG` or `RUST_LOG`
/// override the level.
fn setup_logging(cli: &Cli) {
    let is_runner = matches!(cli.command, Command::Run);
    let default_level = if is_runner { "info" } else { "warn" };
    let filter = env::log_filter()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    let log_file = is_runner
        .then(|| resolve_state_dir(cli.state_dir.as_deref()).ok())
        .flatten()
        .and_then(|dir| {
            fs::create_dir_all(&dir).ok()?;
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path(&dir))
                .ok()
        });

    // Try the log file, fall back to stderr
    let result = match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("warning: logging disabled: {}", e);
    }
}
