// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tsqrs - An offline-first sync queue for task data.
//!
//! This crate provides the sync engine and the `tsq` CLI built on it.
//! Mutations are appended to a durable SQLite log (see [`tsq_core`]) and
//! replayed against a remote service whenever it is reachable.
//!
//! # Main Components
//!
//! - [`sync::SyncEngine`] - Owns the sync state, drains the log against a [`sync::Remote`]
//! - [`sync::runner`] - Background task deciding when to drain
//! - [`sync::HttpRemote`] - REST implementation of the remote contract
//! - [`Config`] - `config.toml` in the state directory
//! - [`Error`] - Error types for all operations
//!
//! # Embedding
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tsq_core::{Action, Database, EntityType, OpKind, SystemClock};
//! use tsqrs::sync::{runner, EngineConfig, HttpRemote, ProbingMonitor, SyncEngine};
//!
//! let remote = Arc::new(HttpRemote::new("https://api.example.com", timeout, "/health")?);
//! let monitor = Arc::new(ProbingMonitor::spawn(remote.clone(), probe_interval));
//! let engine = SyncEngine::new(db, remote, monitor, Arc::new(SystemClock), EngineConfig::default())?;
//! let runner = runner::spawn(engine.clone(), Default::default());
//!
//! engine.enqueue(OpKind::new(Action::Update, EntityType::Task), "t1", json!({"title": "B"}))?;
//! let status = engine.status();
//! ```

mod cli;
mod commands;
mod display;

pub mod config;
pub mod env;
pub mod error;
pub mod sync;

pub use cli::{Cli, Command, OutputFormat};
pub use config::Config;
pub use error::{Error, Result};

use commands::Context;

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(cli: Cli) -> Result<()> {
    let state_dir = cli.state_dir.as_deref();
    // Everything but init needs the existing config
    let ctx = || Context::load(state_dir);

    match cli.command {
        Command::Init { remote, force } => commands::init::run(state_dir, remote, force),
        Command::Enqueue {
            action,
            entity_type,
            entity_id,
            data,
            output,
        } => commands::enqueue::run(&ctx()?, action, entity_type, &entity_id, data, output),
        Command::Status { output } => commands::status::run(&ctx()?, output),
        Command::Pending { limit, output } => commands::pending::run(&ctx()?, limit, output),
        Command::Sync { output } => commands::sync::run(&ctx()?, output),
        Command::Run => commands::run::run(&ctx()?),
        Command::Retry { output } => commands::retry::run(&ctx()?, output),
        Command::Ack => commands::ack::run(&ctx()?),
        Command::Log {
            limit,
            prune,
            output,
        } => commands::log::run(&ctx()?, limit, prune, output),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
