// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tsq_core::{Action, EntityType};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "tsq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "An offline-first sync queue for task data")]
#[command(
    long_about = "An offline-first sync queue for task data.\n\n\
    Mutations are queued durably on disk and replayed against a remote \
    service, in order per entity, whenever it is reachable."
)]
pub struct Cli {
    /// Directory holding the queue database and config
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the state directory and configuration
    #[command(after_help = "\
Examples:
  tsq init                                    Queue locally, configure remote later
  tsq init --remote https://api.example.com   Sync with a remote service
  tsq init --remote http://localhost:8080 --force   Overwrite existing config")]
    Init {
        /// Base URL of the remote service
        #[arg(long)]
        remote: Option<String>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Queue a mutation for sync
    #[command(after_help = "\
Examples:
  tsq enqueue create task t1 -d '{\"title\": \"Buy milk\"}'
  tsq enqueue update task t1 -d '{\"done\": true}'
  tsq enqueue delete project p1")]
    Enqueue {
        /// Mutation kind (create, update, delete)
        action: Action,

        /// Entity type (task, project, section, label)
        entity_type: EntityType,

        /// ID of the entity being changed
        #[arg(value_parser = non_empty_string)]
        entity_id: String,

        /// JSON payload: the full entity for create, changed fields for update
        #[arg(long, short)]
        data: Option<String>,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show sync status
    Status {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// List queued operations in the order they will be sent
    Pending {
        /// Maximum number of operations to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Run one sync pass and exit
    Sync {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Keep syncing in the foreground until interrupted
    Run,

    /// Retry backed-off operations immediately
    Retry {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Acknowledge and clear the last sync error
    Ack,

    /// Show sync history
    #[command(after_help = "\
Examples:
  tsq log                Show the 20 most recent attempts
  tsq log -n 100         Show more
  tsq log --prune 7      Delete entries older than a week first")]
    Log {
        /// Maximum number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Delete entries older than this many days before listing
        #[arg(long, value_name = "DAYS")]
        prune: Option<u32>,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },
}

#[cfg(test)]
#[path = "../cli_tests.rs"]
mod tests;
