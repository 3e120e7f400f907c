// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tsq-core: Shared library for the tsq offline sync queue
//!
//! This crate provides the data model, the durable operation log, backoff
//! policy, and derived sync status used by the sync engine and the `tsq` CLI.
//! Nothing in here performs network I/O.

pub mod backoff;
pub mod clock;
pub mod db;
pub mod error;
pub mod history;
pub mod op;
pub mod oplog;
pub mod state;

pub use backoff::BackoffPolicy;
pub use clock::{ClockSource, SystemClock};
pub use db::Database;
pub use error::{Error, Result};
pub use history::{SyncLogEntry, SyncLogStatus};
pub use op::{Action, EntityKey, EntityType, OpId, OpKind, PendingOperation};
pub use state::{SyncErrorInfo, SyncErrorKind, SyncState, SyncStatus};
