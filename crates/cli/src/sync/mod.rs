// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline-first sync against a remote CRUD service.
//!
//! # Architecture
//!
//! ```text
//! enqueue ──► ┌─────────────┐      ┌─────────────┐     ┌─────────────┐
//!             │  SyncEngine │─────►│   Remote    │────►│   Service   │
//! status ◄─── │ (SyncState) │◄─────│   (trait)   │◄────│   (HTTP)    │
//!             └─────────────┘      └─────────────┘     └─────────────┘
//!                │      ▲
//!                ▼      │ drain triggers
//!         ┌──────────┐ ┌────────────┐   ┌──────────────┐
//!         │ SQLite   │ │   Runner   │◄──│ Connectivity │
//!         │   log    │ │ (tokio)    │   │   Monitor    │
//!         └──────────┘ └────────────┘   └──────────────┘
//! ```
//!
//! # Features
//!
//! - Durable enqueue that never waits on the network
//! - Per-entity ordering with concurrency across entities
//! - Retryable vs permanent failure classification
//! - Per-operation exponential backoff past a retry threshold
//! - Single-flight drain passes, woken by enqueue, reconnect or timer
//! - Injectable remote, connectivity and clock for testing

mod connectivity;
mod engine;
mod http;
mod remote;
pub mod runner;

pub use connectivity::{ConnectivityMonitor, ManualConnectivity, ProbingMonitor};
pub use engine::{DrainReport, EngineConfig, SkipReason, SyncEngine};
pub use http::HttpRemote;
pub use remote::{Remote, RemoteError, RemoteFuture, RemoteResult};
pub use runner::{RunnerConfig, RunnerHandle};

#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
mod integration_tests;
