// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote service abstraction.
//!
//! The sync engine only needs a three-way answer per operation: applied,
//! worth retrying, or rejected for good. Concrete transports (HTTP in
//! production, mocks in tests) implement [`Remote`] and map their own
//! failures onto [`RemoteError`].

use std::future::Future;
use std::pin::Pin;

use tsq_core::PendingOperation;

/// Failure classification for a remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network unreachable, timeout, overload. The operation stays queued.
    #[error("{0}")]
    Retryable(String),

    /// Validation failure, conflict, entity gone. Retrying cannot help.
    #[error("{0}")]
    Permanent(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Retryable(_))
    }

    pub fn message(&self) -> &str {
        match self {
            RemoteError::Retryable(m) | RemoteError::Permanent(m) => m,
        }
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by [`Remote`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A remote service that can apply queued operations.
///
/// Implementations must be shareable: the engine calls `execute` for
/// independent entities concurrently.
pub trait Remote: Send + Sync {
    /// Apply one operation remotely.
    fn execute<'a>(&'a self, op: &'a PendingOperation) -> RemoteFuture<'a, RemoteResult<()>>;

    /// Check whether the service is reachable at all.
    fn probe(&self) -> RemoteFuture<'_, bool>;
}
