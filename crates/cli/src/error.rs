// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the tsqrs library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no remote configured\n  hint: run 'tsq init --remote <url>' first")]
    NoRemote,

    #[error("invalid remote URL '{0}': must start with http:// or https://")]
    InvalidRemoteUrl(String),

    #[error("invalid payload: {0}\n  hint: --data expects a JSON object, e.g. '{{\"title\": \"A\"}}'")]
    InvalidPayload(String),

    #[error("already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("sync already active for {0}\n  hint: another 'tsq run' or 'tsq sync' holds the lock")]
    AlreadyRunning(String),

    #[error("remote client error: {0}")]
    RemoteClient(String),

    #[error("invalid {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error(transparent)]
    Core(#[from] tsq_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// A specialized Result type for tsqrs operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
