// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for tsq-core operations.

use thiserror::Error;

/// All possible errors that can occur in tsq-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid action: '{0}'\n  hint: valid actions are: create, update, delete")]
    InvalidAction(String),

    #[error(
        "invalid entity type: '{0}'\n  hint: valid types are: task, project, section, label"
    )]
    InvalidEntityType(String),

    #[error("invalid sync log status: '{0}'")]
    InvalidLogStatus(String),

    #[error("{field} cannot be empty")]
    FieldEmpty { field: &'static str },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for tsq-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
