// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending operations: local mutations awaiting remote confirmation.
//!
//! Every local create/update/delete against a task, project, section, or
//! label is captured as a [`PendingOperation`]. Operations against the same
//! entity form a chain that must reach the remote service in enqueue order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The mutation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(Error::InvalidAction(s.to_string())),
        }
    }
}

/// The kind of entity a mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Task,
    Project,
    Section,
    Label,
}

impl EntityType {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Task => "task",
            EntityType::Project => "project",
            EntityType::Section => "section",
            EntityType::Label => "label",
        }
    }

    /// Collection name used by REST-style remotes (`/tasks`, `/labels`, ...).
    pub fn plural(&self) -> &'static str {
        match self {
            EntityType::Task => "tasks",
            EntityType::Project => "projects",
            EntityType::Section => "sections",
            EntityType::Label => "labels",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "task" => Ok(EntityType::Task),
            "project" => Ok(EntityType::Project),
            "section" => Ok(EntityType::Section),
            "label" => Ok(EntityType::Label),
            _ => Err(Error::InvalidEntityType(s.to_string())),
        }
    }
}

/// Tag identifying the mutation type and target entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpKind {
    pub action: Action,
    pub entity_type: EntityType,
}

impl OpKind {
    pub fn new(action: Action, entity_type: EntityType) -> Self {
        OpKind {
            action,
            entity_type,
        }
    }
}

/// Formats as `"update task"`, the label used in sync history.
impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.entity_type)
    }
}

/// Unique identifier for a pending operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(String);

impl OpId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        OpId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OpId {
    fn from(s: String) -> Self {
        OpId(s)
    }
}

impl From<&str> for OpId {
    fn from(s: &str) -> Self {
        OpId(s.to_string())
    }
}

/// Identity of the entity an operation targets.
///
/// Two operations with equal keys belong to the same chain and must be
/// applied remotely in enqueue order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub entity_type: EntityType,
    pub entity_id: String,
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// A single queued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OpId,
    pub kind: OpKind,
    pub entity_id: String,
    /// Changed fields for update, the full entity for create.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Execution attempts so far.
    pub attempts: u32,
    /// Present only after at least one failed attempt.
    pub last_error: Option<String>,
    /// When the most recent failed attempt happened.
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl PendingOperation {
    /// Creates a fresh operation with zero attempts.
    pub fn new(
        kind: OpKind,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        PendingOperation {
            id: OpId::generate(),
            kind,
            entity_id: entity_id.into(),
            payload,
            created_at,
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
        }
    }

    /// Returns the chain this operation belongs to.
    pub fn entity_key(&self) -> EntityKey {
        EntityKey {
            entity_type: self.kind.entity_type,
            entity_id: self.entity_id.clone(),
        }
    }

    /// Returns true once any attempt has failed.
    pub fn has_failed(&self) -> bool {
        self.last_error.is_some()
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
