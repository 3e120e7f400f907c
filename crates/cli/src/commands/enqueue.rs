// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::{json, Value};
use tsq_core::{Action, Database, EntityType, OpKind, PendingOperation};

use crate::cli::OutputFormat;
use crate::error::{Error, Result};

use super::{print_json, Context};

pub fn run(
    ctx: &Context,
    action: Action,
    entity_type: EntityType,
    entity_id: &str,
    data: Option<String>,
    output: OutputFormat,
) -> Result<()> {
    let db = ctx.open_db()?;
    let op = run_impl(&db, action, entity_type, entity_id, data.as_deref())?;

    match output {
        OutputFormat::Text => println!("{}", op.id),
        OutputFormat::Json => print_json(&json!({
            "id": op.id,
            "kind": op.kind.to_string(),
            "entity_id": op.entity_id,
            "pending_count": db.pending_count()?,
        }))?,
    }
    Ok(())
}

/// Validates the payload and appends the operation to the log.
///
/// The runner (if any) notices the write on its next refresh; nothing here
/// touches the network.
pub(crate) fn run_impl(
    db: &Database,
    action: Action,
    entity_type: EntityType,
    entity_id: &str,
    data: Option<&str>,
) -> Result<PendingOperation> {
    let payload = parse_payload(action, data)?;
    let op = db.enqueue(
        OpKind::new(action, entity_type),
        entity_id,
        payload,
        chrono::Utc::now(),
    )?;
    tracing::debug!("enqueued {} {} as {}", op.kind, op.entity_id, op.id);
    Ok(op)
}

/// Create and update carry a JSON object; delete carries nothing.
fn parse_payload(action: Action, data: Option<&str>) -> Result<Value> {
    match (action, data) {
        (Action::Delete, None) => Ok(Value::Null),
        (Action::Delete, Some(_)) => Err(Error::InvalidPayload(
            "delete does not take --data".to_string(),
        )),
        (_, None) => Err(Error::InvalidPayload(format!("{} requires --data", action))),
        (_, Some(raw)) => {
            let value: Value = serde_json::from_str(raw)
                .map_err(|e| Error::InvalidPayload(e.to_string()))?;
            if !value.is_object() {
                return Err(Error::InvalidPayload("expected a JSON object".to_string()));
            }
            Ok(value)
        }
    }
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
