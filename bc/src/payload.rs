//! Payload shaping
//!
//! Turns `(AgentMetadata, DomainEvent)` into the content map handed to the
//! queue: shaped agent metadata first, then the event data with empty values
//! stripped. Event data wins on key collisions.

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::events::{AgentMetadata, DomainEvent, ModuleName};

/// True for `null`, `""`, `[]` and `{}`
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Recursively drop empty values from an object
///
/// Nested objects are filtered first, so an object left empty by filtering is
/// dropped as well. Array elements are kept, but objects inside arrays are
/// filtered.
pub fn remove_empty_values(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .filter_map(|(key, value)| {
            let value = strip(value);
            (!is_empty_value(&value)).then(|| (key.clone(), value))
        })
        .collect()
}

fn strip(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(remove_empty_values(map)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Value::Object(remove_empty_values(map)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Agent metadata as embedded for a given module
///
/// The vulnerability consumer gets the full structure; every other index only
/// carries `id` and `groups`.
pub fn shape_agent(agent: &AgentMetadata, module: ModuleName) -> Result<Value, ClientError> {
    match module {
        ModuleName::Vulnerability => {
            serde_json::to_value(agent).map_err(|e| ClientError::MalformedEvent(format!("agent metadata: {}", e)))
        }
        ModuleName::Fim | ModuleName::Inventory | ModuleName::Sca => Ok(json!({
            "id": agent.id,
            "groups": agent.groups,
        })),
    }
}

/// Validate inputs and assemble the transport content
pub fn build_content(agent: &AgentMetadata, event: &DomainEvent) -> Result<Map<String, Value>, ClientError> {
    let module = event.module();
    debug!(agent_id = %agent.id, %module, "build_content: called");

    if agent.id.trim().is_empty() {
        return Err(ClientError::MalformedEvent("agent id is empty".to_string()));
    }

    let data = remove_empty_values(event.data());
    if data.is_empty() {
        return Err(ClientError::MalformedEvent(format!(
            "{} event carries no non-empty data",
            module
        )));
    }

    let mut content = Map::new();
    content.insert("agent".to_string(), shape_agent(agent, module)?);

    for (key, value) in data {
        if content.contains_key(&key) {
            warn!(%key, %module, "Event data overrides agent metadata field");
        }
        content.insert(key, value);
    }

    Ok(content)
}
