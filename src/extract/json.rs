//! Record discovery inside JSON payloads.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::debug;

use crate::models::Record;

/// Arrays are expanded over at most this many leading elements.
const MAX_ARRAY_EXPANSION: usize = 50;
/// Upper bound on nodes visited by the breadth-first search.
const MAX_VISITED_NODES: usize = 500;

/// Records found in a JSON document and where they were found.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRecords {
    pub records: Vec<Record>,
    /// Location of the record list, e.g. `$`, `$.data.items` or `$[0].rows`.
    pub path: String,
}

fn as_record_list(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            Some(items)
        }
        _ => None,
    }
}

fn to_records(items: &[Value]) -> Vec<Record> {
    items
        .iter()
        .filter_map(Value::as_object)
        .map(Record::from_json_object)
        .collect()
}

/// Find the best list of records in a JSON payload.
///
/// A root array of objects is returned as-is. Otherwise the largest
/// array-of-objects reachable within the search bounds wins, the first found
/// on ties. A non-empty root object with no such array becomes a single record.
pub fn extract_records_from_json(payload: &Value) -> Option<JsonRecords> {
    if let Some(items) = as_record_list(payload) {
        return Some(JsonRecords {
            records: to_records(items),
            path: "$".to_string(),
        });
    }

    if !payload.is_object() && !payload.is_array() {
        return None;
    }

    let mut best: Option<(&Vec<Value>, String)> = None;
    let mut queue: VecDeque<(&Value, String)> = VecDeque::new();
    queue.push_back((payload, "$".to_string()));
    let mut visited = 0usize;

    while let Some((node, path)) = queue.pop_front() {
        if visited >= MAX_VISITED_NODES {
            debug!("JSON search stopped after {} nodes", visited);
            break;
        }
        visited += 1;

        if let Some(items) = as_record_list(node) {
            let better = best
                .as_ref()
                .map(|(current, _)| items.len() > current.len())
                .unwrap_or(true);
            if better {
                best = Some((items, path));
            }
            continue;
        }

        match node {
            Value::Object(map) => {
                for (key, value) in map {
                    queue.push_back((value, format!("{}.{}", path, key)));
                }
            }
            Value::Array(items) => {
                for (idx, value) in items.iter().take(MAX_ARRAY_EXPANSION).enumerate() {
                    queue.push_back((value, format!("{}[{}]", path, idx)));
                }
            }
            _ => {}
        }
    }

    if let Some((items, path)) = best {
        debug!("Found {} JSON records at {}", items.len(), path);
        return Some(JsonRecords {
            records: to_records(items),
            path,
        });
    }

    match payload {
        Value::Object(map) if !map.is_empty() => Some(JsonRecords {
            records: vec![Record::from_json_object(map)],
            path: "$".to_string(),
        }),
        _ => None,
    }
}

/// Read a cursor value at a dot-separated object path such as `data.after`.
///
/// Strings come back unquoted; numbers and other values as their JSON text.
/// A missing or empty segment, a non-object along the way, or a null value
/// gives `None`.
pub fn cursor_at(payload: &Value, dotted_path: &str) -> Option<String> {
    if dotted_path.is_empty() {
        return None;
    }

    let mut node = payload;
    for part in dotted_path.split('.') {
        if part.is_empty() {
            return None;
        }
        node = node.as_object()?.get(part)?;
        if node.is_null() {
            return None;
        }
    }

    match node {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
