//! Wire-shape adapters
//!
//! The search service has answered in several layouts over time. Each one is
//! collapsed here into a plain sequence of [`RawEntry`] maps shaped like the
//! current `{id, attributes}` entry, so the normaliser only ever sees one form.

use serde_json::Value;
use tracing::warn;

use crate::model::RawEntry;

/// Extract raw entries from any known response body
///
/// Accepts `{data: [...]}`, the legacy `{logs: [{id, content}]}` list and a
/// bare array. Unknown shapes yield no entries.
pub fn entries_from_value(body: Value) -> Vec<RawEntry> {
    match body {
        Value::Array(items) => objects(items),
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove("data") {
                objects(items)
            } else if let Some(Value::Array(items)) = map.remove("logs") {
                objects(items).into_iter().map(from_legacy_entry).collect()
            } else {
                warn!("response body has neither `data` nor `logs`, treating as empty");
                Vec::new()
            }
        }
        other => {
            warn!(kind = value_kind(&other), "unexpected response body");
            Vec::new()
        }
    }
}

/// Pagination cursor for the next page, if the service returned one
pub fn next_cursor(body: &Value) -> Option<String> {
    body.pointer("/meta/page/after")
        .or_else(|| body.get("nextLogId"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string)
}

fn objects(items: Vec<Value>) -> Vec<RawEntry> {
    let total = items.len();
    let entries: Vec<RawEntry> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
    if entries.len() < total {
        warn!(dropped = total - entries.len(), "non-object entries in response");
    }
    entries
}

/// `{id, content: {...}}` becomes `{id, attributes: {...}}`
fn from_legacy_entry(mut entry: RawEntry) -> RawEntry {
    if !entry.contains_key("attributes") {
        if let Some(content) = entry.remove("content") {
            entry.insert("attributes".to_string(), content);
        }
    }
    entry
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
