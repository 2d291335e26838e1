//! Trace correlation extraction
//!
//! Producers spell the correlation fields differently and emit them as
//! strings, integers or floats. Fields are tried in priority order; the first
//! one holding a usable identifier wins. Zero, empty and null count as absent.

use serde_json::{Map, Value};

pub const TRACE_ID_FIELDS: &[&str] = &["trace_id", "traceId", "trace-id", "dd.trace_id"];
pub const SPAN_ID_FIELDS: &[&str] = &["span_id", "spanId", "span-id", "dd.span_id"];

/// Correlation identifier and the field it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub id: String,
    pub field: &'static str,
}

pub fn extract_trace_id(attributes: &Map<String, Value>) -> Option<String> {
    find_correlation(attributes, TRACE_ID_FIELDS).map(|c| c.id)
}

pub fn extract_span_id(attributes: &Map<String, Value>) -> Option<String> {
    find_correlation(attributes, SPAN_ID_FIELDS).map(|c| c.id)
}

pub fn find_correlation(
    attributes: &Map<String, Value>,
    fields: &[&'static str],
) -> Option<Correlation> {
    fields.iter().find_map(|&field| {
        lookup(attributes, field)
            .and_then(id_from_value)
            .map(|id| Correlation { id, field })
    })
}

/// Flat key first, then the dotted path through nested objects
fn lookup<'a>(attributes: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(value) = attributes.get(field) {
        return Some(value);
    }
    if !field.contains('.') {
        return None;
    }
    let mut parts = field.split('.');
    let mut current = attributes.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.chars().all(|c| c == '0') {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                (u != 0).then(|| u.to_string())
            } else if let Some(i) = n.as_i64() {
                (i != 0).then(|| i.to_string())
            } else {
                let f = n.as_f64()?;
                if f == 0.0 || !f.is_finite() {
                    None
                } else if f.fract() == 0.0 {
                    Some(format!("{f:.0}"))
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}
