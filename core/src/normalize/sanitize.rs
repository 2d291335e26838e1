//! Record sanitisation applied before frame construction
//!
//! Label keys are restricted to `[A-Za-z0-9_.-]`, values become bounded
//! strings. Runs after normalisation, so it only ever sees [`LogRecord`]s.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::model::{Labels, LogRecord};

pub const MAX_LABEL_KEY_LEN: usize = 100;
pub const MAX_LABEL_VALUE_LEN: usize = 1000;
pub const NUMERIC_KEY_PREFIX: &str = "field_";
pub const TRUNCATION_MARKER: &str = "...";

/// Sanitise a label key, or `None` if it must be dropped
pub fn sanitize_label_key(key: &str) -> Option<String> {
    if key.is_empty() || key.chars().count() > MAX_LABEL_KEY_LEN {
        return None;
    }
    let mapped: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if mapped.starts_with(|c: char| c.is_ascii_digit()) {
        Some(format!("{NUMERIC_KEY_PREFIX}{mapped}"))
    } else {
        Some(mapped)
    }
}

/// Canonical text form of a label value
pub fn stringify_label_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub fn truncate_label_value(value: &str) -> String {
    if value.chars().count() <= MAX_LABEL_VALUE_LEN {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(MAX_LABEL_VALUE_LEN).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

pub fn sanitize_record(record: LogRecord) -> LogRecord {
    LogRecord {
        body: record.body.trim().to_string(),
        labels: sanitize_labels(record.labels),
        ..record
    }
}

pub fn sanitize_records(records: Vec<LogRecord>) -> Vec<LogRecord> {
    records.into_iter().map(sanitize_record).collect()
}

fn sanitize_labels(labels: Labels) -> Labels {
    let bounded = |v: Option<String>| v.map(|s| truncate_label_value(&s));

    let tags: BTreeMap<String, String> = labels
        .tags
        .into_iter()
        .filter_map(|(k, v)| sanitize_label_key(&k).map(|k| (k, truncate_label_value(&v))))
        .collect();

    let attributes: Map<String, Value> = labels
        .attributes
        .into_iter()
        .filter_map(|(k, v)| {
            sanitize_label_key(&k).map(|k| {
                let text = truncate_label_value(&stringify_label_value(&v));
                (k, Value::String(text))
            })
        })
        .collect();

    Labels {
        service: bounded(labels.service),
        source: bounded(labels.source),
        host: bounded(labels.host),
        environment: bounded(labels.environment),
        version: bounded(labels.version),
        tags,
        attributes,
        trace_id: labels.trace_id,
        span_id: labels.span_id,
    }
}
