//! Response normalisation
//!
//! Converts raw entries (`{id, attributes}` maps) into [`LogRecord`]s. One bad
//! entry never sinks the batch: it is skipped and reported.

pub mod sanitize;
pub mod timestamp;
pub mod trace;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::model::{Labels, LogRecord, RawEntry, Severity};

pub use sanitize::{sanitize_label_key, sanitize_record, sanitize_records};
pub use timestamp::parse_timestamp;
pub use trace::{extract_span_id, extract_trace_id};

const TIMESTAMP_FIELDS: &[&str] = &["timestamp", "@timestamp", "date"];
const MESSAGE_FIELDS: &[&str] = &["message", "msg"];
const STATUS_FIELDS: &[&str] = &["status", "level", "severity"];
const SERVICE_FIELDS: &[&str] = &["service"];
const SOURCE_FIELDS: &[&str] = &["source", "ddsource"];
const HOST_FIELDS: &[&str] = &["host", "hostname"];
const ENVIRONMENT_FIELDS: &[&str] = &["env", "environment"];
const VERSION_FIELDS: &[&str] = &["version"];
const TAGS_FIELD: &str = "tags";
const CUSTOM_ATTRIBUTES_FIELD: &str = "attributes";

/// Why an entry could not become a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntryDefect {
    #[error("missing or unparseable identifier")]
    MissingId,
    #[error("missing attributes block")]
    MissingAttributes,
}

/// Entry skipped during normalisation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entry {index} skipped: {defect}")]
pub struct PartialParseError {
    pub index: usize,
    pub defect: EntryDefect,
}

/// Normalised records plus the entries that were skipped
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub records: Vec<LogRecord>,
    pub skipped: Vec<PartialParseError>,
}

/// Normalise a batch, logging skipped entries
pub fn normalize(entries: &[RawEntry]) -> Vec<LogRecord> {
    let report = normalize_with_report(entries);
    for skipped in &report.skipped {
        warn!(index = skipped.index, defect = %skipped.defect, "skipping malformed log entry");
    }
    report.records
}

pub fn normalize_with_report(entries: &[RawEntry]) -> NormalizeReport {
    let mut report = NormalizeReport {
        records: Vec::with_capacity(entries.len()),
        skipped: Vec::new(),
    };
    for (index, entry) in entries.iter().enumerate() {
        match LogRecord::from_v2_entry(entry) {
            Ok(record) => report.records.push(record),
            Err(defect) => report.skipped.push(PartialParseError { index, defect }),
        }
    }
    report
}

impl LogRecord {
    /// Build a record from a search-API entry
    ///
    /// Legacy layouts are rewritten into this shape by [`crate::wire`] before
    /// they get here.
    pub fn from_v2_entry(entry: &RawEntry) -> Result<LogRecord, EntryDefect> {
        let id = entry.get("id").and_then(entry_id).ok_or(EntryDefect::MissingId)?;
        let attributes = entry
            .get(CUSTOM_ATTRIBUTES_FIELD)
            .and_then(Value::as_object)
            .ok_or(EntryDefect::MissingAttributes)?;

        let mut claimed: Vec<&str> = vec![TAGS_FIELD, CUSTOM_ATTRIBUTES_FIELD];
        let mut take = |fields: &[&'static str]| {
            first_present(attributes, fields).map(|(name, value)| {
                claimed.push(name);
                value
            })
        };

        let timestamp = timestamp::timestamp_or_now(take(TIMESTAMP_FIELDS));
        let body = take(MESSAGE_FIELDS).map(text_of).unwrap_or_default();
        let severity = take(STATUS_FIELDS)
            .map(|v| Severity::parse_lenient(&text_of(v)))
            .unwrap_or_default();
        let service = take(SERVICE_FIELDS).map(text_of);
        let source = take(SOURCE_FIELDS).map(text_of);
        let host = take(HOST_FIELDS).map(text_of);
        let environment = take(ENVIRONMENT_FIELDS).map(text_of);
        let version = take(VERSION_FIELDS).map(text_of);

        let tags = attributes.get(TAGS_FIELD).map(split_tags).unwrap_or_default();

        // custom attributes first, then anything unclaimed at the top level
        let custom = attributes
            .get(CUSTOM_ATTRIBUTES_FIELD)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut bag = custom.clone();
        for (key, value) in attributes {
            if !claimed.contains(&key.as_str()) {
                bag.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let trace = trace::find_correlation(&custom, trace::TRACE_ID_FIELDS)
            .or_else(|| trace::find_correlation(attributes, trace::TRACE_ID_FIELDS));
        let span = trace::find_correlation(&custom, trace::SPAN_ID_FIELDS)
            .or_else(|| trace::find_correlation(attributes, trace::SPAN_ID_FIELDS));
        for correlation in trace.iter().chain(span.iter()) {
            bag.remove(correlation.field);
        }

        Ok(LogRecord {
            id,
            timestamp,
            body,
            severity,
            labels: Labels {
                service,
                source,
                host,
                environment: environment.or_else(|| tags.get("env").cloned()),
                version: version.or_else(|| tags.get("version").cloned()),
                tags,
                attributes: bag,
                trace_id: trace.map(|c| c.id),
                span_id: span.map(|c| c.id),
            },
        })
    }
}

fn entry_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_present<'a>(
    attributes: &'a Map<String, Value>,
    fields: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    fields.iter().find_map(|&field| match attributes.get(field) {
        None | Some(Value::Null) => None,
        Some(value) => Some((field, value)),
    })
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split `key:value` tags on the first colon; bare tags map to an empty value
fn split_tags(value: &Value) -> BTreeMap<String, String> {
    let Some(items) = value.as_array() else {
        return BTreeMap::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .filter(|tag| !tag.is_empty())
        .map(|tag| match tag.split_once(':') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (tag.to_string(), String::new()),
        })
        .collect()
}
