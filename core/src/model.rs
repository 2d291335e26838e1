//! Canonical data model
//!
//! Every response shape the remote service produces is funnelled into
//! [`LogRecord`]. Volume queries produce [`HistogramBucket`] series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One raw entry as delivered by the remote service: an `id` plus an
/// `attributes` block, both still untyped.
pub type RawEntry = serde_json::Map<String, serde_json::Value>;

/// Search expression in the remote filter syntax
///
/// Only produced by the translator; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchExpression(String);

impl SearchExpression {
    pub(crate) fn new(expression: String) -> Self {
        debug_assert!(!expression.is_empty());
        Self(expression)
    }

    /// Wildcard expression matching every record
    pub fn wildcard() -> Self {
        Self("*".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SearchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SearchExpression {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Log severity
///
/// Unknown or missing values map to [`Severity::Info`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// Map a status-like value onto the enumerated set
    ///
    /// Matching is case-insensitive and accepts the syslog-style spellings the
    /// remote service emits (`critical`, `emergency`, `notice`, ...).
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Severity::Trace,
            "debug" => Severity::Debug,
            "info" | "information" | "informational" | "notice" | "ok" => Severity::Info,
            "warn" | "warning" => Severity::Warn,
            "error" | "err" => Severity::Error,
            "fatal" | "critical" | "crit" | "alert" | "emergency" | "emerg" | "panic" => {
                Severity::Fatal
            }
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured labels attached to a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `key:value` tags split on the first colon
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Every attribute not claimed by a known field
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

/// Canonical log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    /// Always UTC
    pub timestamp: DateTime<Utc>,
    pub body: String,
    pub severity: Severity,
    pub labels: Labels,
}

impl LogRecord {
    /// Labels as a JSON object
    ///
    /// Falls back to an empty object if serialisation fails.
    pub fn labels_json(&self) -> serde_json::Value {
        match serde_json::to_value(&self.labels) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            Ok(_) | Err(_) => serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// One histogram point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse_lenient() {
        assert_eq!(Severity::parse_lenient("error"), Severity::Error);
        assert_eq!(Severity::parse_lenient(" Warning "), Severity::Warn);
        assert_eq!(Severity::parse_lenient("CRITICAL"), Severity::Fatal);
        assert_eq!(Severity::parse_lenient("notice"), Severity::Info);
        assert_eq!(Severity::parse_lenient("bogus"), Severity::Info);
        assert_eq!(Severity::parse_lenient(""), Severity::Info);
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Warn).unwrap();
        assert_eq!(json, "\"WARN\"");
    }

    #[test]
    fn test_labels_json_is_object() {
        let record = LogRecord {
            id: "abc".to_string(),
            timestamp: Utc::now(),
            body: "hello".to_string(),
            severity: Severity::Info,
            labels: Labels::default(),
        };
        assert_eq!(record.labels_json(), serde_json::json!({}));
    }
}
