//! Inbound query model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;

/// What a query produces
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    /// Raw log lines
    #[default]
    Logs,
    /// Record counts over time
    LogsVolume,
}

/// Query as authored in the panel editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryModel {
    #[serde(alias = "query")]
    pub query_text: String,
    #[serde(alias = "queryType")]
    pub kind: QueryKind,
    pub hide: bool,
    /// Result-size hint
    pub limit: Option<usize>,
    /// Opaque marker set by the frontend; any truthy value hides the query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<Value>,
}

impl QueryModel {
    pub fn new(query_text: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            query_text: query_text.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_hidden(&self) -> bool {
        self.hide || self.hidden.as_ref().map(truthy).unwrap_or(false)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Requested time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Window ending now
    pub fn last(duration: Duration) -> Self {
        let to = Utc::now();
        Self {
            from: to - duration,
            to,
        }
    }

    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.from >= self.to {
            return Err(QueryError::Validation(format!(
                "time range is empty: from {} is not before to {}",
                self.from.to_rfc3339(),
                self.to.to_rfc3339()
            )));
        }
        Ok(())
    }
}

/// One query to execute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub ref_id: String,
    pub model: QueryModel,
    pub range: TimeRange,
}

impl QueryRequest {
    pub fn new(ref_id: impl Into<String>, model: QueryModel, range: TimeRange) -> Self {
        Self {
            ref_id: ref_id.into(),
            model,
            range,
        }
    }
}
