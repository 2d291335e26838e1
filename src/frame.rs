//! Result frames
//!
//! Column-oriented tables handed back to the caller. Logs frames always
//! carry `timestamp, body, severity, id, labels` in that order; volume frames
//! carry `time, count`.

use chrono::{DateTime, SecondsFormat, Utc};
use logscope_core::{HistogramBucket, LogRecord};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Time,
    String,
    Number,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameKind {
    #[serde(rename = "time-series-multi")]
    TimeSeriesMulti,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visualisation {
    Logs,
    Graph,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FrameKind>,
    pub preferred_visualisation: Visualisation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub name: String,
    pub ref_id: String,
    pub meta: FrameMeta,
    pub fields: Vec<Field>,
}

impl Frame {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.fields.first().map(|f| f.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn time_value(ts: DateTime<Utc>) -> Value {
    Value::String(ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

pub fn logs_frame(ref_id: &str, records: &[LogRecord]) -> Frame {
    let mut timestamp = Vec::with_capacity(records.len());
    let mut body = Vec::with_capacity(records.len());
    let mut severity = Vec::with_capacity(records.len());
    let mut id = Vec::with_capacity(records.len());
    let mut labels = Vec::with_capacity(records.len());

    for record in records {
        timestamp.push(time_value(record.timestamp));
        body.push(Value::String(record.body.clone()));
        severity.push(Value::String(record.severity.as_str().to_string()));
        id.push(Value::String(record.id.clone()));
        labels.push(record.labels_json());
    }

    Frame {
        name: "logs".to_string(),
        ref_id: ref_id.to_string(),
        meta: FrameMeta {
            kind: None,
            preferred_visualisation: Visualisation::Logs,
        },
        fields: vec![
            Field { name: "timestamp", field_type: FieldType::Time, values: timestamp },
            Field { name: "body", field_type: FieldType::String, values: body },
            Field { name: "severity", field_type: FieldType::String, values: severity },
            Field { name: "id", field_type: FieldType::String, values: id },
            Field { name: "labels", field_type: FieldType::Json, values: labels },
        ],
    }
}

pub fn volume_frame(ref_id: &str, buckets: &[HistogramBucket]) -> Frame {
    let (time, count): (Vec<Value>, Vec<Value>) = buckets
        .iter()
        .map(|b| (time_value(b.bucket_start), Value::from(b.count)))
        .unzip();

    Frame {
        name: "volume".to_string(),
        ref_id: ref_id.to_string(),
        meta: FrameMeta {
            kind: Some(FrameKind::TimeSeriesMulti),
            preferred_visualisation: Visualisation::Graph,
        },
        fields: vec![
            Field { name: "time", field_type: FieldType::Time, values: time },
            Field { name: "count", field_type: FieldType::Number, values: count },
        ],
    }
}
