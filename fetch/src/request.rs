//! Search request body

use chrono::{DateTime, SecondsFormat, Utc};
use logscope_core::SearchExpression;
use serde::{Deserialize, Serialize};

/// Newest records first
pub const SORT_NEWEST_FIRST: &str = "-timestamp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsSearchRequest {
    pub filter: SearchFilter,
    pub sort: String,
    pub page: PageSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub query: String,
    /// ISO-8601, UTC
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl LogsSearchRequest {
    pub fn new(
        expression: &SearchExpression,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
        cursor: Option<&str>,
    ) -> Self {
        Self {
            filter: SearchFilter {
                query: expression.as_str().to_string(),
                from: from.to_rfc3339_opts(SecondsFormat::Millis, true),
                to: to.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            sort: SORT_NEWEST_FIRST.to_string(),
            page: PageSpec {
                limit,
                cursor: cursor.filter(|c| !c.is_empty()).map(str::to_string),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use logscope_core::translate;
    use serde_json::json;

    #[test]
    fn test_body_shape() {
        let request = LogsSearchRequest::new(
            &translate("service:web"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
            1000,
            None,
        );
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "filter": {
                    "query": "service:web",
                    "from": "2024-01-01T00:00:00.000Z",
                    "to": "2024-01-01T01:00:00.000Z"
                },
                "sort": "-timestamp",
                "page": {"limit": 1000}
            })
        );
    }

    #[test]
    fn test_cursor_included_when_present() {
        let now = Utc::now();
        let request = LogsSearchRequest::new(&translate("*"), now, now, 10, Some("abc"));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["page"]["cursor"], json!("abc"));
    }
}
