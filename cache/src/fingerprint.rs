//! Cache keys

use chrono::{DateTime, SecondsFormat, Utc};
use logscope_core::SearchExpression;
use serde::{Deserialize, Serialize};
use std::fmt;

const FIRST_PAGE: &str = "first";

/// Deterministic key for one query page
///
/// Built only from the expression, the range, the limit and the cursor.
/// Request-scoped values such as request ids never take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    pub fn new(
        expression: &SearchExpression,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
        cursor: Option<&str>,
    ) -> Self {
        let cursor = cursor.filter(|c| !c.is_empty()).unwrap_or(FIRST_PAGE);
        let parts = (
            expression.as_str(),
            from.to_rfc3339_opts(SecondsFormat::Millis, true),
            to.to_rfc3339_opts(SecondsFormat::Millis, true),
            limit,
            cursor,
        );
        // a JSON array keeps the parts unambiguous whatever they contain
        let key = serde_json::to_string(&parts).unwrap_or_else(|_| {
            format!("{}|{}|{}|{}|{}", parts.0, parts.1, parts.2, parts.3, parts.4)
        });
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use logscope_core::translate;

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_identical_queries_share_fingerprint() {
        let (from, to) = range();
        let a = QueryFingerprint::new(&translate("error and warning"), from, to, 100, None);
        let b = QueryFingerprint::new(&translate("  error AND   warning "), from, to, 100, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_cursor_is_first_page() {
        let (from, to) = range();
        let expr = translate("*");
        assert_eq!(
            QueryFingerprint::new(&expr, from, to, 100, Some("")),
            QueryFingerprint::new(&expr, from, to, 100, None)
        );
    }

    #[test]
    fn test_each_part_distinguishes() {
        let (from, to) = range();
        let expr = translate("service:web");
        let base = QueryFingerprint::new(&expr, from, to, 100, None);
        assert_ne!(base, QueryFingerprint::new(&translate("service:api"), from, to, 100, None));
        assert_ne!(base, QueryFingerprint::new(&expr, to, to, 100, None));
        assert_ne!(base, QueryFingerprint::new(&expr, from, from, 100, None));
        assert_ne!(base, QueryFingerprint::new(&expr, from, to, 50, None));
        assert_ne!(base, QueryFingerprint::new(&expr, from, to, 100, Some("abc")));
    }
}
