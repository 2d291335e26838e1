//! Hints for queries the search service rejected
//!
//! The service's 400 bodies are free text. They are matched against a short
//! table of patterns, first match wins.

use regex::Regex;
use std::sync::LazyLock;

pub const GENERIC_HINT: &str = "Check the query syntax: facets are written `key:value`, custom \
     attributes take an `@` prefix, boolean operators are AND/OR/NOT and phrases go in double quotes.";

static PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(timestamp|time ?range|date)\b",
            "Set the time range with the time picker instead of inline `timestamp:` or `date:` filters.",
        ),
        (
            r"(?i)wildcard|\*\*",
            "Wildcards are allowed at the end of a term only, e.g. `web*`; use a single `*`.",
        ),
        (
            r"(?i)quot|unterminated|unbalanced|unclosed",
            "Quote values containing spaces, e.g. `service:\"my app\"`, and close every quote and parenthesis.",
        ),
        (
            r"(?i)\b(facet|attribute|field)s?\b",
            "Facets look like `service:web`; custom attributes need an `@` prefix, e.g. `@http.status_code:500`.",
        ),
        (
            r"(?i)\b(status|level|severity)\b",
            "Filter severity with `status:error` or `status:(error OR warn)`.",
        ),
        (
            r#"(?i)\bboolean\b|\boperators?\b|['"`](and|or|not)['"`]"#,
            "Boolean operators must be uppercase: `AND`, `OR`, `NOT`.",
        ),
    ]
    .into_iter()
    .map(|(pattern, hint)| (Regex::new(pattern).unwrap(), hint))
    .collect()
});

/// Best-effort hint for a rejected query
pub fn suggest(remote_error: &str) -> &'static str {
    PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(remote_error))
        .map(|(_, hint)| *hint)
        .unwrap_or(GENERIC_HINT)
}
