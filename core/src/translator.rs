//! Query translation
//!
//! Rewrites free-form search text into the remote service's filter syntax.
//! The pipeline is a fixed sequence of string passes, each operating on the
//! output of the previous one:
//!
//! 1. trim, default to `*`
//! 2. severity facet normalisation (`level:` / `status:`)
//! 3. facet value quoting and custom attribute prefixing
//! 4. boolean operator casing
//! 5. trailing wildcard collapsing
//! 6. whitespace cleanup
//! 7. inline time filter detection (advisory only)
//!
//! Translation never fails. Malformed input is passed through and left for the
//! remote service to reject.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::model::SearchExpression;

/// Canonical severity attribute
pub const SEVERITY_ATTRIBUTE: &str = "status";

/// Legacy severity attribute still accepted in user input
pub const LEGACY_SEVERITY_ATTRIBUTE: &str = "level";

/// Severity values recognised inside a severity facet
const SEVERITY_TOKENS: &[&str] = &[
    "emergency", "alert", "critical", "error", "warn", "warning", "notice", "info", "debug", "ok",
    "fatal", "trace",
];

/// Reserved facets whose values may need quoting
const RESERVED_FACETS: &[&str] = &["service", "source", "host"];

/// Custom attributes that must carry the `@` marker
const CUSTOM_FACETS: &[&str] = &[
    "error.message",
    "error.kind",
    "error.stack",
    "http.url",
    "http.method",
    "http.status_code",
    "logger.name",
    "usr.id",
];

const CUSTOM_ATTRIBUTE_MARKER: char = '@';

static SEVERITY_FACET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|[\s(])(-?)(level|status):(\([^()]*\)|[^\s()]+)").unwrap()
});

static QUOTABLE_FACET: LazyLock<Regex> = LazyLock::new(|| {
    let names = RESERVED_FACETS
        .iter()
        .chain(CUSTOM_FACETS.iter())
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(^|[\s(])(-?)(@?)({names}):")).unwrap()
});

static INLINE_TIME_FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[\s(])-?@?((?:timestamp|time|date):\S*)").unwrap()
});

/// Something the caller should know about the translated query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// The query carries its own time bound, which the remote service ignores
    /// in favour of the out-of-band range
    InlineTimeFilter { token: String },
}

impl Advisory {
    pub fn message(&self) -> String {
        match self {
            Advisory::InlineTimeFilter { token } => format!(
                "Inline time filter '{token}' detected; the time range is taken from the query \
                 time picker, not from the search text"
            ),
        }
    }
}

/// Translation result with advisories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub expression: SearchExpression,
    pub advisories: Vec<Advisory>,
}

/// Translate raw search text into a search expression
pub fn translate(raw_query: &str) -> SearchExpression {
    translate_with_advisories(raw_query).expression
}

/// Translate raw search text, also reporting advisories
pub fn translate_with_advisories(raw_query: &str) -> Translation {
    let trimmed = raw_query.trim();
    if trimmed.is_empty() {
        return Translation {
            expression: SearchExpression::wildcard(),
            advisories: Vec::new(),
        };
    }

    let query = normalize_severity_facets(trimmed);
    let query = quote_facet_values(&query);
    let query = normalize_boolean_operators(&query);
    let query = collapse_trailing_wildcards(&query);
    let query = collapse_whitespace(&query);

    let advisories = detect_inline_time_filters(&query);
    let expression = if query.is_empty() {
        SearchExpression::wildcard()
    } else {
        SearchExpression::new(query)
    };

    Translation {
        expression,
        advisories,
    }
}

fn normalize_severity_facets(input: &str) -> String {
    SEVERITY_FACET
        .replace_all(input, |caps: &Captures| {
            let value = &caps[4];
            let normalized = match value.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
                Some(inner) => {
                    let tokens: Vec<String> =
                        inner.split_whitespace().map(normalize_group_token).collect();
                    format!("({})", tokens.join(" "))
                }
                None => normalize_severity_token(value),
            };
            format!("{}{}{}:{}", &caps[1], &caps[2], SEVERITY_ATTRIBUTE, normalized)
        })
        .into_owned()
}

fn normalize_group_token(token: &str) -> String {
    if is_boolean_operator(token) {
        token.to_ascii_uppercase()
    } else {
        normalize_severity_token(token)
    }
}

fn normalize_severity_token(token: &str) -> String {
    let lower = token.to_ascii_lowercase();
    if SEVERITY_TOKENS.contains(&lower.as_str()) {
        token.to_ascii_uppercase()
    } else {
        token.to_string()
    }
}

fn is_boolean_operator(word: &str) -> bool {
    ["and", "or", "not"]
        .iter()
        .any(|op| word.eq_ignore_ascii_case(op))
}

fn quote_facet_values(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut cursor = 0;

    for caps in QUOTABLE_FACET.captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        // Skip facets swallowed by a previous value or sitting inside a phrase
        if whole.start() < cursor || inside_quotes(&input[..whole.start()]) {
            continue;
        }

        let name = &caps[4];
        let value_start = whole.end();
        let rest = &input[value_start..];
        let value_len = scan_facet_value(rest);
        let value = &rest[..value_len];

        out.push_str(&input[cursor..whole.start()]);
        out.push_str(&caps[1]);
        out.push_str(&caps[2]);
        if CUSTOM_FACETS.contains(&name) || !caps[3].is_empty() {
            out.push(CUSTOM_ATTRIBUTE_MARKER);
        }
        out.push_str(name);
        out.push(':');
        if needs_quoting(value) {
            out.push('"');
            out.push_str(&value.replace('"', "\\\""));
            out.push('"');
        } else {
            out.push_str(value);
        }
        cursor = value_start + value_len;
    }

    out.push_str(&input[cursor..]);
    out
}

fn inside_quotes(prefix: &str) -> bool {
    unescaped_quotes(prefix).count() % 2 == 1
}

/// Byte offsets of `"` not preceded by a backslash
fn unescaped_quotes(input: &str) -> impl Iterator<Item = usize> + '_ {
    input
        .char_indices()
        .filter(|&(i, c)| c == '"' && !input[..i].ends_with('\\'))
        .map(|(i, _)| i)
}

/// Length in bytes of the facet value at the start of `rest`
///
/// Quoted values, groups and ranges are returned whole. Bare values extend
/// over following words until a boolean operator, another facet, a negation,
/// a group or an unbalanced closing bracket.
fn scan_facet_value(rest: &str) -> usize {
    let Some(first) = rest.chars().next() else {
        return 0;
    };
    match first {
        c if c.is_whitespace() => 0,
        '"' => unescaped_quotes(&rest[1..])
            .next()
            .map(|i| i + 2)
            .unwrap_or(rest.len()),
        '(' | '[' => matching_close(rest).unwrap_or(rest.len()),
        _ => scan_bare_value(rest),
    }
}

fn matching_close(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn scan_bare_value(rest: &str) -> usize {
    let mut depth = 0usize;
    let mut end = 0;
    let mut pos = 0;
    let mut first_word = true;

    loop {
        let word_rest = &rest[pos..];
        let word_len = word_rest
            .find(char::is_whitespace)
            .unwrap_or(word_rest.len());
        let word = &word_rest[..word_len];
        if !first_word && !continues_value(word) {
            break;
        }

        for (i, c) in word.char_indices() {
            match c {
                '(' | '[' => depth += 1,
                ')' | ']' => {
                    if depth == 0 {
                        return pos + i;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        end = pos + word_len;
        first_word = false;

        let after = &rest[end..];
        let gap = after.len() - after.trim_start().len();
        if gap == 0 || end + gap >= rest.len() {
            break;
        }
        pos = end + gap;
    }
    end
}

fn continues_value(word: &str) -> bool {
    !(is_boolean_operator(word)
        || word.contains(':')
        || word.starts_with(['-', '(', '"', '[']))
}

fn needs_quoting(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with(['"', '(', '['])
        && value.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']'))
}

/// Segment of a query: a word (quoted phrases stay inside their word) or a run
/// of whitespace
enum Segment<'a> {
    Word(&'a str),
    Space(&'a str),
}

fn segments(input: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut in_space = input.starts_with(char::is_whitespace);

    for (i, c) in input.char_indices() {
        let is_space = !in_quotes && c.is_whitespace();
        if is_space != in_space {
            if i > start {
                let piece = &input[start..i];
                out.push(if in_space {
                    Segment::Space(piece)
                } else {
                    Segment::Word(piece)
                });
            }
            start = i;
            in_space = is_space;
        }
        if c == '"' && !escaped {
            in_quotes = !in_quotes;
        }
        escaped = c == '\\' && !escaped;
    }
    if start < input.len() {
        let piece = &input[start..];
        out.push(if in_space {
            Segment::Space(piece)
        } else {
            Segment::Word(piece)
        });
    }
    out
}

fn map_words<F>(input: &str, mut f: F) -> String
where
    F: FnMut(&str) -> Cow<'_, str>,
{
    let mut out = String::with_capacity(input.len());
    for segment in segments(input) {
        match segment {
            Segment::Word(word) => out.push_str(&f(word)),
            Segment::Space(space) => out.push_str(space),
        }
    }
    out
}

fn normalize_boolean_operators(input: &str) -> String {
    map_words(input, |word| {
        if word.contains('"') {
            return Cow::Borrowed(word);
        }
        let head = word.len() - word.trim_start_matches('(').len();
        let tail = word.len() - word.trim_end_matches(')').len();
        if head + tail >= word.len() {
            return Cow::Borrowed(word);
        }
        let core = &word[head..word.len() - tail];
        if is_boolean_operator(core) && core.chars().any(|c| c.is_ascii_lowercase()) {
            Cow::Owned(format!(
                "{}{}{}",
                &word[..head],
                core.to_ascii_uppercase(),
                &word[word.len() - tail..]
            ))
        } else {
            Cow::Borrowed(word)
        }
    })
}

fn collapse_trailing_wildcards(input: &str) -> String {
    map_words(input, |word| {
        if word.contains('"') || word.starts_with('-') {
            return Cow::Borrowed(word);
        }
        let core = word.trim_end_matches(')');
        let closers = &word[core.len()..];
        let stem = core.trim_end_matches('*');
        if core.len() - stem.len() < 2 {
            return Cow::Borrowed(word);
        }
        Cow::Owned(format!("{stem}*{closers}"))
    })
}

fn collapse_whitespace(input: &str) -> String {
    let words: Vec<&str> = segments(input)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Word(word) => Some(word),
            Segment::Space(_) => None,
        })
        .collect();
    words.join(" ")
}

fn detect_inline_time_filters(input: &str) -> Vec<Advisory> {
    INLINE_TIME_FILTER
        .captures_iter(input)
        .map(|caps| Advisory::InlineTimeFilter {
            token: caps[1].to_string(),
        })
        .collect()
}
