//! Fetch errors
//!
//! Transport-level taxonomy. Deciding how an error reads to a person is left
//! to the query executor; this layer only classifies and adds context.

use std::time::Duration;

/// Response bodies kept in errors are cut to this many characters
pub const MAX_ERROR_BODY_CHARS: usize = 512;

const RATE_LIMIT_HINTS: &[&str] = &["rate limit", "too many requests", "ratelimit"];

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection refused, DNS, TLS and similar
    #[error("Network error: {0}")]
    Network(String),

    /// Page request exceeded its deadline
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Rate limited (HTTP {status}): {body}")]
    RateLimited { status: u16, body: String },

    #[error("Unauthorized (HTTP 401): {body}")]
    Unauthorized { body: String },

    #[error("Forbidden (HTTP 403): {body}")]
    Forbidden { body: String },

    /// Credential missing before any request was sent
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    /// Query rejected by the service
    #[error("Bad request (HTTP 400): {body}")]
    BadRequest { body: String },

    #[error("Server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// 2xx with a body that is not JSON
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Request cancelled")]
    Cancelled,

    /// Error raised while fetching a given page
    #[error("page {page} failed after {attempts} attempt(s): {source}")]
    Page {
        page: usize,
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Classify a non-2xx response
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = truncate_body(body);
        match status {
            429 => FetchError::RateLimited { status, body },
            _ if mentions_rate_limit(&body) => FetchError::RateLimited { status, body },
            400 => FetchError::BadRequest { body },
            401 => FetchError::Unauthorized { body },
            403 => FetchError::Forbidden { body },
            500..=599 => FetchError::Server { status, body },
            _ => FetchError::Http { status, body },
        }
    }

    /// Innermost error, past any page context
    pub fn root(&self) -> &FetchError {
        match self {
            FetchError::Page { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.root(), FetchError::RateLimited { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), FetchError::Cancelled)
    }

    /// HTTP status behind the error, if there was a response
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            FetchError::RateLimited { status, .. }
            | FetchError::Server { status, .. }
            | FetchError::Http { status, .. } => Some(*status),
            FetchError::BadRequest { .. } => Some(400),
            FetchError::Unauthorized { .. } => Some(401),
            FetchError::Forbidden { .. } => Some(403),
            _ => None,
        }
    }

    pub(crate) fn at_page(self, page: usize, attempts: u32) -> Self {
        match self {
            FetchError::Cancelled | FetchError::Page { .. } => self,
            other => FetchError::Page {
                page,
                attempts,
                source: Box::new(other),
            },
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::from_status(status.as_u16(), &err.to_string());
        }
        if err.is_decode() {
            return FetchError::InvalidResponse(err.to_string());
        }
        FetchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::InvalidResponse(err.to_string())
    }
}

pub fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    out.push_str("...");
    out
}

fn mentions_rate_limit(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    RATE_LIMIT_HINTS.iter().any(|hint| lower.contains(hint))
}
