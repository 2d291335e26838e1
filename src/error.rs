//! Query errors
//!
//! Every failure below the executor arrives as a [`FetchError`] with page
//! context attached. This is where it is turned into something a person can
//! act on.

use logscope_fetch::FetchError;
use serde::Serialize;

use crate::suggestions;

/// Stable error category reported alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    RateLimit,
    RemoteSyntax,
    RemoteService,
    Transport,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid query: {0}")]
    Validation(String),

    #[error("Authentication failed: {guidance}")]
    Authentication {
        guidance: &'static str,
        #[source]
        source: FetchError,
    },

    #[error("Rate limited by the logs API after retrying; wait a moment or narrow the time range")]
    RateLimit {
        #[source]
        source: FetchError,
    },

    #[error("Query rejected by the logs API: {suggestion} ({detail})")]
    RemoteSyntax {
        suggestion: &'static str,
        detail: String,
        #[source]
        source: FetchError,
    },

    #[error("Logs API unavailable (HTTP {status}); try again later")]
    RemoteService {
        status: u16,
        #[source]
        source: FetchError,
    },

    #[error("Could not reach the logs API: {guidance}")]
    Transport {
        guidance: String,
        #[source]
        source: FetchError,
    },

    #[error("Query cancelled")]
    Cancelled,
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Validation(_) => ErrorKind::Validation,
            QueryError::Authentication { .. } => ErrorKind::Authentication,
            QueryError::RateLimit { .. } => ErrorKind::RateLimit,
            QueryError::RemoteSyntax { .. } => ErrorKind::RemoteSyntax,
            QueryError::RemoteService { .. } => ErrorKind::RemoteService,
            QueryError::Transport { .. } => ErrorKind::Transport,
            QueryError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<FetchError> for QueryError {
    fn from(err: FetchError) -> Self {
        match err.root() {
            FetchError::Cancelled => QueryError::Cancelled,
            FetchError::RateLimited { .. } => QueryError::RateLimit { source: err },
            FetchError::Unauthorized { .. } => QueryError::Authentication {
                guidance: "the API key was rejected; check that it is valid for the configured site",
                source: err,
            },
            FetchError::Forbidden { .. } => QueryError::Authentication {
                guidance: "the application key lacks permission to read logs \
                           (it needs the logs_read_data scope)",
                source: err,
            },
            FetchError::MissingCredential(which) => QueryError::Authentication {
                guidance: if *which == "API key" {
                    "no API key configured; set datadog.api_key or LOGSCOPE_API_KEY"
                } else {
                    "no application key configured; set datadog.app_key or LOGSCOPE_APP_KEY"
                },
                source: err,
            },
            FetchError::BadRequest { body } => QueryError::RemoteSyntax {
                suggestion: suggestions::suggest(body),
                detail: body.clone(),
                source: err,
            },
            FetchError::Server { status, .. } | FetchError::Http { status, .. } => {
                QueryError::RemoteService {
                    status: *status,
                    source: err,
                }
            }
            FetchError::Timeout(after) => QueryError::Transport {
                guidance: format!(
                    "no response within {}s; check connectivity or shorten the time range",
                    after.as_secs()
                ),
                source: err,
            },
            FetchError::Network(detail) => QueryError::Transport {
                guidance: format!("{detail}; check network access and the configured site"),
                source: err,
            },
            FetchError::InvalidResponse(detail) => QueryError::Transport {
                guidance: format!("unexpected response body ({detail}); check the configured base URL"),
                source: err,
            },
            FetchError::Configuration(detail) => QueryError::Transport {
                guidance: format!("configuration problem: {detail}"),
                source: err,
            },
            FetchError::Page { .. } => QueryError::Transport {
                guidance: err.to_string(),
                source: err,
            },
        }
    }
}
