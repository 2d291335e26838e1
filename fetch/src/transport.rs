//! HTTP transport for the logs search API
//!
//! The engine talks to a [`LogsTransport`]; [`HttpTransport`] is the reqwest
//! implementation and [`crate::transport_fake::FakeTransport`] the scripted
//! one used in tests.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::error::FetchError;
use crate::request::LogsSearchRequest;

pub use crate::transport_fake::FakeTransport;

pub const SEARCH_PATH: &str = "/api/v2/logs/events/search";
pub const API_KEY_HEADER: &str = "DD-API-KEY";
pub const APP_KEY_HEADER: &str = "DD-APPLICATION-KEY";

/// Sites the service is hosted on
pub const SUPPORTED_SITES: &[&str] = &[
    "datadoghq.com",
    "us3.datadoghq.com",
    "us5.datadoghq.com",
    "datadoghq.eu",
    "ap1.datadoghq.com",
    "ddog-gov.com",
];

/// One search request, one JSON body back
#[async_trait]
pub trait LogsTransport: Send + Sync {
    async fn search(&self, request: &LogsSearchRequest) -> Result<Value, FetchError>;
}

/// API and application keys
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub app_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_key: app_key.into(),
        }
    }

    fn check(&self) -> Result<(), FetchError> {
        if self.api_key.trim().is_empty() {
            return Err(FetchError::MissingCredential("API key"));
        }
        if self.app_key.trim().is_empty() {
            return Err(FetchError::MissingCredential("application key"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("app_key", &redact(&self.app_key))
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// API base URL for a site name
pub fn base_url_for_site(site: &str) -> Result<String, FetchError> {
    let site = site.trim().trim_end_matches('/').to_ascii_lowercase();
    if SUPPORTED_SITES.contains(&site.as_str()) {
        Ok(format!("https://api.{site}"))
    } else {
        Err(FetchError::Configuration(format!(
            "unknown site '{site}', expected one of: {}",
            SUPPORTED_SITES.join(", ")
        )))
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl HttpTransport {
    /// Build a transport for `site`, or for `base_url` when one is given
    pub fn new(
        site: &str,
        base_url: Option<&str>,
        credentials: Credentials,
    ) -> Result<Self, FetchError> {
        let base = match base_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => base_url_for_site(site)?,
        };
        let client = reqwest::Client::builder()
            .user_agent(concat!("logscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{base}{SEARCH_PATH}"),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LogsTransport for HttpTransport {
    async fn search(&self, request: &LogsSearchRequest) -> Result<Value, FetchError> {
        self.credentials.check()?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .header(APP_KEY_HEADER, &self.credentials.app_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "logs search response");

        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16(), &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}
