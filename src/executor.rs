//! Query execution
//!
//! Ties the pieces together for one inbound query: translate, consult the
//! cache, fetch on a miss, normalise, bucket and build the result frame.
//! This is the only place failures are turned into user-facing text.

use anyhow::{anyhow, Result};
use futures::future::join_all;
use logscope_cache::{QueryCache, QueryFingerprint};
use logscope_core::{bucketize, normalize::sanitize_records, translate_with_advisories, LogRecord};
use logscope_fetch::{AdmissionGate, Credentials, FetchEngine, HttpTransport, SearchWindow};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::LogscopeConfig;
use crate::error::{ErrorKind, QueryError};
use crate::frame::{logs_frame, volume_frame, Frame};
use crate::query::{QueryKind, QueryModel, QueryRequest, TimeRange};

/// Per-kind freshness and the default result size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub logs_ttl: Duration,
    pub volume_ttl: Duration,
    pub default_limit: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            logs_ttl: Duration::from_secs(30),
            volume_ttl: Duration::from_secs(60),
            default_limit: 1_000,
        }
    }
}

impl ExecutorSettings {
    pub fn from_config(config: &LogscopeConfig) -> Self {
        Self {
            logs_ttl: config.cache.logs_ttl(),
            volume_ttl: config.cache.volume_ttl(),
            default_limit: config.query.default_limit,
        }
    }
}

/// Result of one query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub ref_id: String,
    pub frames: Vec<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Pagination was cut short; `frames` hold what arrived
    pub partial: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub cached: bool,
}

impl QueryResponse {
    pub fn empty(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            frames: Vec::new(),
            error: None,
            error_kind: None,
            partial: false,
            warnings: Vec::new(),
            cached: false,
        }
    }

    pub fn failed(ref_id: impl Into<String>, err: &QueryError) -> Self {
        Self {
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            ..Self::empty(ref_id)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some() && !self.partial
    }
}

pub struct QueryExecutor {
    engine: FetchEngine,
    cache: Arc<QueryCache>,
    settings: ExecutorSettings,
}

impl QueryExecutor {
    pub fn new(engine: FetchEngine, cache: Arc<QueryCache>, settings: ExecutorSettings) -> Self {
        Self {
            engine,
            cache,
            settings,
        }
    }

    /// Executor talking HTTP to the configured site
    pub fn from_config(config: &LogscopeConfig) -> Result<Self> {
        let credentials = Credentials::new(&config.datadog.api_key, &config.datadog.app_key);
        let transport = HttpTransport::new(
            &config.datadog.site,
            config.datadog.base_url.as_deref(),
            credentials,
        )
        .map_err(|e| anyhow!("Failed to build logs transport: {}", e))?;
        debug!(endpoint = transport.endpoint(), "logs transport ready");

        let gate = AdmissionGate::new(config.fetch.gate_capacity);
        let engine = FetchEngine::new(Arc::new(transport), gate, config.fetch.clone());
        Ok(Self::new(
            engine,
            Arc::new(QueryCache::new()),
            ExecutorSettings::from_config(config),
        ))
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run one query; failures come back inside the response
    pub async fn execute(&self, request: &QueryRequest, cancel: &CancellationToken) -> QueryResponse {
        let span = info_span!(
            "query",
            ref_id = %request.ref_id,
            kind = ?request.model.kind,
            request_id = %Uuid::new_v4()
        );
        async {
            match self.run(request, cancel).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, kind = ?err.kind(), "query failed");
                    QueryResponse::failed(&request.ref_id, &err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run queries concurrently; responses keep request order
    pub async fn execute_batch(
        &self,
        requests: &[QueryRequest],
        cancel: &CancellationToken,
    ) -> Vec<QueryResponse> {
        join_all(requests.iter().map(|request| self.execute(request, cancel))).await
    }

    /// Decode a raw query model and run it
    pub async fn execute_json(
        &self,
        ref_id: &str,
        raw_model: &Value,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> QueryResponse {
        match serde_json::from_value::<QueryModel>(raw_model.clone()) {
            Ok(model) => {
                self.execute(&QueryRequest::new(ref_id, model, range), cancel)
                    .await
            }
            Err(e) => {
                let err = QueryError::Validation(format!("could not decode query model: {e}"));
                warn!(ref_id, error = %err, "query rejected");
                QueryResponse::failed(ref_id, &err)
            }
        }
    }

    async fn run(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse, QueryError> {
        let model = &request.model;
        if model.is_hidden() {
            debug!("hidden query, skipping");
            return Ok(QueryResponse::empty(&request.ref_id));
        }
        request.range.validate()?;

        let translation = translate_with_advisories(&model.query_text);
        let warnings: Vec<String> = translation.advisories.iter().map(|a| a.message()).collect();
        let expression = translation.expression;

        let max_records = self.engine.config().max_records;
        let (limit, ttl) = match model.kind {
            QueryKind::Logs => (
                model
                    .limit
                    .unwrap_or(self.settings.default_limit)
                    .min(max_records)
                    .max(1),
                self.settings.logs_ttl,
            ),
            QueryKind::LogsVolume => (max_records.max(1), self.settings.volume_ttl),
        };

        let fingerprint =
            QueryFingerprint::new(&expression, request.range.from, request.range.to, limit, None);

        let mut response = QueryResponse::empty(&request.ref_id);
        response.warnings = warnings;

        let records: Vec<LogRecord> = match self.cache.get(&fingerprint, ttl) {
            Some(entry) => {
                response.cached = true;
                entry.records.clone()
            }
            None => {
                let window = SearchWindow {
                    expression: &expression,
                    from: request.range.from,
                    to: request.range.to,
                };
                let outcome = self.engine.fetch_all(window, limit, cancel).await?;
                if outcome.partial {
                    let reason = outcome
                        .interruption
                        .map(|err| QueryError::from(err).to_string())
                        .unwrap_or_else(|| "rate limited".to_string());
                    response.partial = true;
                    response.error = Some(format!(
                        "Partial results ({} records): {}",
                        outcome.records.len(),
                        reason
                    ));
                    response.error_kind = Some(ErrorKind::RateLimit);
                    outcome.records
                } else {
                    let entry = self
                        .cache
                        .put(fingerprint, outcome.records, outcome.next_cursor);
                    entry.records.clone()
                }
            }
        };

        let records = sanitize_records(records);
        let frame = match model.kind {
            QueryKind::Logs => logs_frame(&request.ref_id, &records),
            QueryKind::LogsVolume => volume_frame(
                &request.ref_id,
                &bucketize(&records, request.range.from, request.range.to),
            ),
        };
        info!(
            records = records.len(),
            rows = frame.len(),
            cached = response.cached,
            partial = response.partial,
            "query complete"
        );
        response.frames.push(frame);
        Ok(response)
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("engine", &self.engine)
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish()
    }
}
