//! Fetch engine
//!
//! `fetch_page` issues one page request through the admission gate, retrying
//! rate-limited attempts with exponential backoff. `fetch_all` walks the
//! cursor chain page by page, in order, until the service runs out of pages
//! or a page/record budget is hit. A rate limit that outlasts its retries on a
//! later page ends the walk with the records gathered so far.

use chrono::{DateTime, Utc};
use logscope_core::normalize::normalize_with_report;
use logscope_core::{entries_from_value, next_cursor, LogRecord, SearchExpression};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::gate::AdmissionGate;
use crate::request::LogsSearchRequest;
use crate::retry::{cancellable_sleep, inter_page_delay, RetryPolicy, RetryState};
use crate::transport::LogsTransport;

/// One normalised page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<LogRecord>,
    pub next_cursor: Option<String>,
}

/// Why `fetch_all` stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoCursor,
    EmptyPage,
    MaxPages,
    MaxRecords,
    RateLimited,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<LogRecord>,
    /// Cursor for the first page not fetched, if the service offered one
    pub next_cursor: Option<String>,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
    /// Pagination was cut short by rate limiting
    pub partial: bool,
    /// The rate-limit error that cut pagination short
    pub interruption: Option<FetchError>,
}

/// Time range and expression shared by every page of one query
#[derive(Debug, Clone, Copy)]
pub struct SearchWindow<'a> {
    pub expression: &'a SearchExpression,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

pub struct FetchEngine {
    transport: Arc<dyn LogsTransport>,
    gate: AdmissionGate,
    config: FetchConfig,
    policy: RetryPolicy,
}

impl FetchEngine {
    /// Build an engine around a shared gate
    ///
    /// Engines cloned from the same gate share its slots, so the cap applies
    /// across all of them.
    pub fn new(transport: Arc<dyn LogsTransport>, gate: AdmissionGate, config: FetchConfig) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self {
            transport,
            gate,
            config,
            policy,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Fetch a single page
    ///
    /// Errors carry page context; a standalone call reports itself as page 1.
    pub async fn fetch_page(
        &self,
        window: SearchWindow<'_>,
        cursor: Option<&str>,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        self.fetch_page_numbered(window, cursor, page_size, 1, cancel)
            .await
    }

    /// Fetch pages until a stop condition, keeping at most `limit` records
    pub async fn fetch_all(
        &self,
        window: SearchWindow<'_>,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let limit = limit.min(self.config.max_records).max(1);
        let mut records: Vec<LogRecord> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_fetched = 0usize;

        let (stop_reason, interruption) = loop {
            if pages_fetched > 0 {
                let pause = inter_page_delay(&self.config, pages_fetched);
                debug!(pause_ms = pause.as_millis() as u64, "waiting before next page");
                cancellable_sleep(pause, cancel).await?;
            }

            let page_size = self.config.page_size.min(limit - records.len());
            let page_number = pages_fetched + 1;
            let page = match self
                .fetch_page_numbered(window, cursor.as_deref(), page_size, page_number, cancel)
                .await
            {
                Ok(page) => page,
                Err(err) if err.is_rate_limited() && !records.is_empty() => {
                    warn!(
                        page = page_number,
                        records = records.len(),
                        "rate limit persisted, returning partial results"
                    );
                    break (StopReason::RateLimited, Some(err));
                }
                Err(err) => return Err(err),
            };

            pages_fetched += 1;
            let empty = page.records.is_empty();
            records.extend(page.records);
            cursor = page.next_cursor;

            if empty {
                cursor = None;
                break (StopReason::EmptyPage, None);
            }
            if records.len() >= limit {
                records.truncate(limit);
                break (StopReason::MaxRecords, None);
            }
            if cursor.is_none() {
                break (StopReason::NoCursor, None);
            }
            if pages_fetched >= self.config.max_pages {
                break (StopReason::MaxPages, None);
            }
        };

        debug!(
            pages = pages_fetched,
            records = records.len(),
            ?stop_reason,
            "pagination finished"
        );
        Ok(FetchOutcome {
            records,
            next_cursor: cursor,
            pages_fetched,
            stop_reason,
            partial: stop_reason == StopReason::RateLimited,
            interruption,
        })
    }

    async fn fetch_page_numbered(
        &self,
        window: SearchWindow<'_>,
        cursor: Option<&str>,
        page_size: usize,
        page_number: usize,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        let request = LogsSearchRequest::new(window.expression, window.from, window.to, page_size, cursor);
        let mut state = RetryState::default();

        let body = loop {
            state.attempt += 1;
            match self.attempt(&request, cancel).await {
                Ok(body) => break body,
                Err(err) if err.is_rate_limited() && self.policy.allows_retry(state.attempt) => {
                    let delay = self.policy.delay_for(state.attempt);
                    warn!(
                        page = page_number,
                        attempt = state.attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    state.last_error = Some(err);
                    cancellable_sleep(delay, cancel).await?;
                }
                Err(err) => return Err(err.at_page(page_number, state.attempt)),
            }
        };

        let next = next_cursor(&body);
        let report = normalize_with_report(&entries_from_value(body));
        for skipped in &report.skipped {
            warn!(page = page_number, index = skipped.index, defect = %skipped.defect, "skipping malformed log entry");
        }
        debug!(
            page = page_number,
            attempts = state.attempt,
            records = report.records.len(),
            has_next = next.is_some(),
            "page fetched"
        );
        Ok(Page {
            records: report.records,
            next_cursor: next,
        })
    }

    /// One request: gate slot, then the call under the page deadline
    async fn attempt(
        &self,
        request: &LogsSearchRequest,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, FetchError> {
        let _permit = self.gate.acquire(cancel).await?;
        let deadline = self.config.page_timeout();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = tokio::time::timeout(deadline, self.transport.search(request)) => {
                result.unwrap_or(Err(FetchError::Timeout(deadline)))
            }
        }
    }
}

impl std::fmt::Debug for FetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchEngine")
            .field("gate", &self.gate)
            .field("config", &self.config)
            .finish()
    }
}
