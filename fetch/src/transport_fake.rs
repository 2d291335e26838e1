//! Fake transport for testing
//!
//! Replies come from a script instead of the network. Every request is
//! recorded so tests can assert on cursors and call counts.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::FetchError;
use crate::request::LogsSearchRequest;
use crate::transport::LogsTransport;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// 2xx with this JSON body
    Body(Value),
    /// Non-2xx status with this body
    Status(u16, String),
    /// Connection-level failure
    Network(String),
    /// Never answers
    Hang,
}

/// Scripted transport
#[derive(Debug, Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<FakeReply>>,
    /// Reply once the script runs dry; an empty page if unset
    fallback: Option<FakeReply>,
    latency: Option<Duration>,
    requests: Mutex<Vec<LogsSearchRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake that gives the same reply to every request
    pub fn always(reply: FakeReply) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn then(self, reply: FakeReply) -> Self {
        self.lock_script().push_back(reply);
        self
    }

    pub fn then_page(self, ids: &[&str], cursor: Option<&str>) -> Self {
        self.then(FakeReply::Body(Self::page(ids, cursor)))
    }

    pub fn then_status(self, status: u16, body: &str) -> Self {
        self.then(FakeReply::Status(status, body.to_string()))
    }

    pub fn otherwise(mut self, reply: FakeReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Search response body holding one minimal entry per id
    pub fn page(ids: &[&str], cursor: Option<&str>) -> Value {
        let data: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "type": "log",
                    "attributes": {
                        "timestamp": "2024-01-01T00:00:00Z",
                        "message": format!("message {id}"),
                        "status": "info"
                    }
                })
            })
            .collect();
        let mut body = json!({ "data": data, "meta": {} });
        if let Some(cursor) = cursor {
            body["meta"] = json!({ "page": { "after": cursor } });
        }
        body
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<LogsSearchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Most requests ever in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<FakeReply>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_reply(&self) -> FakeReply {
        self.lock_script()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| FakeReply::Body(Self::page(&[], None)))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LogsTransport for FakeTransport {
    async fn search(&self, request: &LogsSearchRequest) -> Result<Value, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        let reply = self.next_reply();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match reply {
            FakeReply::Body(body) => Ok(body),
            FakeReply::Status(status, body) => Err(FetchError::from_status(status, &body)),
            FakeReply::Network(message) => Err(FetchError::Network(message)),
            FakeReply::Hang => {
                std::future::pending::<()>().await;
                Err(FetchError::Network("unreachable".to_string()))
            }
        }
    }
}
