//! Query executor integration tests
//!
//! Runs the whole pipeline against a scripted transport; no network calls.
//! Fixtures live in tests/fixtures.

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use logscope::{
    ErrorKind, ExecutorSettings, LogscopeConfig, QueryExecutor, QueryKind, QueryModel,
    QueryRequest, TimeRange,
};
use logscope_cache::{ManualClock, QueryCache};
use logscope_fetch::{AdmissionGate, FakeReply, FakeTransport, FetchConfig, FetchEngine};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// Test helpers
fn load_fixture(name: &str) -> String {
    let path = PathBuf::from("tests/fixtures").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", path.display()))
}

fn load_json_fixture(name: &str) -> Value {
    serde_json::from_str(&load_fixture(name)).unwrap()
}

struct Harness {
    fake: Arc<FakeTransport>,
    clock: Arc<ManualClock>,
    executor: QueryExecutor,
}

fn harness(fake: FakeTransport) -> Harness {
    let fake = Arc::new(fake);
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap()));
    let config = FetchConfig::default();
    let engine = FetchEngine::new(fake.clone(), AdmissionGate::new(config.gate_capacity), config);
    let cache = Arc::new(QueryCache::with_clock(clock.clone()));
    Harness {
        fake,
        clock,
        executor: QueryExecutor::new(engine, cache, ExecutorSettings::default()),
    }
}

fn hour() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
    )
}

fn logs_query(ref_id: &str, text: &str) -> QueryRequest {
    QueryRequest::new(ref_id, QueryModel::new(text, QueryKind::Logs), hour())
}

#[tokio::test]
async fn test_logs_query_builds_frame() {
    let h = harness(FakeTransport::new().then_page(&["a", "b"], None));
    let response = h
        .executor
        .execute(&logs_query("A", "service:web and status:error"), &CancellationToken::new())
        .await;

    assert!(response.error.is_none(), "{:?}", response.error);
    assert_eq!(response.frames.len(), 1);
    let frame = &response.frames[0];
    assert_eq!(frame.ref_id, "A");
    assert_eq!(frame.len(), 2);
    assert_eq!(frame.field("id").unwrap().values, vec![json!("a"), json!("b")]);

    let requests = h.fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].filter.query, "service:web AND status:ERROR");
    assert_eq!(requests[0].page.limit, 1_000);
}

#[tokio::test]
async fn test_repeat_query_served_from_cache() {
    let h = harness(FakeTransport::always(FakeReply::Body(FakeTransport::page(&["a"], None))));
    let cancel = CancellationToken::new();
    let request = logs_query("A", "error");

    let first = h.executor.execute(&request, &cancel).await;
    let second = h.executor.execute(&request, &cancel).await;
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.frames, second.frames);
    assert_eq!(h.fake.call_count(), 1);

    // logs entries are fresh for 30s
    h.clock.advance(Duration::from_secs(31));
    let third = h.executor.execute(&request, &cancel).await;
    assert!(!third.cached);
    assert_eq!(h.fake.call_count(), 2);

    let stats = h.executor.cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.stale, 1);
}

#[tokio::test]
async fn test_limit_hint_changes_fingerprint() {
    let h = harness(FakeTransport::always(FakeReply::Body(FakeTransport::page(&["a"], None))));
    let cancel = CancellationToken::new();
    let small = QueryRequest::new("A", QueryModel::new("error", QueryKind::Logs).with_limit(10), hour());

    h.executor.execute(&logs_query("A", "error"), &cancel).await;
    let response = h.executor.execute(&small, &cancel).await;
    assert!(!response.cached);
    assert_eq!(h.fake.requests()[1].page.limit, 10);
}

#[tokio::test]
async fn test_limit_hint_clamped() {
    let h = harness(FakeTransport::new().then_page(&["a"], None));
    let huge = QueryRequest::new(
        "A",
        QueryModel::new("*", QueryKind::Logs).with_limit(1_000_000),
        hour(),
    );
    h.executor.execute(&huge, &CancellationToken::new()).await;
    assert_eq!(h.fake.requests()[0].page.limit, 1_000);

    let h = harness(FakeTransport::new().then_page(&["a"], None));
    let zero = QueryRequest::new("A", QueryModel::new("*", QueryKind::Logs).with_limit(0), hour());
    h.executor.execute(&zero, &CancellationToken::new()).await;
    assert_eq!(h.fake.requests()[0].page.limit, 1);
}

#[tokio::test]
async fn test_hidden_query_is_a_no_op() {
    let h = harness(FakeTransport::new());
    let mut model = QueryModel::new("error", QueryKind::Logs);
    model.hidden = Some(json!(true));
    let response = h
        .executor
        .execute(&QueryRequest::new("A", model, hour()), &CancellationToken::new())
        .await;

    assert!(response.frames.is_empty());
    assert!(response.error.is_none());
    assert_eq!(h.fake.call_count(), 0);
}

#[tokio::test]
async fn test_empty_range_is_a_validation_error() {
    let h = harness(FakeTransport::new());
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let request = QueryRequest::new("A", QueryModel::default(), TimeRange::new(now, now));
    let response = h.executor.execute(&request, &CancellationToken::new()).await;

    assert_eq!(response.error_kind, Some(ErrorKind::Validation));
    assert!(response.is_error());
    assert_eq!(h.fake.call_count(), 0);
}

#[tokio::test]
async fn test_undecodable_model_is_a_validation_error() {
    let h = harness(FakeTransport::new());
    let response = h
        .executor
        .execute_json("A", &json!({"queryText": 42}), hour(), &CancellationToken::new())
        .await;
    assert_eq!(response.error_kind, Some(ErrorKind::Validation));
    assert_eq!(response.ref_id, "A");

    let response = h
        .executor
        .execute_json(
            "B",
            &json!({"query": "status:warn", "queryType": "logs"}),
            hour(),
            &CancellationToken::new(),
        )
        .await;
    assert!(response.error.is_none());
    assert_eq!(h.fake.requests()[0].filter.query, "status:WARN");
}

#[tokio::test]
async fn test_volume_query_buckets_whole_range() {
    let h = harness(FakeTransport::new().then(FakeReply::Body(load_json_fixture("volume_page.json"))));
    let request = QueryRequest::new("V", QueryModel::new("*", QueryKind::LogsVolume), hour());
    let response = h.executor.execute(&request, &CancellationToken::new()).await;

    assert!(response.error.is_none(), "{:?}", response.error);
    let frame = &response.frames[0];
    let encoded = serde_json::to_value(frame).unwrap();
    assert_eq!(encoded["meta"]["kind"], json!("time-series-multi"));

    // one-minute buckets, both ends included
    let counts = &frame.field("count").unwrap().values;
    assert_eq!(counts.len(), 61);
    assert_eq!(counts[0], json!(2));
    assert_eq!(counts[30], json!(1));
    assert_eq!(counts[60], json!(1));
    let total: u64 = counts.iter().filter_map(Value::as_u64).sum();
    assert_eq!(total, 4);

    // volume queries fetch as much as allowed
    assert_eq!(h.fake.requests()[0].page.limit, 1_000);
}

#[tokio::test]
async fn test_volume_and_logs_use_separate_ttls() {
    let h = harness(FakeTransport::always(FakeReply::Body(FakeTransport::page(&["a"], None))));
    let cancel = CancellationToken::new();
    let volume = QueryRequest::new("V", QueryModel::new("*", QueryKind::LogsVolume), hour());

    h.executor.execute(&volume, &cancel).await;
    h.clock.advance(Duration::from_secs(45));
    let again = h.executor.execute(&volume, &cancel).await;
    assert!(again.cached);
    assert_eq!(h.fake.call_count(), 1);
}

#[tokio::test]
async fn test_bad_request_gets_a_suggestion() {
    let body = load_fixture("bad_request.json");
    let h = harness(FakeTransport::new().then_status(400, &body));
    let response = h
        .executor
        .execute(&logs_query("A", "service:"), &CancellationToken::new())
        .await;

    assert_eq!(response.error_kind, Some(ErrorKind::RemoteSyntax));
    let error = response.error.unwrap();
    assert!(error.contains("@http.status_code"), "{error}");
    assert_eq!(h.fake.call_count(), 1);
}

#[tokio::test]
async fn test_forbidden_mentions_scope() {
    let h = harness(FakeTransport::new().then_status(403, "Forbidden"));
    let response = h
        .executor
        .execute(&logs_query("A", "*"), &CancellationToken::new())
        .await;
    assert_eq!(response.error_kind, Some(ErrorKind::Authentication));
    assert!(response.error.unwrap().contains("logs_read_data"));
}

#[tokio::test]
async fn test_server_error_not_retried() {
    let h = harness(FakeTransport::always(FakeReply::Status(503, "unavailable".to_string())));
    let response = h
        .executor
        .execute(&logs_query("A", "*"), &CancellationToken::new())
        .await;
    assert_eq!(response.error_kind, Some(ErrorKind::RemoteService));
    assert_eq!(h.fake.call_count(), 1);
    assert!(h.executor.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_pagination_returns_partial_uncached() {
    let fake = FakeTransport::new()
        .then_page(&["a", "b"], Some("c1"))
        .otherwise(FakeReply::Status(429, "Too many requests".to_string()));
    let h = harness(fake);
    let response = h
        .executor
        .execute(&logs_query("A", "*"), &CancellationToken::new())
        .await;

    assert!(response.partial);
    assert!(!response.is_error());
    assert_eq!(response.error_kind, Some(ErrorKind::RateLimit));
    assert!(response.error.as_deref().unwrap().starts_with("Partial results (2 records)"));
    assert_eq!(response.frames[0].len(), 2);
    // first page, then the initial try and two retries of page two
    assert_eq!(h.fake.call_count(), 4);
    assert!(h.executor.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_first_page_is_an_error() {
    let h = harness(FakeTransport::always(FakeReply::Status(429, String::new())));
    let response = h
        .executor
        .execute(&logs_query("A", "*"), &CancellationToken::new())
        .await;
    assert!(!response.partial);
    assert_eq!(response.error_kind, Some(ErrorKind::RateLimit));
    assert!(response.frames.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unblocks_hanging_query() {
    let h = harness(FakeTransport::always(FakeReply::Hang));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let start = tokio::time::Instant::now();
    let response = h.executor.execute(&logs_query("A", "*"), &cancel).await;
    assert_eq!(response.error_kind, Some(ErrorKind::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_inline_time_filter_warning() {
    let h = harness(FakeTransport::new().then_page(&["a"], None));
    let response = h
        .executor
        .execute(&logs_query("A", "error timestamp:>now-1h"), &CancellationToken::new())
        .await;
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].contains("time picker"));
}

#[tokio::test]
async fn test_batch_keeps_request_order() {
    let h = harness(FakeTransport::always(FakeReply::Body(FakeTransport::page(&["x"], None))));
    let mut hidden = QueryModel::new("*", QueryKind::Logs);
    hidden.hide = true;
    let requests = vec![
        logs_query("A", "service:a"),
        QueryRequest::new("B", hidden, hour()),
        QueryRequest::new("C", QueryModel::new("*", QueryKind::LogsVolume), hour()),
    ];
    let responses = h.executor.execute_batch(&requests, &CancellationToken::new()).await;

    let ids: Vec<&str> = responses.iter().map(|r| r.ref_id.as_str()).collect();
    assert_eq!(ids, ["A", "B", "C"]);
    assert_eq!(responses[0].frames.len(), 1);
    assert!(responses[1].frames.is_empty());
    assert_eq!(responses[2].frames[0].name, "volume");
    assert_eq!(h.fake.call_count(), 2);
}

#[tokio::test]
async fn test_missing_keys_reported_before_any_request() {
    let mut config = LogscopeConfig::default();
    config.datadog.base_url = Some("http://127.0.0.1:9".to_string());
    config.datadog.app_key = "app".to_string();
    let executor = QueryExecutor::from_config(&config).unwrap();

    let range = TimeRange::last(ChronoDuration::minutes(15));
    let request = QueryRequest::new("A", QueryModel::new("*", QueryKind::Logs), range);
    let response = executor.execute(&request, &CancellationToken::new()).await;

    assert_eq!(response.error_kind, Some(ErrorKind::Authentication));
    assert!(response.error.unwrap().contains("LOGSCOPE_API_KEY"));
}
