//! Admission gate shared across concurrent queries

use chrono::{TimeZone, Utc};
use futures::future::join_all;
use logscope_core::translate;
use logscope_fetch::{AdmissionGate, FakeReply, FakeTransport, FetchConfig, FetchEngine, SearchWindow};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn one_page() -> FakeReply {
    FakeReply::Body(FakeTransport::page(&["a"], None))
}

#[tokio::test(start_paused = true)]
async fn test_gate_caps_calls_across_engines() {
    let fake = Arc::new(FakeTransport::always(one_page()).with_latency(Duration::from_millis(200)));
    let gate = AdmissionGate::new(2);
    let engines: Vec<FetchEngine> = (0..3)
        .map(|_| FetchEngine::new(fake.clone(), gate.clone(), FetchConfig::default()))
        .collect();

    let expression = translate("service:web");
    let window = SearchWindow {
        expression: &expression,
        from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        to: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
    };
    let cancel = CancellationToken::new();

    let queries = engines
        .iter()
        .cycle()
        .take(8)
        .map(|engine| engine.fetch_all(window, 100, &cancel));
    let results = join_all(queries).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(fake.call_count(), 8);
    assert_eq!(fake.peak_concurrency(), 2);
    assert_eq!(gate.available(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slot_released_after_failure() {
    let fake = Arc::new(
        FakeTransport::new()
            .then(FakeReply::Network("connection reset".to_string()))
            .then_page(&["a"], None),
    );
    let gate = AdmissionGate::new(1);
    let engine = FetchEngine::new(fake.clone(), gate.clone(), FetchConfig::default());

    let expression = translate("*");
    let window = SearchWindow {
        expression: &expression,
        from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        to: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
    };
    let cancel = CancellationToken::new();

    assert!(engine.fetch_all(window, 10, &cancel).await.is_err());
    assert_eq!(gate.available(), 1);
    let outcome = engine.fetch_all(window, 10, &cancel).await.unwrap();
    assert_eq!(outcome.records.len(), 1);
}
