use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::domain::{BatchStatus, Priority};
use crate::port::TransportResponse;
use crate::testkit::config;
use crate::testkit::telemetry::RecordingTelemetry;
use crate::testkit::transport::{Reply, ScriptedTransport};

const BASE: &str = "https://api.example.com";

struct Harness {
    engine: Engine,
    transport: Arc<ScriptedTransport>,
    telemetry: Arc<RecordingTelemetry>,
}

fn harness_with(transport: ScriptedTransport, settings: EngineSettings) -> Harness {
    let transport = Arc::new(transport);
    let telemetry = Arc::new(RecordingTelemetry::new());
    let engine = Engine::new(settings, transport.clone(), telemetry.clone());
    Harness {
        engine,
        transport,
        telemetry,
    }
}

fn harness(transport: ScriptedTransport) -> Harness {
    harness_with(transport, config::engine(4))
}

fn get(engine: &Engine, path: &str) -> RequestBuilder {
    engine.request(Method::Get, format!("{BASE}{path}"))
}

// --- Submission tests ---

#[tokio::test]
async fn submit_returns_response_body() {
    let h = harness(ScriptedTransport::new().with_route("/habits", Reply::json(200, json!([1, 2]))));

    let response = h.engine.submit(get(&h.engine, "/habits").build().unwrap()).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.data(), &json!([1, 2]));
    assert!(!response.from_cache());
    assert_eq!(h.engine.active_requests(), 0);
    assert_eq!(h.engine.stats().successful_requests, 1);
}

#[tokio::test]
async fn submit_json_decodes_body() {
    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Mood {
        score: u8,
    }

    let h = harness(ScriptedTransport::new().with_route("/mood", Reply::json(200, json!({"score": 7}))));
    let mood: Mood = h
        .engine
        .submit_json(get(&h.engine, "/mood").build().unwrap())
        .await
        .unwrap();

    assert_eq!(mood, Mood { score: 7 });
}

#[tokio::test]
async fn spawned_request_can_be_awaited_later() {
    let h = harness(ScriptedTransport::new().with_latency(Duration::from_millis(10)));
    let request = get(&h.engine, "/sync").build().unwrap();
    let id = request.id();

    let handle = h.engine.spawn(request);
    assert_eq!(handle.id(), id);

    let response = handle.await.unwrap();
    assert_eq!(response.data(), &json!({"ok": true}));
}

#[tokio::test]
async fn payload_and_headers_reach_transport() {
    let h = harness(ScriptedTransport::new());
    let request = h
        .engine
        .request(Method::Post, format!("{BASE}/events"))
        .json(&json!({"kind": "open"}))
        .header("X-Trace", "abc")
        .build()
        .unwrap();

    h.engine.submit(request).await.unwrap();

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::Post);
    assert_eq!(calls[0].header("x-trace"), Some("abc"));
}

// --- Cache tests ---

#[tokio::test]
async fn cacheable_request_is_served_from_cache() {
    let h = harness(ScriptedTransport::new().with_route("/profile", Reply::json(200, json!({"n": 1}))));

    let first = h.engine.submit(get(&h.engine, "/profile").cached().build().unwrap()).await.unwrap();
    let second = h.engine.submit(get(&h.engine, "/profile").cached().build().unwrap()).await.unwrap();

    assert!(!first.from_cache());
    assert!(second.from_cache());
    assert_eq!(second.data(), &json!({"n": 1}));
    assert_eq!(h.transport.call_count(), 1);

    let stats = h.engine.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.total_requests, 1, "cache hits are not network requests");
}

#[tokio::test]
async fn expired_entry_is_refetched() {
    let h = harness(ScriptedTransport::new());
    let ttl = Duration::from_millis(20);

    h.engine.submit(get(&h.engine, "/feed").cache_for(ttl).build().unwrap()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    let again = h.engine.submit(get(&h.engine, "/feed").cache_for(ttl).build().unwrap()).await.unwrap();

    assert!(!again.from_cache());
    assert_eq!(h.transport.call_count(), 2);
}

#[tokio::test]
async fn stale_entry_is_revalidated_with_validators() {
    let fresh = TransportResponse::json(200, &json!({"v": 1})).with_header("ETag", "\"v1\"");
    let h = harness(ScriptedTransport::new().with_sequence(
        "/catalog",
        vec![Reply::Respond(fresh), Reply::status(304)],
    ));
    let ttl = Duration::from_millis(20);

    h.engine.submit(get(&h.engine, "/catalog").cache_for(ttl).build().unwrap()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    let revalidated = h
        .engine
        .submit(get(&h.engine, "/catalog").cache_for(ttl).build().unwrap())
        .await
        .unwrap();

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].header("if-none-match"), None);
    assert_eq!(calls[1].header("if-none-match"), Some("\"v1\""));
    assert!(revalidated.from_cache());
    assert_eq!(revalidated.data(), &json!({"v": 1}));

    let key = get(&h.engine, "/catalog").build().unwrap().cache_key();
    assert_eq!(h.engine.get_cached(&key), Some(json!({"v": 1})));
}

#[tokio::test]
async fn uncacheable_request_bypasses_cache() {
    let h = harness(ScriptedTransport::new());

    h.engine.submit(get(&h.engine, "/live").build().unwrap()).await.unwrap();
    h.engine.submit(get(&h.engine, "/live").build().unwrap()).await.unwrap();

    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.engine.stats().cache_misses, 0);
}

#[tokio::test]
async fn manual_cache_operations() {
    let h = harness(ScriptedTransport::new());
    let key = CacheKey::new("settings");

    h.engine.set_cached(key.clone(), json!({"theme": "dark"}), Duration::from_secs(60));
    assert_eq!(h.engine.get_cached(&key), Some(json!({"theme": "dark"})));

    assert_eq!(h.engine.clear_cache(Some(&key)), 1);
    assert_eq!(h.engine.get_cached(&key), None);

    h.engine.set_cached(key.clone(), json!(1), Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(15)).await;
    assert_eq!(h.engine.evict_expired(), 1);
}

// --- Retry tests ---

#[tokio::test]
async fn retryable_failure_is_attempted_max_retries_plus_one_times() {
    let h = harness(ScriptedTransport::new().with_route("/upload", Reply::status(503)));

    let err = h
        .engine
        .submit(get(&h.engine, "/upload").max_retries(3).build().unwrap())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RequestError::MaxRetriesExceeded {
            attempts: 4,
            last: Box::new(RequestError::http(503)),
        }
    );
    assert_eq!(h.transport.call_count(), 4);
    assert_eq!(h.telemetry.count("retry_scheduled"), 3);
    assert_eq!(h.telemetry.count("request_failed"), 1);

    let stats = h.engine.stats();
    assert_eq!(stats.retries, 3);
    assert_eq!(stats.failed_requests, 1);
    assert_eq!(stats.total_requests, 1);
}

#[tokio::test]
async fn backoff_gaps_double() {
    let h = harness(ScriptedTransport::new().with_route("/upload", Reply::status(500)));

    let _ = h
        .engine
        .submit(get(&h.engine, "/upload").max_retries(3).build().unwrap())
        .await;

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 4);
    for (k, pair) in calls.windows(2).enumerate() {
        let gap = pair[1].at.duration_since(pair[0].at);
        let expected = Duration::from_millis(10 * (1 << k));
        assert!(gap >= expected, "gap {k} was {gap:?}, expected at least {expected:?}");
    }
}

#[tokio::test]
async fn transient_failure_recovers() {
    let h = harness(
        ScriptedTransport::new()
            .with_sequence("/sync", vec![Reply::status(502), Reply::status(429)])
            .with_route("/sync", Reply::json(200, json!("done"))),
    );

    let response = h.engine.submit(get(&h.engine, "/sync").build().unwrap()).await.unwrap();

    assert_eq!(response.data(), &json!("done"));
    assert_eq!(h.transport.call_count(), 3);
    assert_eq!(h.engine.stats().retries, 2);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let h = harness(ScriptedTransport::new().with_route("/missing", Reply::status(404)));

    let err = h
        .engine
        .submit(get(&h.engine, "/missing").max_retries(3).build().unwrap())
        .await
        .unwrap_err();

    assert_eq!(err, RequestError::http(404));
    assert_eq!(h.transport.call_count(), 1);
    assert_eq!(h.telemetry.count("retry_scheduled"), 0);
}

#[tokio::test]
async fn timeout_releases_the_transport() {
    let h = harness(ScriptedTransport::new().with_route("/hang", Reply::Hang));
    let timeout = Duration::from_millis(30);

    let err = h
        .engine
        .submit(get(&h.engine, "/hang").timeout(timeout).max_retries(0).build().unwrap())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RequestError::MaxRetriesExceeded {
            attempts: 1,
            last: Box::new(RequestError::Timeout { after: timeout }),
        }
    );
    assert_eq!(h.transport.in_flight(), 0);
    assert_eq!(h.transport.abandoned(), 1);
}

// --- Scheduling tests ---

#[tokio::test]
async fn busy_engine_admits_by_priority() {
    let h = harness_with(
        ScriptedTransport::new().with_path_latency("/blocker", Duration::from_millis(60)),
        config::engine(1),
    );

    let blocker = h.engine.spawn(get(&h.engine, "/blocker").build().unwrap());
    tokio::time::sleep(Duration::from_millis(10)).await;

    let low = h.engine.spawn(get(&h.engine, "/low").priority(Priority::Low).build().unwrap());
    let normal = h.engine.spawn(get(&h.engine, "/normal").build().unwrap());
    let critical = h
        .engine
        .spawn(get(&h.engine, "/critical").priority(Priority::Critical).build().unwrap());

    for handle in [blocker, low, normal, critical] {
        handle.await.unwrap();
    }

    let order: Vec<String> = h.transport.calls().iter().map(|c| c.url.path().to_string()).collect();
    assert_eq!(order, vec!["/blocker", "/critical", "/normal", "/low"]);
}

#[tokio::test]
async fn in_flight_never_exceeds_limit() {
    let h = harness_with(
        ScriptedTransport::new().with_latency(Duration::from_millis(15)),
        config::engine(3),
    );

    let handles: Vec<_> = (0..12)
        .map(|i| h.engine.spawn(get(&h.engine, &format!("/item/{i}")).build().unwrap()))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.transport.call_count(), 12);
    assert!(h.transport.peak_concurrency() <= 3);
    assert_eq!(h.engine.pending_requests(), 0);
}

#[tokio::test]
async fn slow_request_does_not_block_later_ones() {
    let h = harness_with(
        ScriptedTransport::new().with_path_latency("/slow", Duration::from_millis(200)),
        config::engine(2),
    );

    let slow = h.engine.spawn(get(&h.engine, "/slow").build().unwrap());
    let started = std::time::Instant::now();
    let fast: Vec<_> = (0..4)
        .map(|i| h.engine.spawn(get(&h.engine, &format!("/fast/{i}")).build().unwrap()))
        .collect();
    for handle in fast {
        handle.await.unwrap();
    }

    assert!(started.elapsed() < Duration::from_millis(150));
    assert!(!slow.is_finished());
    slow.await.unwrap();
}

// --- Cancellation tests ---

#[tokio::test]
async fn cancelled_queued_request_is_never_dispatched() {
    let h = harness_with(
        ScriptedTransport::new().with_path_latency("/blocker", Duration::from_millis(50)),
        config::engine(1),
    );

    let blocker = h.engine.spawn(get(&h.engine, "/blocker").build().unwrap());
    let queued = h.engine.spawn(get(&h.engine, "/queued").build().unwrap());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(h.engine.cancel_request(queued.id()));
    assert_eq!(queued.await.unwrap_err(), RequestError::Cancelled);
    blocker.await.unwrap();

    assert!(h.transport.calls_to("/queued").is_empty());
    assert_eq!(h.engine.stats().cancelled_requests, 1);
    assert_eq!(h.telemetry.count("request_cancelled"), 1);
    assert!(!h.engine.cancel_request(RequestId::new()));
}

#[tokio::test]
async fn cancelling_in_flight_request_aborts_transport() {
    let h = harness(ScriptedTransport::new().with_route("/hang", Reply::Hang));

    let handle = h.engine.spawn(get(&h.engine, "/hang").build().unwrap());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.transport.in_flight(), 1);

    assert!(handle.cancel());
    assert_eq!(handle.await.unwrap_err(), RequestError::Cancelled);
    assert_eq!(h.transport.in_flight(), 0);
    assert_eq!(h.transport.abandoned(), 1);
    assert_eq!(h.engine.active_requests(), 0);
}

#[tokio::test]
async fn cancel_during_backoff_stops_retrying() {
    let mut settings = config::engine(1);
    settings.retry.base_delay = Duration::from_millis(100);
    let h = harness_with(ScriptedTransport::new().with_route("/flaky", Reply::status(503)), settings);

    let handle = h.engine.spawn(get(&h.engine, "/flaky").build().unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.engine.cancel_all(), 1);

    assert_eq!(handle.await.unwrap_err(), RequestError::Cancelled);
    assert_eq!(h.transport.call_count(), 1);
}

// --- Batch tests ---

#[tokio::test]
async fn batch_keeps_item_failures_isolated() {
    let h = harness(
        ScriptedTransport::new()
            .with_route("/gone/a", Reply::status(404))
            .with_route("/gone/b", Reply::status(404)),
    );
    let paths = ["/ok/1", "/gone/a", "/ok/2", "/gone/b", "/ok/3"];
    let requests: Vec<_> = paths
        .iter()
        .map(|p| get(&h.engine, p).max_retries(3).build().unwrap())
        .collect();
    let ids: Vec<_> = requests.iter().map(RequestDescriptor::id).collect();

    let report = h.engine.submit_batch(requests).await;

    assert_eq!(report.status, BatchStatus::Completed);
    assert_eq!(report.results.len(), 5);
    assert_eq!(report.results.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.results[1].error(), Some(&RequestError::http(404)));
    assert_eq!(h.transport.call_count(), 5, "404 is never retried");

    let batch = h.engine.batch(report.id).unwrap();
    assert!(batch.is_partitioned());
    assert_eq!(batch.results().len(), 3);
}

#[tokio::test]
async fn batch_items_are_bounded_by_the_limit() {
    let h = harness_with(
        ScriptedTransport::new().with_latency(Duration::from_millis(10)),
        config::engine(2),
    );
    let requests: Vec<_> = (0..6)
        .map(|i| get(&h.engine, &format!("/b/{i}")).build().unwrap())
        .collect();

    let report = h.engine.submit_batch(requests).await;

    assert_eq!(report.succeeded(), 6);
    assert!(h.transport.peak_concurrency() <= 2);
}

// --- Lifecycle tests ---

#[tokio::test]
async fn disposed_engine_rejects_work() {
    let h = harness(ScriptedTransport::new());
    h.engine.start().unwrap();
    h.engine.dispose().await;

    assert!(h.engine.is_stopped());
    let err = h.engine.submit(get(&h.engine, "/x").build().unwrap()).await.unwrap_err();
    assert_eq!(err, RequestError::Stopped);

    let report = h
        .engine
        .submit_batch(vec![get(&h.engine, "/y").build().unwrap()])
        .await;
    assert_eq!(report.status, BatchStatus::Failed);
    assert_eq!(report.results[0].error(), Some(&RequestError::Stopped));
    assert_eq!(h.engine.start(), Err(RequestError::Stopped));
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn dispose_cancels_in_flight_requests() {
    let h = harness(ScriptedTransport::new().with_route("/hang", Reply::Hang));
    let handle = h.engine.spawn(get(&h.engine, "/hang").build().unwrap());
    tokio::time::sleep(Duration::from_millis(10)).await;

    h.engine.dispose().await;

    assert_eq!(handle.await.unwrap_err(), RequestError::Cancelled);
}

#[tokio::test]
async fn reset_clears_state() {
    let h = harness(ScriptedTransport::new());
    h.engine.submit(get(&h.engine, "/a").cached().build().unwrap()).await.unwrap();
    assert_eq!(h.engine.stats().total_requests, 1);

    h.engine.reset();

    let stats = h.engine.stats();
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.cache_misses, 0);
    let key = get(&h.engine, "/a").build().unwrap().cache_key();
    assert_eq!(h.engine.get_cached(&key), None);
    assert!(!h.engine.is_stopped());
}

#[tokio::test]
async fn reset_during_flight_keeps_counters_consistent() {
    let h = harness(ScriptedTransport::new().with_path_latency("/slow", Duration::from_millis(80)));
    let handle = h.engine.spawn(get(&h.engine, "/slow").build().unwrap());
    tokio::time::sleep(Duration::from_millis(10)).await;

    h.engine.reset();
    assert_eq!(handle.await.unwrap_err(), RequestError::Cancelled);

    let stats = h.engine.stats();
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.cancelled_requests, 0);
    assert!(
        stats.successful_requests + stats.failed_requests + stats.cancelled_requests
            <= stats.total_requests
    );

    h.engine.submit(get(&h.engine, "/after").build().unwrap()).await.unwrap();
    let stats = h.engine.stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successful_requests, 1);
}

#[tokio::test]
async fn registration_after_stop_is_refused() {
    let h = harness(ScriptedTransport::new());
    let request = get(&h.engine, "/late").build().unwrap();
    h.engine
        .inner
        .stopped
        .store(true, std::sync::atomic::Ordering::SeqCst);

    assert!(matches!(
        h.engine.inner.register(&request),
        Err(RequestError::Stopped)
    ));
    assert_eq!(h.engine.active_requests(), 0);
}

// --- Connection quality tests ---

#[tokio::test]
async fn quality_follows_observed_outcomes() {
    let h = harness(ScriptedTransport::new().with_route("/bad", Reply::status(503)));
    assert_eq!(h.engine.connection_quality(), ConnectionQuality::Good);

    for i in 0..10 {
        h.engine.submit(get(&h.engine, &format!("/ok/{i}")).build().unwrap()).await.unwrap();
    }
    assert_eq!(h.engine.refresh_connection_quality(), ConnectionQuality::Excellent);

    for _ in 0..5 {
        let _ = h.engine.submit(get(&h.engine, "/bad").max_retries(0).build().unwrap()).await;
    }
    let degraded = h.engine.refresh_connection_quality();
    assert!(matches!(degraded, ConnectionQuality::Poor | ConnectionQuality::Offline));
    assert_eq!(h.telemetry.count("quality_changed"), 2);
}

#[tokio::test]
async fn platform_offline_signal_forces_offline() {
    let h = harness(ScriptedTransport::new());
    let mut rx = h.engine.subscribe_connection_quality();

    h.engine.set_platform_online(false);

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), ConnectionQuality::Offline);
    assert_eq!(
        h.telemetry.events(),
        vec![EngineEvent::QualityChanged {
            from: ConnectionQuality::Good,
            to: ConnectionQuality::Offline,
        }]
    );

    h.engine.set_platform_online(true);
    assert_eq!(h.engine.connection_quality(), ConnectionQuality::Good);
}

#[tokio::test]
async fn monitor_publishes_transitions() {
    let h = harness(ScriptedTransport::new());
    let mut rx = h.engine.subscribe_connection_quality();
    h.engine.start().unwrap();

    for i in 0..10 {
        h.engine.submit(get(&h.engine, &format!("/m/{i}")).build().unwrap()).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*rx.borrow(), ConnectionQuality::Excellent);
    h.engine.dispose().await;
}

#[tokio::test]
async fn idle_monitor_probes_the_probe_address() {
    let mut settings = config::engine(2);
    settings.quality.probe_address = Some(format!("{BASE}/health"));
    settings.quality.idle_threshold = Duration::ZERO;
    let h = harness_with(ScriptedTransport::new(), settings);

    h.engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    h.engine.dispose().await;

    let probes = h.transport.calls_to("/health");
    assert!(!probes.is_empty());
    assert!(probes.iter().all(|call| call.method == Method::Head));
    assert_eq!(h.engine.stats().total_requests, 0, "probes are not counted as requests");
}
