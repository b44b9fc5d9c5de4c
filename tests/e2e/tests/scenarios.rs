//! End-to-end scenarios over real HTTP.

use monitor::counters;
use pulse_e2e_tests::{spawn_stack, test_config};
use serde_json::{json, Value};
use std::time::Duration;
use types::EventType;

fn event_body(id: &str, kind: &str, timestamp: &str) -> Value {
    json!({
        "id": id,
        "type": kind,
        "timestamp": timestamp,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_a_single_event_round_trip() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    let body = json!({
        "id": "e1",
        "type": "page_view",
        "timestamp": "2025-01-01T00:00:00Z",
        "user_id": "u1",
        "data": {"page": "/home"}
    });

    let response = client
        .post(stack.url("/api/v1/events"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let fetched: Value = client
        .get(stack.url("/api/v1/events/e1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, body);

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_b_duplicate_rejection() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    let body = event_body("e1", "page_view", "2025-01-01T00:00:00Z");
    let first = client
        .post(stack.url("/api/v1/events"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);

    let second = client
        .post(stack.url("/api/v1/events"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
    let error: Value = second.json().await.unwrap();
    assert_eq!(error["error"]["kind"], "ConflictError");

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_c_batch_partial_prefix() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    let batch = json!([
        event_body("e1", "click", "2025-01-01T00:00:00Z"),
        event_body("e2", "click", "2025-01-01T00:00:01Z"),
        event_body("", "click", "2025-01-01T00:00:02Z"),
        event_body("e4", "click", "2025-01-01T00:00:03Z"),
    ]);

    let response = client
        .post(stack.url("/api/v1/events/batch"))
        .json(&batch)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"]["kind"], "ValidationError");
    let message = error["error"]["message"].as_str().unwrap();
    assert!(message.contains("index 2"), "message was: {message}");

    // the stored prefix is visible, the suffix is not
    for id in ["e1", "e2"] {
        let status = client
            .get(stack.url(&format!("/api/v1/events/{id}")))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, 200, "expected {id} to be stored");
    }
    let status = client
        .get(stack.url("/api/v1/events/e4"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, 404);

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_d_time_range_query() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    for (id, ts) in [
        ("e1", "2025-01-01T00:00:00Z"),
        ("e2", "2025-01-01T00:00:01Z"),
        ("e3", "2025-01-01T00:00:02Z"),
    ] {
        let response = client
            .post(stack.url("/api/v1/events"))
            .json(&event_body(id, "click", ts))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    let result: Value = client
        .get(stack.url("/api/v1/events"))
        .query(&[
            ("type", "click"),
            ("from", "2025-01-01T00:00:00Z"),
            ("to", "2025-01-01T00:00:01Z"),
            ("limit", "10"),
        ])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let data = result["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], "e1");
    assert_eq!(data[1]["id"], "e2");
    assert_eq!(result["meta"]["count"], 2);

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_e_stream_filtering() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    let response = client
        .post(stack.url("/api/v1/streams"))
        .json(&json!({
            "name": "S",
            "buffer_size": 100,
            "flush_interval_ms": 20,
            "max_subscribers": 4
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let stream = stack.engine.get_stream("S").unwrap();
    let mut purchases = stream
        .subscribe("purchases", |e: &types::Event| {
            e.event_type == EventType::Purchase
        })
        .unwrap();
    let mut clicks = stream
        .subscribe("clicks", |e: &types::Event| e.event_type == EventType::Click)
        .unwrap();

    let base = stack.engine.monitor().get(counters::STREAM_SUBSCRIBER_DROPPED);

    for (id, kind) in [("e1", "click"), ("e2", "purchase"), ("e3", "click"), ("e4", "signup")] {
        let event: types::Event =
            serde_json::from_value(event_body(id, kind, "2025-01-01T00:00:00Z")).unwrap();
        stream.publish(event).unwrap();
    }

    let p = tokio::time::timeout(Duration::from_secs(1), purchases.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(p.id, "e2");

    let c1 = tokio::time::timeout(Duration::from_secs(1), clicks.recv())
        .await
        .unwrap()
        .unwrap();
    let c2 = tokio::time::timeout(Duration::from_secs(1), clicks.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!((c1.id.as_str(), c2.id.as_str()), ("e1", "e3"));

    // the signup was delivered to nobody and nothing was dropped
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(purchases.try_recv().is_none());
    assert!(clicks.try_recv().is_none());
    assert_eq!(
        stack.engine.monitor().get(counters::STREAM_SUBSCRIBER_DROPPED),
        base
    );

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_f_pool_saturation() {
    use worker_pool::{PoolConfig, PoolError, Task, WorkerPool};

    let config = PoolConfig::new(1).with_task_queue_capacity(2);
    let pool: WorkerPool<u64, u64> = WorkerPool::new(config);
    pool.start();
    let mut results = pool.take_results().unwrap();

    let slow = || {
        Task::new("slow", 100u64, |ms: u64| {
            std::thread::sleep(Duration::from_millis(ms));
            Ok(ms)
        })
    };

    pool.submit(slow()).unwrap();
    // the single executor pulls the first task; the queue empties
    for _ in 0..200 {
        if pool.stats().tasks_queued == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    pool.submit(slow()).unwrap();
    pool.submit(slow()).unwrap();
    assert_eq!(pool.submit(slow()).unwrap_err(), PoolError::Full);

    // after the first completes, a new submit succeeds
    assert!(results.recv().await.is_some());
    for _ in 0..200 {
        if pool.stats().tasks_queued < 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    pool.submit(slow()).unwrap();

    pool.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn observability_endpoints_reflect_traffic() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    let health = client.get(stack.url("/healthz")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    let snapshot: Value = health.json().await.unwrap();
    assert_eq!(snapshot["engine_running"], true);

    let response = client
        .post(stack.url("/api/v1/events"))
        .json(&event_body("e1", "click", "2025-01-01T00:00:00Z"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let text = client
        .get(stack.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("events_ingested_total 1"), "metrics were: {text}");
    assert!(text.contains("events_ingested_click 1"));

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ingest_is_refused_after_shutdown() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    stack.engine.shutdown(Duration::from_secs(5)).await;

    let response = client
        .post(stack.url("/api/v1/events"))
        .json(&event_body("e1", "click", "2025-01-01T00:00:00Z"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"]["kind"], "StateError");

    let health = client.get(stack.url("/healthz")).send().await.unwrap();
    assert_eq!(health.status(), 503);

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn derived_metrics_are_queryable_and_aggregable() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    for (id, ts) in [
        ("e1", "2025-01-01T00:00:00Z"),
        ("e2", "2025-01-01T00:00:01Z"),
        ("e3", "2025-01-01T00:00:02Z"),
    ] {
        client
            .post(stack.url("/api/v1/events"))
            .json(&event_body(id, "click", ts))
            .send()
            .await
            .unwrap();
    }

    // processing is asynchronous: wait for the derived counters to land
    for _ in 0..200 {
        if stack.engine.monitor().get(counters::EVENTS_PROCESSED_TOTAL) >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let metrics: Value = client
        .get(stack.url("/api/v1/metrics"))
        .query(&[("name", "event.click.count")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["meta"]["count"], 3);

    let aggregate: Value = client
        .get(stack.url("/api/v1/metrics/aggregate"))
        .query(&[
            ("name", "event.click.count"),
            ("from", "2025-01-01T00:00:00Z"),
            ("to", "2025-01-01T00:00:02Z"),
        ])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(aggregate["count"], 3);
    assert_eq!(aggregate["sum"], 3.0);
    assert_eq!(aggregate["min"], 1.0);
    assert_eq!(aggregate["max"], 1.0);
    assert_eq!(aggregate["avg"], 1.0);

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stream_lifecycle_over_http() {
    let stack = spawn_stack().await;
    let client = reqwest::Client::new();

    let create = json!({"name": "orders", "buffer_size": 10, "flush_interval_ms": 20, "max_subscribers": 2});
    let created = client
        .post(stack.url("/api/v1/streams"))
        .json(&create)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);

    let conflict = client
        .post(stack.url("/api/v1/streams"))
        .json(&create)
        .send()
        .await
        .unwrap();
    assert_eq!(conflict.status(), 409);

    let listed: Value = client
        .get(stack.url("/api/v1/streams"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["meta"]["count"], 1);
    assert_eq!(listed["data"][0]["name"], "orders");
    assert_eq!(listed["data"][0]["state"], "running");

    let deleted = client
        .delete(stack.url("/api/v1/streams/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let missing = client
        .delete(stack.url("/api/v1/streams/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    stack.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rate_limited_ingest_returns_429() {
    let mut config = test_config();
    config.server.rate_limit_per_sec = Some(2);
    let stack = pulse_e2e_tests::spawn_stack_with(config).await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for i in 0..10 {
        let response = client
            .post(stack.url("/api/v1/events"))
            .json(&event_body(&format!("e{i}"), "click", "2025-01-01T00:00:00Z"))
            .send()
            .await
            .unwrap();
        statuses.push(response.status().as_u16());
    }
    assert!(statuses.contains(&429), "statuses were: {statuses:?}");

    stack.teardown().await;
}
