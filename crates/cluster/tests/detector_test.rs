//! Failure detector integration tests against a fake coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use cluster::detector::FailureDetector;
use corelib::NodeId;
use serde_json::{json, Value};

/// A coordinator stand-in that counts `/node_offline` notifications.
async fn spawn_fake_coordinator() -> (String, Arc<AtomicUsize>) {
    let reports = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reports);
    let router = Router::new().route(
        "/node_offline",
        post(move |Json(_body): Json<Value>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({"status": "node removed"}))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (address, reports)
}

#[tokio::test]
async fn test_silent_node_is_reported_exactly_once() {
    let (coordinator, reports) = spawn_fake_coordinator().await;
    let silent: NodeId = "10.0.0.1:8001".parse().unwrap();
    let chatty: NodeId = "10.0.0.2:8002".parse().unwrap();

    let detector = FailureDetector::with_threshold(
        vec![silent.clone(), chatty.clone()],
        coordinator,
        Duration::from_millis(100),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    // One node keeps its heartbeat fresh, the other stays silent.
    detector.record_heartbeat(chatty.clone(), 0.0);

    // Many detection passes, as the 1s loop would produce over a minute.
    for _ in 0..5 {
        detector.scan_once().await;
    }

    assert_eq!(reports.load(Ordering::SeqCst), 1);
    assert!(detector.is_confirmed(&silent));
    assert!(!detector.is_confirmed(&chatty));
}

#[tokio::test]
async fn test_report_retries_until_coordinator_acks() {
    // No coordinator listening: the report fails, the node must not be
    // treated as confirmed.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    drop(listener);

    let silent: NodeId = "10.0.0.1:8001".parse().unwrap();
    let detector =
        FailureDetector::with_threshold(vec![silent.clone()], dead, Duration::from_millis(50))
            .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    detector.scan_once().await;

    assert!(!detector.is_confirmed(&silent));
    // The node is still eligible for the next pass.
    assert_eq!(detector.stale_nodes(), vec![silent]);
}
