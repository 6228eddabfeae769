#![allow(clippy::unwrap_used)]

//! Drives the verify client against a stub server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use gatepass_scanner::station::{capture, submit_all};
use gatepass_scanner::{ScanDebouncer, StationConfig, VerifyClient, scan_feed};

const PAYLOAD: &str = "GP1:0100000000006553F10002753101234567890ABCDEF0123456789ABCDEF01";

/// Calls seen by the stub: (attempt id, operator header).
type Calls = Arc<Mutex<Vec<(String, String)>>>;

/// Answers `STORAGE_UNAVAILABLE` for the first `failures` calls, then grants.
async fn stub(failures: usize) -> (SocketAddr, Calls) {
    let calls: Calls = Arc::default();

    async fn verify(
        State((calls, failures)): State<(Calls, usize)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let attempt_id = body["attemptId"].as_str().unwrap().to_string();
        let operator = headers
            .get("x-operator")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let n = {
            let mut calls = calls.lock().unwrap();
            calls.push((attempt_id.clone(), operator));
            calls.len()
        };
        if n <= failures {
            Json(json!({
                "attemptId": attempt_id,
                "decision": "DENIED",
                "reasonCode": "STORAGE_UNAVAILABLE",
                "retryable": true
            }))
        } else {
            Json(json!({
                "attemptId": attempt_id,
                "decision": "GRANTED",
                "retryable": false,
                "record": {"displayName": "Ada"},
                "credentialId": "c1"
            }))
        }
    }

    let app = Router::new()
        .route("/v1/verify", post(verify))
        .with_state((Arc::clone(&calls), failures));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, calls)
}

fn client(addr: SocketAddr, max_attempts: u32) -> VerifyClient {
    VerifyClient::new(StationConfig {
        server_url: format!("http://{addr}/"),
        operator: "guard-9".to_string(),
        location: Some("dock".to_string()),
        registry_hint: None,
        max_attempts,
        backoff: Duration::from_millis(5),
    })
    .unwrap()
}

#[tokio::test]
async fn retries_reuse_attempt_id() {
    let (addr, calls) = stub(2).await;
    let reply = client(addr, 3).verify(PAYLOAD).await.unwrap();

    assert!(reply.is_granted());
    assert_eq!(reply.summary(), "GRANTED Ada");
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(id, _)| id == &calls[0].0));
    assert!(calls.iter().all(|(_, op)| op == "guard-9"));
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let (addr, calls) = stub(10).await;
    let reply = client(addr, 2).verify(PAYLOAD).await.unwrap();

    assert!(!reply.is_granted());
    assert!(reply.retryable);
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn repeated_decodes_reach_server_once() {
    let (addr, calls) = stub(0).await;
    let client = client(addr, 1);

    let (publisher, consumer) = scan_feed();
    let input = format!("{PAYLOAD}\n{PAYLOAD}\n").into_bytes();
    let published = capture(
        &input[..],
        ScanDebouncer::new(Duration::from_secs(3), 24),
        publisher,
    )
    .await
    .unwrap();
    assert_eq!(published, 1);

    let submitted = submit_all(consumer, |scan| {
        let client = &client;
        async move {
            client.verify(&scan).await.unwrap();
        }
    })
    .await;

    assert_eq!(submitted, 1);
    assert_eq!(calls.lock().unwrap().len(), 1);
}
