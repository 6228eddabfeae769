#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use gatepass_core::config::StorageConfig;
use gatepass_crypto::{FreshnessPolicy, PayloadSigner};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::{AppState, build_router};
use crate::registry::{FieldType, RegistrySchema, SchemaField};
use crate::storage::{GateDatabase, NewRecord};

const SECRET: &[u8] = b"routes-test-secret-routes-test-secret";

async fn app() -> (axum::Router, GateDatabase) {
    let db = GateDatabase::open_in_memory().await.unwrap();
    let schema = RegistrySchema::new(vec![
        SchemaField::new("name", FieldType::Text).required(),
        SchemaField::new("dept", FieldType::Text),
    ])
    .unwrap();
    db.create_registry("r1", "Staff", &schema).await.unwrap();
    db.create_record(&NewRecord {
        id: "u1",
        registry_id: "r1",
        attributes: json!({"name": "Ada", "dept": "Eng"}).as_object().unwrap(),
        photo_ref: None,
    })
    .await
    .unwrap();

    let signer = Arc::new(PayloadSigner::new(SECRET, FreshnessPolicy::default()).unwrap());
    let state = AppState::new(db.clone(), signer, &StorageConfig::default());
    (build_router(state), db)
}

/// Send a request and return (status, JSON body).
async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for &(name, value) in headers {
        builder = builder.header(name, value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn issue(app: &axum::Router) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/v1/issue",
        Some(json!({"recordId": "u1", "registryId": "r1"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn issue_then_verify() {
    let (app, _db) = app().await;
    let issued = issue(&app).await;
    assert!(issued["imageEncoding"].as_str().unwrap().contains("<svg"));

    let (status, body) = send(
        &app,
        "POST",
        "/v1/verify",
        Some(json!({"payload": issued["payload"], "location": "north gate"})),
        &[("x-operator", "guard-7")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "GRANTED");
    assert_eq!(body["record"]["attributes"], json!({"name": "Ada", "dept": "Eng"}));
    assert_eq!(body["record"]["displayName"], "Ada");
    assert_eq!(body["credentialId"], issued["credentialId"]);
    assert_eq!(body["retryable"], false);
    assert!(body.get("reasonCode").is_none());
}

#[tokio::test]
async fn denial_is_still_ok_status() {
    let (app, _db) = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/v1/verify",
        Some(json!({"payload": "GP1:ZZZZ"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "DENIED");
    assert_eq!(body["reasonCode"], "MALFORMED_PAYLOAD");
    assert!(body.get("record").is_none());
}

#[tokio::test]
async fn actor_and_client_meta_are_logged() {
    let (app, db) = app().await;
    let (_, body) = send(
        &app,
        "POST",
        "/v1/verify",
        Some(json!({"payload": "nope", "actor": "body-actor", "attemptId": "att-1"})),
        &[("x-operator", "guard-7"), ("user-agent", "scanner/1.0")],
    )
    .await;
    assert_eq!(body["attemptId"], "att-1");

    let row = db.get_access_log_entry("att-1").await.unwrap();
    assert_eq!(row.actor, "guard-7");
    assert!(row.client_meta.unwrap().contains("scanner/1.0"));
}

#[tokio::test]
async fn issue_unknown_record_is_404() {
    let (app, _db) = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/v1/issue",
        Some(json!({"recordId": "ghost", "registryId": "r1"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn revoke_and_refresh() {
    let (app, _db) = app().await;
    let issued = issue(&app).await;
    let id = issued["credentialId"].as_str().unwrap();

    let (status, refreshed) =
        send(&app, "POST", &format!("/v1/credentials/{id}/payload"), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["credentialId"], id);

    let (status, body) =
        send(&app, "POST", &format!("/v1/credentials/{id}/revoke"), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], true);

    let (status, _) =
        send(&app, "POST", &format!("/v1/credentials/{id}/payload"), None, &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/v1/credentials/nope/revoke", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn access_log_pages_newest_first() {
    let (app, _db) = app().await;
    for i in 0..3 {
        send(
            &app,
            "POST",
            "/v1/verify",
            Some(json!({"payload": "x", "attemptId": format!("a{i}")})),
            &[],
        )
        .await;
    }

    let (status, count) = send(&app, "GET", "/v1/access-log/count", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["count"], 3);

    let (_, page) = send(&app, "GET", "/v1/access-log?limit=2", None, &[]).await;
    let rows = page.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["granted"], false);
    assert!(rows[0]["occurredAt"].is_i64());
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, "GET", "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["unloggedAttempts"], 0);
}
