//! HttpConnection against a throwaway local HTTP server.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use eiger_core::{Connection, ConnectionError, Connector};
use eiger_http::{HttpConnector, HttpSettings};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Writes = Arc<Mutex<Vec<Value>>>;

async fn state() -> Json<Value> {
    Json(json!({"value": "idle", "value_type": "State", "access_mode": "r"}))
}

async fn count_time() -> Json<Value> {
    Json(json!({"value": 0.5, "value_type": "float", "access_mode": "rw"}))
}

async fn put_count_time(State(writes): State<Writes>, Json(body): Json<Value>) -> Json<Value> {
    writes.lock().unwrap().push(body);
    Json(json!(["count_time", "frame_time"]))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn not_json() -> &'static str {
    "definitely not json"
}

async fn spawn_server() -> (HttpSettings, Writes) {
    let writes: Writes = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/detector/api/1.8.0/status/state", get(state))
        .route(
            "/detector/api/1.8.0/config/count_time",
            get(count_time).put(put_count_time),
        )
        .route("/detector/api/1.8.0/status/broken", get(broken))
        .route("/detector/api/1.8.0/status/garbage", get(not_json))
        .with_state(writes.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (HttpSettings::new("127.0.0.1", port), writes)
}

#[tokio::test]
async fn get_decodes_parameter_metadata() {
    let (settings, _) = spawn_server().await;
    let connection = HttpConnector::new(settings).connect().await.unwrap();

    let response = connection.get("detector/api/1.8.0/status/state").await.unwrap();
    assert_eq!(response.value, json!("idle"));
    assert_eq!(response.value_type.as_deref(), Some("State"));
    assert_eq!(response.access_mode.as_deref(), Some("r"));
}

#[tokio::test]
async fn put_wraps_value_in_object() {
    let (settings, writes) = spawn_server().await;
    let connection = HttpConnector::new(settings).connect().await.unwrap();

    connection
        .put("detector/api/1.8.0/config/count_time", json!(1.25))
        .await
        .unwrap();

    assert_eq!(*writes.lock().unwrap(), vec![json!({"value": 1.25})]);
}

#[tokio::test]
async fn error_statuses_are_reported() {
    let (settings, _) = spawn_server().await;
    let connection = HttpConnector::new(settings).connect().await.unwrap();

    let err = connection
        .get("detector/api/1.8.0/status/broken")
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::Status { status: 500, .. }));

    let err = connection
        .get("detector/api/1.8.0/status/missing")
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::Status { status: 404, .. }));
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let (settings, _) = spawn_server().await;
    let connection = HttpConnector::new(settings).connect().await.unwrap();

    let err = connection
        .get("detector/api/1.8.0/status/garbage")
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::Decode { .. }));
}

#[tokio::test]
async fn requests_fail_after_close() {
    let (settings, _) = spawn_server().await;
    let connection = HttpConnector::new(settings).connect().await.unwrap();

    connection.close().await.unwrap();
    // Second close is harmless
    connection.close().await.unwrap();

    let err = connection
        .get("detector/api/1.8.0/status/state")
        .await
        .unwrap_err();
    assert_eq!(err, ConnectionError::Closed);
}

#[tokio::test]
async fn unreachable_device_is_a_request_error() {
    // Bind then drop to find a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let connection = HttpConnector::new(HttpSettings::new("127.0.0.1", port))
        .connect()
        .await
        .unwrap();
    let err = connection
        .get("detector/api/1.8.0/status/state")
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::Request { .. }));
}
