use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use http_body_util::BodyExt;
use serde_json::Value;
use tailor_storage::Database;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::router::AppState;
use crate::telemetry;

/// File-backed database with migrations applied; keep the directory alive.
pub async fn setup_database() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());
    let database = Database::connect(&url).await.expect("connect");
    database.run_migrations().await.expect("migrations");
    (database, dir)
}

pub async fn setup_state(now: DateTime<Utc>) -> (AppState, TempDir) {
    let metrics = telemetry::init_metrics().expect("metrics init");
    let (database, dir) = setup_database().await;
    let state = AppState::new(metrics, database, Tz::UTC).with_clock(Arc::new(move || now));
    (state, dir)
}

/// Sends `request` through the router and decodes the JSON body, if any.
pub async fn send(app: &Router, request: Request<Body>) -> (axum::http::StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("handler should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should read")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}
