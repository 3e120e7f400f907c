// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use super::*;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::Router;
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;
use tsq_core::{EntityType, OpKind};
use yare::parameterized;

fn remote(base: &str) -> HttpRemote {
    HttpRemote::new(base, Duration::from_secs(2), "/health").unwrap()
}

fn op(action: Action, entity_id: &str) -> PendingOperation {
    PendingOperation::new(
        OpKind::new(action, EntityType::Task),
        entity_id,
        json!({"title": "Buy milk"}),
        Utc::now(),
    )
}

/// Requests seen by a [`canned`] server, as `"METHOD /path idempotency-key"`.
#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<String>>>);

impl Seen {
    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct Canned {
    status: u16,
    body: &'static str,
    seen: Seen,
}

async fn reply(
    State(canned): State<Canned>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    let key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    canned.seen.0.lock().unwrap().push(format!("{} {} {}", method, uri.path(), key));
    (StatusCode::from_u16(canned.status).unwrap(), canned.body)
}

/// Answers every request with `status` and `body`.
async fn canned(status: u16, body: &'static str) -> (String, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Seen::default();
    let app = Router::new().fallback(reply).with_state(Canned {
        status,
        body,
        seen: seen.clone(),
    });
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}"), seen)
}

#[test]
fn new_rejects_non_http_urls() {
    for url in ["ftp://example.com", "not a url", "mailto:someone@example.com"] {
        let err = HttpRemote::new(url, Duration::from_secs(1), "/health").unwrap_err();
        assert!(matches!(err, Error::InvalidRemoteUrl(_)), "{url}");
    }
}

#[parameterized(
    create = { Action::Create, "POST", "http://api.test/v1/tasks" },
    update = { Action::Update, "PATCH", "http://api.test/v1/tasks/t1" },
    delete = { Action::Delete, "DELETE", "http://api.test/v1/tasks/t1" },
)]
fn request_mapping(action: Action, method: &str, url: &str) {
    let op = op(action, "t1");
    let request = remote("http://api.test/v1").request_for(&op).build().unwrap();

    assert_eq!(request.method().as_str(), method);
    assert_eq!(request.url().as_str(), url);
    assert_eq!(
        request.headers().get(IDEMPOTENCY_HEADER).unwrap(),
        op.id.as_str()
    );
}

#[test]
fn delete_has_no_body() {
    let request = remote("http://api.test").request_for(&op(Action::Delete, "t1")).build().unwrap();
    assert!(request.body().is_none());
}

#[test]
fn update_sends_payload_as_json() {
    let request = remote("http://api.test").request_for(&op(Action::Update, "t1")).build().unwrap();
    let body = request.body().and_then(|b| b.as_bytes()).unwrap();
    let value: serde_json::Value = serde_json::from_slice(body).unwrap();
    assert_eq!(value, json!({"title": "Buy milk"}));
}

#[test]
fn trailing_slash_in_base_is_not_doubled() {
    let request = remote("http://api.test/v1/").request_for(&op(Action::Create, "t1")).build().unwrap();
    assert_eq!(request.url().as_str(), "http://api.test/v1/tasks");
}

#[test]
fn entity_id_is_percent_encoded() {
    let request = remote("http://api.test").request_for(&op(Action::Update, "a/b c")).build().unwrap();
    assert_eq!(request.url().as_str(), "http://api.test/tasks/a%2Fb%20c");
}

#[test]
fn health_url_is_under_base() {
    let r = HttpRemote::new("http://api.test/v1", Duration::from_secs(1), "/status/health").unwrap();
    assert_eq!(r.health_url().as_str(), "http://api.test/v1/status/health");
}

#[parameterized(
    request_timeout = { 408 },
    too_early = { 425 },
    too_many_requests = { 429 },
    internal = { 500 },
    bad_gateway = { 502 },
    unavailable = { 503 },
)]
fn transient_statuses_are_retryable(code: u16) {
    let status = StatusCode::from_u16(code).unwrap();
    assert!(classify_status(status, "").is_retryable());
}

#[parameterized(
    bad_request = { 400 },
    forbidden = { 403 },
    not_found = { 404 },
    conflict = { 409 },
    gone = { 410 },
    unprocessable = { 422 },
)]
fn client_errors_are_permanent(code: u16) {
    let status = StatusCode::from_u16(code).unwrap();
    assert!(!classify_status(status, "").is_retryable());
}

#[test]
fn error_message_includes_body_excerpt() {
    let err = classify_status(StatusCode::UNPROCESSABLE_ENTITY, "  title is required\n");
    assert_eq!(err.message(), "422 Unprocessable Entity: title is required");

    let long = "x".repeat(1000);
    let err = classify_status(StatusCode::BAD_REQUEST, &long);
    assert!(err.message().len() < 300);
}

#[tokio::test]
async fn execute_succeeds_on_2xx() {
    let (base, seen) = canned(201, "").await;
    let op = op(Action::Create, "t1");

    remote(&base).execute(&op).await.unwrap();

    assert_eq!(seen.all(), vec![format!("POST /tasks {}", op.id)]);
}

#[tokio::test]
async fn execute_maps_rejection_to_permanent() {
    let (base, _seen) = canned(422, "invalid").await;

    let err = remote(&base).execute(&op(Action::Update, "t1")).await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Permanent("422 Unprocessable Entity: invalid".into())
    );
}

#[tokio::test]
async fn execute_maps_overload_to_retryable() {
    let (base, seen) = canned(503, "").await;
    let op = op(Action::Delete, "t1");

    let err = remote(&base).execute(&op).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(seen.all(), vec![format!("DELETE /tasks/t1 {}", op.id)]);
}

#[tokio::test]
async fn unreachable_server_is_retryable_and_not_probed_online() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let r = remote(&format!("http://{addr}"));
    let err = r.execute(&op(Action::Create, "t1")).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(!r.probe().await);
}

#[tokio::test]
async fn probe_treats_client_errors_as_reachable() {
    let (base, seen) = canned(404, "").await;

    assert!(remote(&base).probe().await);
    assert_eq!(seen.all(), vec!["GET /health -"]);
}

#[tokio::test]
async fn probe_treats_server_errors_as_unreachable() {
    let (base, _seen) = canned(502, "").await;

    assert!(!remote(&base).probe().await);
}
