// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::unwrap_used)]

use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `tsq` with its state directory pinned to `state` and logging quiet.
pub fn tsq(state: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("tsq");
    cmd.arg("--state-dir")
        .arg(state.path())
        .env_remove("TSQ_STATE_DIR")
        .env("TSQ_LOG", "off");
    cmd
}

/// Helper to create an initialized state directory
pub fn init_temp(remote: Option<&str>) -> TempDir {
    let temp = TempDir::new().unwrap();
    let mut cmd = tsq(&temp);
    cmd.arg("init");
    if let Some(url) = remote {
        cmd.arg("--remote").arg(url);
    }
    cmd.assert().success();
    temp
}

/// Queue one operation and return its ID.
pub fn enqueue(temp: &TempDir, args: &[&str]) -> String {
    let output = tsq(temp).arg("enqueue").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "enqueue failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Answers every request with the status chosen by `respond(method, path)`.
/// Records `"METHOD /path body"` per request, health probes excluded.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
    _runtime: tokio::runtime::Runtime,
}

#[derive(Clone)]
struct StubState {
    respond: fn(&str, &str) -> u16,
    requests: Arc<Mutex<Vec<String>>>,
}

async fn answer(State(state): State<StubState>, method: Method, uri: Uri, body: String) -> StatusCode {
    let path = uri.path();
    if path != "/health" {
        let line = format!("{} {} {}", method, path, body);
        state.requests.lock().unwrap().push(line.trim_end().to_string());
    }
    StatusCode::from_u16((state.respond)(method.as_str(), path)).unwrap()
}

impl StubServer {
    pub fn start(respond: fn(&str, &str) -> u16) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(answer).with_state(StubState {
            respond,
            requests: requests.clone(),
        });
        runtime.spawn(async move { axum::serve(listener, app).await.unwrap() });

        StubServer {
            url,
            requests,
            _runtime: runtime,
        }
    }

    /// Every request answered with 200.
    pub fn ok() -> Self {
        Self::start(|_, _| 200)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// A URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}
