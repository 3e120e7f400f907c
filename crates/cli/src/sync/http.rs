// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for a REST-style CRUD service.
//!
//! Request mapping:
//!
//! | action | request                                   |
//! |--------|-------------------------------------------|
//! | create | `POST {base}/{collection}` + JSON payload |
//! | update | `PATCH {base}/{collection}/{id}` + JSON   |
//! | delete | `DELETE {base}/{collection}/{id}`         |
//!
//! Every request carries `Idempotency-Key: <operation id>` so a replay after
//! a lost acknowledgement can be deduplicated server-side.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use tsq_core::{Action, PendingOperation};

use super::remote::{Remote, RemoteError, RemoteFuture, RemoteResult};
use crate::error::{Error, Result};

/// Header carrying the operation ID.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Longest response body excerpt kept in an error message.
const MAX_BODY_EXCERPT: usize = 200;

/// [`Remote`] implementation backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base: Url,
    health_path: String,
}

impl HttpRemote {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration, health_path: &str) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|_| Error::InvalidRemoteUrl(base_url.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(Error::InvalidRemoteUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .user_agent(concat!("tsq/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::RemoteClient(e.to_string()))?;

        Ok(HttpRemote {
            client,
            base,
            health_path: health_path.to_string(),
        })
    }

    /// Returns `base` with `segments` appended, each percent-encoded.
    fn url_with<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    /// Build the request for one operation without sending it.
    pub(crate) fn request_for(&self, op: &PendingOperation) -> reqwest::RequestBuilder {
        let collection = op.kind.entity_type.plural();
        let builder = match op.kind.action {
            Action::Create => self.client.post(self.url_with([collection])).json(&op.payload),
            Action::Update => self
                .client
                .patch(self.url_with([collection, op.entity_id.as_str()]))
                .json(&op.payload),
            Action::Delete => self
                .client
                .delete(self.url_with([collection, op.entity_id.as_str()])),
        };
        builder.header(IDEMPOTENCY_HEADER, op.id.as_str())
    }

    fn health_url(&self) -> Url {
        self.url_with(self.health_path.split('/').filter(|s| !s.is_empty()))
    }
}

impl Remote for HttpRemote {
    fn execute<'a>(&'a self, op: &'a PendingOperation) -> RemoteFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let response = self
                .request_for(op)
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, &body))
        })
    }

    fn probe(&self) -> RemoteFuture<'_, bool> {
        Box::pin(async move {
            match self.client.get(self.health_url()).send().await {
                Ok(response) => !response.status().is_server_error(),
                Err(e) => {
                    tracing::debug!("probe failed: {}", e);
                    false
                }
            }
        })
    }
}

/// Classify a non-success HTTP status.
///
/// 408, 425, 429 and 5xx are transient; everything else the server said
/// "no" to is permanent.
pub fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = describe(status, body);
    let retryable = status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_EARLY | StatusCode::TOO_MANY_REQUESTS
        );

    if retryable {
        RemoteError::Retryable(message)
    } else {
        RemoteError::Permanent(message)
    }
}

/// Classify a failure to get any response at all.
pub fn classify_transport_error(err: &reqwest::Error) -> RemoteError {
    if err.is_builder() {
        RemoteError::Permanent(err.to_string())
    } else {
        RemoteError::Retryable(err.to_string())
    }
}

fn describe(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status.to_string();
    }
    let excerpt: String = body.chars().take(MAX_BODY_EXCERPT).collect();
    format!("{status}: {excerpt}")
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
