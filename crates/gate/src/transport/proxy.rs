// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream dispatcher: resolve the credential, forward verbatim, stream back.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::credential::epoch_ms;
use crate::error::ErrorCode;
use crate::request_log::RequestLogEntry;
use crate::state::GateState;
use crate::status::CredentialSource;

/// Largest request body forwarded upstream.
pub const MAX_REQUEST_BODY: usize = 32 * 1024 * 1024;

const API_KEY_HEADER: &str = "x-api-key";

/// Headers scoped to a single connection, never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Credential presented by the caller: `Authorization`, else `x-api-key`.
pub fn presented_credential(headers: &HeaderMap) -> Option<&str> {
    let value = |name: &str| {
        headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.trim().is_empty())
    };
    value(header::AUTHORIZATION.as_str()).or_else(|| value(API_KEY_HEADER))
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Request headers safe to send upstream. Caller credentials, host, and
/// length are dropped; the client sets the latter two.
fn forward_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name)
            || name == header::AUTHORIZATION
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || name.as_str() == API_KEY_HEADER
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

fn forward_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

struct Pending {
    method: Method,
    path: String,
    started: Instant,
    at: u64,
}

impl Pending {
    fn entry(&self, status: u16, source: CredentialSource, error: Option<String>) -> RequestLogEntry {
        RequestLogEntry {
            at: self.at,
            method: self.method.to_string(),
            path: self.path.clone(),
            status,
            source,
            duration_ms: self.started.elapsed().as_millis() as u64,
            error,
        }
    }
}

/// `ANY /v1/{*path}`
pub async fn proxy(State(s): State<Arc<GateState>>, req: Request) -> Response {
    let pending = Pending {
        method: req.method().clone(),
        path: req.uri().path().to_owned(),
        started: Instant::now(),
        at: epoch_ms(),
    };

    let resolution = match s.engine.resolve(presented_credential(req.headers())).await {
        Ok(r) => r,
        Err(e) => {
            let code = e.code();
            s.engine.record_request_log(pending.entry(
                code.http_status(),
                CredentialSource::None,
                Some(e.to_string()),
            ));
            return e.into_response();
        }
    };
    let source = resolution.source;

    let url = match req.uri().query() {
        Some(q) => format!("{}{}?{q}", s.upstream_url, pending.path),
        None => format!("{}{}", s.upstream_url, pending.path),
    };

    let mut headers = forward_request_headers(req.headers());
    match HeaderValue::from_str(&resolution.credential_header) {
        Ok(v) => {
            headers.insert(header::AUTHORIZATION, v);
        }
        Err(_) => {
            let msg = "credential is not a valid header value";
            s.engine.record_request_log(pending.entry(400, source, Some(msg.to_owned())));
            return ErrorCode::BadRequest.to_http_response(msg).into_response();
        }
    }

    let body: Bytes = match axum::body::to_bytes(req.into_body(), MAX_REQUEST_BODY).await {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("failed to read request body: {e}");
            s.engine.record_request_log(pending.entry(400, source, Some(msg.clone())));
            return ErrorCode::BadRequest.to_http_response(msg).into_response();
        }
    };

    debug!(method = %pending.method, path = %pending.path, source = %source, "forwarding upstream");
    let upstream = s.http.request(pending.method.clone(), &url).headers(headers).body(body).send().await;

    let resp = match upstream {
        Ok(resp) => resp,
        Err(e) => {
            warn!(path = %pending.path, "upstream request failed: {e}");
            let msg = format!("upstream unreachable: {e}");
            s.engine.record_request_log(pending.entry(502, source, Some(msg.clone())));
            return ErrorCode::UpstreamError.to_http_response(msg).into_response();
        }
    };

    let status = resp.status();
    s.engine.record_request_log(pending.entry(status.as_u16(), source, None));

    let headers = forward_response_headers(resp.headers());
    let stream = resp.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
