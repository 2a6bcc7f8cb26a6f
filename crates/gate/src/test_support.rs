// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: mock token endpoint and mock upstream.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::credential::oauth::RefreshEndpoint;

/// A running mock OAuth token endpoint.
pub struct MockTokenServer {
    pub addr: SocketAddr,
    pub calls: Arc<AtomicU32>,
    /// Raw form bodies received, in order.
    pub forms: Arc<Mutex<Vec<String>>>,
}

impl MockTokenServer {
    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn endpoint(&self) -> RefreshEndpoint {
        RefreshEndpoint { token_url: self.token_url(), client_id: "client_test".to_owned() }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn form(&self, index: usize) -> String {
        self.forms.lock().get(index).cloned().unwrap_or_default()
    }
}

/// JSON success body carrying only an access token.
pub fn access_token_body(token: &str) -> (u16, String) {
    (200, serde_json::json!({ "access_token": token }).to_string())
}

async fn serve(app: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(addr)
}

/// Token endpoint answering from `responses` in order; the last one repeats.
/// Each response is held back by `delay` so concurrent callers overlap.
pub async fn mock_token_server(
    responses: Vec<(u16, String)>,
    delay: Duration,
) -> anyhow::Result<MockTokenServer> {
    mock_token_server_paced(responses.into_iter().map(|r| (r, delay)).collect()).await
}

/// Like [`mock_token_server`], with a separate delay for each response.
pub async fn mock_token_server_paced(
    responses: Vec<((u16, String), Duration)>,
) -> anyhow::Result<MockTokenServer> {
    let calls = Arc::new(AtomicU32::new(0));
    let forms = Arc::new(Mutex::new(Vec::new()));
    let responses = Arc::new(responses);

    let calls_clone = Arc::clone(&calls);
    let forms_clone = Arc::clone(&forms);
    let app = Router::new().route(
        "/token",
        post(move |body: String| {
            let count = Arc::clone(&calls_clone);
            let forms = Arc::clone(&forms_clone);
            let resps = Arc::clone(&responses);
            async move {
                let idx = count.fetch_add(1, Ordering::SeqCst) as usize;
                forms.lock().push(body);
                let ((status, body), delay) = resps
                    .get(idx)
                    .or_else(|| resps.last())
                    .cloned()
                    .unwrap_or(((500, "{}".into()), Duration::ZERO));
                tokio::time::sleep(delay).await;
                (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), body)
            }
        }),
    );

    let addr = serve(app).await?;
    Ok(MockTokenServer { addr, calls, forms })
}

/// One request seen by [`MockUpstream`].
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: String,
    pub path_and_query: String,
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub body: String,
}

/// A running mock upstream that echoes every request back as JSON.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<UpstreamRequest>>>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn last(&self) -> Option<UpstreamRequest> {
        self.requests.lock().last().cloned()
    }
}

/// Upstream answering every path with `status` and a JSON echo of the request.
pub async fn mock_upstream(status: u16) -> anyhow::Result<MockUpstream> {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let requests_clone = Arc::clone(&requests);
    let app = Router::new().fallback(move |req: Request| {
        let requests = Arc::clone(&requests_clone);
        async move {
            // No borrow of `req` may live across the body read below.
            let (method, path_and_query, authorization, api_key) = {
                let header = |name: &str| {
                    req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
                };
                (
                    req.method().to_string(),
                    req.uri().path_and_query().map(|pq| pq.to_string()).unwrap_or_default(),
                    header("authorization"),
                    header("x-api-key"),
                )
            };
            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default();
            let echo = serde_json::json!({
                "method": method,
                "path": path_and_query,
                "body": body,
            });
            requests.lock().push(UpstreamRequest {
                method,
                path_and_query,
                authorization,
                api_key,
                body,
            });
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                axum::Json(echo),
            )
        }
    });

    let addr = serve(app).await?;
    Ok(MockUpstream { addr, requests })
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
