// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorCode;
use crate::resolver::AuthResolver;
use crate::state::GateState;

/// Validate a Bearer admin secret from HTTP headers.
///
/// Without a configured admin secret nothing validates.
pub fn validate_bearer(headers: &HeaderMap, resolver: &AuthResolver) -> Result<(), ErrorCode> {
    let header =
        headers.get("authorization").and_then(|v| v.to_str().ok()).ok_or(ErrorCode::Unauthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or(ErrorCode::Unauthorized)?;
    if resolver.is_admin_secret(token.trim()) {
        Ok(())
    } else {
        Err(ErrorCode::Unauthorized)
    }
}

/// Axum middleware guarding the admin API.
pub async fn admin_auth_layer(
    state: State<Arc<GateState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Err(code) = validate_bearer(req.headers(), state.engine.resolver()) {
        tracing::debug!(path = %req.uri().path(), "admin request rejected");
        return code.to_http_response("unauthorized").into_response();
    }

    next.run(req).await
}
