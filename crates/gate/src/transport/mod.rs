// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: health, admin API, and the upstream proxy.

pub mod auth;
pub mod http;
pub mod http_admin;
pub mod proxy;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{any, delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::GateState;

/// Build the axum `Router` with all gateway routes.
pub fn build_router(state: Arc<GateState>) -> Router {
    let admin = Router::new()
        .route("/state", get(http_admin::admin_state))
        .route("/tokens", post(http_admin::add_token))
        .route("/tokens/{kind}/{id}", delete(http_admin::remove_token))
        .route("/tokens/{kind}/{id}/activate", post(http_admin::activate_token))
        .route("/reload", post(http_admin::reload))
        .route("/refresh", post(http_admin::refresh))
        .route("/commands", post(http_admin::command))
        .layer(middleware::from_fn_with_state(state.clone(), auth::admin_auth_layer));

    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        .nest("/api/v1/admin", admin)
        // Everything under /v1 goes upstream
        .route("/v1/{*path}", any(proxy::proxy))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
