// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::credential::TokenKind;
use crate::state::GateState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub factory_keys: usize,
    pub refresh_tokens: usize,
    pub admin_secret_configured: bool,
}

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<GateState>>) -> impl IntoResponse {
    let store = s.engine.store();
    Json(HealthResponse {
        status: "running".to_owned(),
        factory_keys: store.count(TokenKind::FactoryKey),
        refresh_tokens: store.count(TokenKind::RefreshToken),
        admin_secret_configured: s.engine.status().snapshot().admin_secret_configured,
    })
}
