// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the admin API. All responses are masked.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::admin::{AdminCommand, CommandOutcome, GatewayState};
use crate::credential::store::StoreSnapshot;
use crate::credential::{MaskedRecord, TokenKind};
use crate::error::CredentialError;
use crate::state::GateState;

type AdminResult<T> = Result<Json<T>, CredentialError>;

fn parse_kind(kind: &str) -> Result<TokenKind, CredentialError> {
    kind.parse().map_err(|e: anyhow::Error| CredentialError::Validation(e.to_string()))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, CredentialError> {
    payload.map(|Json(v)| v).map_err(|e| CredentialError::Validation(e.body_text()))
}

/// `GET /api/v1/admin/state`
pub async fn admin_state(State(s): State<Arc<GateState>>) -> Json<GatewayState> {
    Json(s.engine.projector().get_state())
}

/// Request body for `POST /api/v1/admin/tokens`.
#[derive(Debug, Deserialize)]
pub struct AddTokenRequest {
    pub kind: TokenKind,
    pub secret: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// `POST /api/v1/admin/tokens`
pub async fn add_token(
    State(s): State<Arc<GateState>>,
    payload: Result<Json<AddTokenRequest>, JsonRejection>,
) -> AdminResult<MaskedRecord> {
    let req = body(payload)?;
    s.engine.projector().add_token(req.kind, &req.secret, req.label.as_deref()).map(Json)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveTokenResponse {
    pub id: String,
    pub removed: bool,
}

/// `DELETE /api/v1/admin/tokens/{kind}/{id}`
pub async fn remove_token(
    State(s): State<Arc<GateState>>,
    Path((kind, id)): Path<(String, String)>,
) -> AdminResult<RemoveTokenResponse> {
    let kind = parse_kind(&kind)?;
    let id = s.engine.projector().remove_token(kind, &id)?;
    Ok(Json(RemoveTokenResponse { id, removed: true }))
}

/// `POST /api/v1/admin/tokens/{kind}/{id}/activate`
pub async fn activate_token(
    State(s): State<Arc<GateState>>,
    Path((kind, id)): Path<(String, String)>,
) -> AdminResult<MaskedRecord> {
    let kind = parse_kind(&kind)?;
    s.engine.projector().activate_token(kind, &id).map(Json)
}

/// `POST /api/v1/admin/reload`
pub async fn reload(State(s): State<Arc<GateState>>) -> Json<StoreSnapshot> {
    Json(s.engine.projector().reload())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub masked_access_token: String,
}

/// `POST /api/v1/admin/refresh`
pub async fn refresh(State(s): State<Arc<GateState>>) -> AdminResult<RefreshResponse> {
    let masked_access_token = s.engine.projector().refresh().await?;
    Ok(Json(RefreshResponse { masked_access_token }))
}

/// `POST /api/v1/admin/commands`
pub async fn command(
    State(s): State<Arc<GateState>>,
    payload: Result<Json<AdminCommand>, JsonRejection>,
) -> AdminResult<CommandOutcome> {
    let command = body(payload)?;
    s.engine.projector().execute(command).await.map(Json)
}
