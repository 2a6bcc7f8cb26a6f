// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Masked projection of engine state and the administrative commands.
//!
//! Nothing returned from here carries an unmasked secret.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::credential::refresh::{RefreshCacheInfo, RefreshEngine};
use crate::credential::seed::SeedRecord;
use crate::credential::store::{StoreSnapshot, TokenStore};
use crate::credential::{mask_secret, MaskedRecord, TokenKind};
use crate::error::Result;
use crate::request_log::{RequestLog, RequestLogEntry};
use crate::status::{AuthStatus, StatusTracker};

/// Everything the admin surface can see.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayState {
    pub tokens: StoreSnapshot,
    pub auth: AuthStatus,
    pub refresh: RefreshCacheInfo,
    pub refresh_token_url: String,
    pub refresh_interval_secs: u64,
    pub requests: Vec<RequestLogEntry>,
}

/// Administrative mutation, tagged by `"command"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AdminCommand {
    AddToken {
        kind: TokenKind,
        secret: String,
        #[serde(default)]
        label: Option<String>,
    },
    RemoveToken {
        kind: TokenKind,
        id: String,
    },
    ActivateToken {
        kind: TokenKind,
        id: String,
    },
    Reload,
    Refresh,
}

/// Result of an [`AdminCommand`], tagged by `"result"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandOutcome {
    Token(MaskedRecord),
    Removed { kind: TokenKind, id: String },
    Reloaded(StoreSnapshot),
    #[serde(rename_all = "camelCase")]
    Refreshed { masked_access_token: String },
}

pub struct StatusProjector {
    store: Arc<TokenStore>,
    refresh: Arc<RefreshEngine>,
    status: Arc<StatusTracker>,
    log: Arc<RequestLog>,
    seeds: Vec<SeedRecord>,
}

impl StatusProjector {
    pub fn new(
        store: Arc<TokenStore>,
        refresh: Arc<RefreshEngine>,
        status: Arc<StatusTracker>,
        log: Arc<RequestLog>,
        seeds: Vec<SeedRecord>,
    ) -> Self {
        Self { store, refresh, status, log, seeds }
    }

    pub fn get_state(&self) -> GatewayState {
        GatewayState {
            tokens: self.store.snapshot(),
            auth: self.status.snapshot(),
            refresh: self.refresh.cache_info(),
            refresh_token_url: self.refresh.endpoint().token_url.clone(),
            refresh_interval_secs: self.refresh.interval().as_secs(),
            requests: self.log.entries(),
        }
    }

    pub fn add_token(
        &self,
        kind: TokenKind,
        secret: &str,
        label: Option<&str>,
    ) -> Result<MaskedRecord> {
        self.store.add(kind, secret, label)
    }

    pub fn remove_token(&self, kind: TokenKind, id: &str) -> Result<String> {
        self.store.remove(kind, id).map(|record| record.id)
    }

    pub fn activate_token(&self, kind: TokenKind, id: &str) -> Result<MaskedRecord> {
        self.store.activate(kind, id)
    }

    /// Re-read the store file, re-merge the startup seeds and drop the
    /// cached access token.
    pub fn reload(&self) -> StoreSnapshot {
        let snapshot = self.store.reload(&self.seeds);
        self.refresh.invalidate();
        info!(
            factory_keys = snapshot.factory_keys.len(),
            refresh_tokens = snapshot.refresh_tokens.len(),
            "admin reload"
        );
        snapshot
    }

    /// Exchange the active refresh token now. Returns the masked token.
    ///
    /// A failed exchange is an error here even when a prior token is still
    /// being served to proxied traffic.
    pub async fn refresh(&self) -> Result<String> {
        let access = self.refresh.force_refresh().await?;
        Ok(mask_secret(&access))
    }

    pub async fn execute(&self, command: AdminCommand) -> Result<CommandOutcome> {
        match command {
            AdminCommand::AddToken { kind, secret, label } => {
                self.add_token(kind, &secret, label.as_deref()).map(CommandOutcome::Token)
            }
            AdminCommand::RemoveToken { kind, id } => {
                let id = self.remove_token(kind, &id)?;
                Ok(CommandOutcome::Removed { kind, id })
            }
            AdminCommand::ActivateToken { kind, id } => {
                self.activate_token(kind, &id).map(CommandOutcome::Token)
            }
            AdminCommand::Reload => Ok(CommandOutcome::Reloaded(self.reload())),
            AdminCommand::Refresh => {
                let masked_access_token = self.refresh().await?;
                Ok(CommandOutcome::Refreshed { masked_access_token })
            }
        }
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
