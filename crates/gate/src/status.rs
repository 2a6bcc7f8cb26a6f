// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observable summary of credential use, written as a side effect of
//! refreshes and resolutions and read by the admin surface.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::credential::{epoch_ms, mask_secret};

/// Which credential the last resolution handed upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Factory,
    Refresh,
    Client,
    #[default]
    None,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factory => "factory",
            Self::Refresh => "refresh",
            Self::Client => "client",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Success,
    Error,
    InProgress,
    #[default]
    None,
}

/// Point-in-time copy of the tracked status. Timestamps are epoch millis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub admin_secret_configured: bool,
    pub last_credential_source: CredentialSource,
    pub last_used_at: Option<u64>,
    pub last_refresh_at: Option<u64>,
    pub last_refresh_outcome: RefreshOutcome,
    pub last_refresh_error: Option<String>,
    pub masked_active_access_token: Option<String>,
    pub masked_last_client_token: Option<String>,
}

/// Shared, mutex-guarded [`AuthStatus`]. Only masked values are stored.
#[derive(Debug, Default)]
pub struct StatusTracker {
    inner: Mutex<AuthStatus>,
}

impl StatusTracker {
    pub fn new(admin_secret_configured: bool) -> Self {
        Self { inner: Mutex::new(AuthStatus { admin_secret_configured, ..Default::default() }) }
    }

    pub fn snapshot(&self) -> AuthStatus {
        self.inner.lock().clone()
    }

    pub fn refresh_started(&self) {
        self.inner.lock().last_refresh_outcome = RefreshOutcome::InProgress;
    }

    pub fn refresh_succeeded(&self, access_token: &str) {
        let mut s = self.inner.lock();
        s.last_refresh_at = Some(epoch_ms());
        s.last_refresh_outcome = RefreshOutcome::Success;
        s.last_refresh_error = None;
        s.masked_active_access_token = Some(mask_secret(access_token));
    }

    /// Record a failed exchange. The masked access token is left alone since
    /// a previously cached token may still be served.
    pub fn refresh_failed(&self, message: impl Into<String>) {
        let mut s = self.inner.lock();
        s.last_refresh_at = Some(epoch_ms());
        s.last_refresh_outcome = RefreshOutcome::Error;
        s.last_refresh_error = Some(message.into());
    }

    pub fn access_token_cleared(&self) {
        self.inner.lock().masked_active_access_token = None;
    }

    /// Record the outcome of one resolution.
    pub fn record_resolution(&self, source: CredentialSource, client_token: Option<&str>) {
        let mut s = self.inner.lock();
        s.last_credential_source = source;
        s.last_used_at = Some(epoch_ms());
        if let Some(token) = client_token {
            s.masked_last_client_token = Some(mask_secret(token));
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
