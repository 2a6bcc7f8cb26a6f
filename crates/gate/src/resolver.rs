// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-request choice of upstream credential.
//!
//! A caller presenting the admin secret gets a server-managed credential:
//! the active factory key if any, else an access token derived from the
//! active refresh token. Any other presented credential passes through
//! untouched.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::credential::refresh::RefreshEngine;
use crate::credential::store::TokenStore;
use crate::credential::{mask_secret, TokenKind};
use crate::error::{CredentialError, Result};
use crate::status::{CredentialSource, StatusTracker};

/// Constant-time string comparison to prevent timing side-channel attacks.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// A presented `Authorization`-style value split into scheme and token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presented<'a> {
    pub scheme: Option<&'a str>,
    pub token: &'a str,
}

/// Split `"Scheme token"` or a bare `"token"`. Blank input is absent.
pub fn parse_presented(raw: &str) -> Option<Presented<'_>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.split_once(char::is_whitespace) {
        Some((scheme, token)) if !token.trim().is_empty() => {
            Some(Presented { scheme: Some(scheme), token: token.trim() })
        }
        _ => Some(Presented { scheme: None, token: raw }),
    }
}

/// Credential chosen for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Full `Authorization` header value to send upstream.
    pub credential_header: String,
    pub source: CredentialSource,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("credential_header", &mask_secret(&self.credential_header))
            .field("source", &self.source)
            .finish()
    }
}

pub struct AuthResolver {
    admin_secret: Option<String>,
    store: Arc<TokenStore>,
    refresh: Arc<RefreshEngine>,
    status: Arc<StatusTracker>,
}

impl AuthResolver {
    pub fn new(
        admin_secret: Option<String>,
        store: Arc<TokenStore>,
        refresh: Arc<RefreshEngine>,
        status: Arc<StatusTracker>,
    ) -> Self {
        let admin_secret = admin_secret.filter(|s| !s.is_empty());
        Self { admin_secret, store, refresh, status }
    }

    /// True if `token` equals the configured admin secret.
    pub fn is_admin_secret(&self, token: &str) -> bool {
        self.admin_secret.as_deref().is_some_and(|secret| constant_time_eq(token, secret))
    }

    pub async fn resolve(&self, presented: Option<&str>) -> Result<Resolution> {
        let result = self.decide(presented).await;
        match &result {
            Ok(resolution) => {
                let client_token = match resolution.source {
                    CredentialSource::Client => presented.and_then(parse_presented).map(|p| p.token),
                    _ => None,
                };
                self.status.record_resolution(resolution.source, client_token);
                debug!(source = %resolution.source, "credential resolved");
            }
            Err(e) => {
                self.status.record_resolution(CredentialSource::None, None);
                debug!("credential resolution failed: {e}");
            }
        }
        result
    }

    async fn decide(&self, presented: Option<&str>) -> Result<Resolution> {
        let raw = presented.filter(|raw| parse_presented(raw).is_some());
        let Some(raw) = raw else {
            return Err(CredentialError::NoAuthorizationProvided);
        };
        let token = parse_presented(raw).map(|p| p.token).unwrap_or_default();

        if !self.is_admin_secret(token) {
            return Ok(Resolution {
                credential_header: raw.to_owned(),
                source: CredentialSource::Client,
            });
        }

        if let Some(key) = self.store.active(TokenKind::FactoryKey) {
            return Ok(Resolution {
                credential_header: format!("Bearer {}", key.secret),
                source: CredentialSource::Factory,
            });
        }

        if self.store.active(TokenKind::RefreshToken).is_some() {
            // Removed between the check and the exchange.
            let access = self.refresh.ensure_access_token_valid().await.map_err(|e| match e {
                CredentialError::NoRefreshTokenConfigured => {
                    CredentialError::NoServerCredentialConfigured
                }
                other => other,
            })?;
            return Ok(Resolution {
                credential_header: format!("Bearer {access}"),
                source: CredentialSource::Refresh,
            });
        }

        Err(CredentialError::NoServerCredentialConfigured)
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
