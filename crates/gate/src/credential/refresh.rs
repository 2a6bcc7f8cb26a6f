// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access-token cache over the active refresh token.
//!
//! The cached access token is tied to the identity (record id and secret) of
//! the refresh token that produced it. Any change of identity drops the cache
//! before it is used again.
//!
//! Exchanges are single-flight per identity. Each identity in flight owns a
//! `tokio::sync::Mutex` slot; callers for that identity queue on it and take
//! the landed outcome instead of exchanging again. A slow exchange therefore
//! blocks only callers of its own identity. Fresh tokens are served from the
//! cache lock alone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::credential::oauth::{self, RefreshEndpoint};
use crate::credential::store::TokenStore;
use crate::credential::{epoch_ms, TokenKind, TokenRecord};
use crate::error::{CredentialError, Result};
use crate::status::StatusTracker;

/// Default re-exchange interval: six hours.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Masked view of the cache for the admin snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshCacheInfo {
    pub refresh_token_id: Option<String>,
    pub has_access_token: bool,
    pub last_refreshed_at: Option<u64>,
    /// Seconds until the cached token is considered stale. `None` when empty.
    pub stale_in_secs: Option<u64>,
}

/// Record id and secret of a refresh token.
type Identity = (String, String);

fn identity(record: &TokenRecord) -> Identity {
    (record.id.clone(), record.secret.clone())
}

/// One exchange for one identity. The slot holds the raw outcome once the
/// exchange lands; the flight leaves the map in the same step, so a landed
/// slot is only ever read by callers that were already queued on it.
type Flight = tokio::sync::Mutex<Option<Result<String>>>;

#[derive(Debug, Default)]
struct RefreshCache {
    token_id: Option<String>,
    token_value: Option<String>,
    access_token: Option<String>,
    refreshed_at: Option<Instant>,
    refreshed_at_ms: Option<u64>,
}

impl RefreshCache {
    fn tracks(&self, active: &TokenRecord) -> bool {
        self.token_id.as_deref() == Some(active.id.as_str())
            && self.token_value.as_deref() == Some(active.secret.as_str())
    }

    /// Drop everything derived from a refresh token whose identity no longer
    /// matches `active`. Returns true if a cached token was discarded.
    fn sync_identity(&mut self, active: &TokenRecord) -> bool {
        if self.tracks(active) {
            return false;
        }
        let had_token = self.access_token.is_some();
        self.clear();
        self.token_id = Some(active.id.clone());
        self.token_value = Some(active.secret.clone());
        had_token
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn fresh(&self, interval: Duration) -> Option<String> {
        let at = self.refreshed_at?;
        if at.elapsed() >= interval {
            return None;
        }
        self.access_token.clone()
    }
}

/// Keeps an access token derived from the active refresh token.
pub struct RefreshEngine {
    store: Arc<TokenStore>,
    status: Arc<StatusTracker>,
    client: reqwest::Client,
    endpoint: RefreshEndpoint,
    interval: Duration,
    cache: RwLock<RefreshCache>,
    flights: Mutex<HashMap<Identity, Arc<Flight>>>,
}

impl RefreshEngine {
    pub fn new(
        store: Arc<TokenStore>,
        status: Arc<StatusTracker>,
        client: reqwest::Client,
        endpoint: RefreshEndpoint,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            status,
            client,
            endpoint,
            interval,
            cache: RwLock::new(RefreshCache::default()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    pub fn endpoint(&self) -> &RefreshEndpoint {
        &self.endpoint
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Return a usable access token, exchanging only when the cache is
    /// empty, stale, or belongs to a different refresh token.
    ///
    /// A failed exchange falls back to the last good token of the same
    /// identity, if there is one.
    pub async fn ensure_access_token_valid(&self) -> Result<String> {
        self.obtain(false).await
    }

    /// Exchange now regardless of staleness. Callers queued behind an
    /// in-flight exchange share its outcome.
    ///
    /// Unlike [`ensure_access_token_valid`](Self::ensure_access_token_valid)
    /// a failed exchange is reported as such. The cached token is kept.
    pub async fn force_refresh(&self) -> Result<String> {
        self.obtain(true).await
    }

    /// Drop the cached access token.
    pub fn invalidate(&self) {
        self.cache.write().clear();
        self.status.access_token_cleared();
        debug!("access token cache invalidated");
    }

    pub fn cache_info(&self) -> RefreshCacheInfo {
        let cache = self.cache.read();
        let stale_in_secs = match (&cache.access_token, cache.refreshed_at) {
            (Some(_), Some(at)) => Some(self.interval.saturating_sub(at.elapsed()).as_secs()),
            _ => None,
        };
        RefreshCacheInfo {
            refresh_token_id: cache.token_id.clone(),
            has_access_token: cache.access_token.is_some(),
            last_refreshed_at: cache.refreshed_at_ms,
            stale_in_secs,
        }
    }

    /// Number of identities with an exchange in flight.
    pub fn flights_in_progress(&self) -> usize {
        self.flights.lock().len()
    }

    async fn obtain(&self, force: bool) -> Result<String> {
        loop {
            let active = self.active_refresh_token()?;
            if let Some(token) = self.cached(&active, force) {
                return Ok(token);
            }

            let flight = self.join_flight(&active);
            let mut slot = flight.lock().await;

            // Rotation keeps the record id, so a landed outcome still applies
            // to the record that is active now.
            let current = self.active_refresh_token()?;
            if let Some(outcome) = slot.as_ref().filter(|_| current.id == active.id) {
                debug!(refresh_token_id = %current.id, "sharing outcome of completed exchange");
                return self.settle(&current, outcome.clone(), force);
            }
            if identity(&current) != identity(&active) {
                // Switched while queued; start over against the new record.
                continue;
            }
            if let Some(token) = self.cached(&active, force) {
                return Ok(token);
            }

            let outcome = self.exchange(&active).await;
            *slot = Some(outcome.clone());
            self.land(&active, &flight);
            return self.settle(&active, outcome, force);
        }
    }

    fn active_refresh_token(&self) -> Result<TokenRecord> {
        self.store.active(TokenKind::RefreshToken).ok_or(CredentialError::NoRefreshTokenConfigured)
    }

    /// Sync the cache to `active` and return its token if still fresh.
    fn cached(&self, active: &TokenRecord, force: bool) -> Option<String> {
        let mut cache = self.cache.write();
        if cache.sync_identity(active) {
            self.status.access_token_cleared();
            debug!(refresh_token_id = %active.id, "refresh token changed, cache invalidated");
        }
        if force {
            return None;
        }
        let token = cache.fresh(self.interval)?;
        debug!(refresh_token_id = %active.id, "access token cache hit");
        Some(token)
    }

    fn join_flight(&self, active: &TokenRecord) -> Arc<Flight> {
        Arc::clone(self.flights.lock().entry(identity(active)).or_default())
    }

    /// Retire a landed flight. Must run while its slot is still held.
    fn land(&self, active: &TokenRecord, flight: &Arc<Flight>) {
        let key = identity(active);
        let mut flights = self.flights.lock();
        if flights.get(&key).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            flights.remove(&key);
        }
    }

    /// Apply the soft-failure rule to a raw exchange outcome.
    fn settle(&self, active: &TokenRecord, outcome: Result<String>, force: bool) -> Result<String> {
        match outcome {
            Err(err @ CredentialError::RefreshExchangeFailed(_)) if !force => {
                let cache = self.cache.read();
                match cache.access_token.clone().filter(|_| cache.tracks(active)) {
                    Some(prior) => {
                        debug!(refresh_token_id = %active.id, "serving prior access token");
                        Ok(prior)
                    }
                    None => Err(err),
                }
            }
            other => other,
        }
    }

    async fn exchange(&self, active: &TokenRecord) -> Result<String> {
        self.status.refresh_started();
        match oauth::exchange(&self.client, &self.endpoint, &active.secret).await {
            Ok(resp) => match resp.access_token() {
                Some(access) => {
                    let access = access.to_owned();
                    let rotated = resp
                        .rotated_refresh_token()
                        .filter(|r| *r != active.secret)
                        .map(str::to_owned);
                    Ok(self.complete_success(active, access, rotated))
                }
                None => {
                    warn!(refresh_token_id = %active.id, "refresh response had no access token");
                    let err = CredentialError::RefreshDidNotReturnAccessToken;
                    self.status.refresh_failed(err.to_string());
                    Err(err)
                }
            },
            Err(err) => {
                warn!(refresh_token_id = %active.id, "access token refresh failed: {err}");
                self.status.refresh_failed(err.to_string());
                Err(err)
            }
        }
    }

    fn complete_success(
        &self,
        active: &TokenRecord,
        access: String,
        rotated: Option<String>,
    ) -> String {
        let mut identity_value = active.secret.clone();
        if let Some(new_secret) = rotated {
            match self.store.rotate_secret(&active.id, &new_secret) {
                Ok(record) => {
                    info!(refresh_token_id = %record.id, "refresh token rotated");
                    identity_value = record.secret;
                }
                Err(e) => warn!(refresh_token_id = %active.id, "failed to store rotated token: {e}"),
            }
        }

        // Another identity may have become active during the exchange.
        let still_active = self
            .store
            .active(TokenKind::RefreshToken)
            .is_some_and(|r| r.id == active.id && r.secret == identity_value);
        if !still_active {
            debug!(refresh_token_id = %active.id, "refresh token changed during exchange, not cached");
            return access;
        }

        {
            let mut cache = self.cache.write();
            cache.token_id = Some(active.id.clone());
            cache.token_value = Some(identity_value);
            cache.access_token = Some(access.clone());
            cache.refreshed_at = Some(Instant::now());
            cache.refreshed_at_ms = Some(epoch_ms());
        }
        self.status.refresh_succeeded(&access);
        info!(refresh_token_id = %active.id, "access token refreshed");
        access
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
