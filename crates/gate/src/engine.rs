// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::admin::StatusProjector;
use crate::config::GateConfig;
use crate::credential::oauth::RefreshEndpoint;
use crate::credential::refresh::{RefreshEngine, DEFAULT_REFRESH_INTERVAL};
use crate::credential::seed::{self, SeedRecord};
use crate::credential::store::TokenStore;
use crate::error::Result;
use crate::request_log::{RequestLog, RequestLogEntry, DEFAULT_CAPACITY};
use crate::resolver::{AuthResolver, Resolution};
use crate::status::StatusTracker;

/// Inputs needed to start a [`CredentialEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub store_path: PathBuf,
    pub admin_secret: Option<String>,
    pub refresh_endpoint: RefreshEndpoint,
    pub refresh_interval: Duration,
    pub request_log_capacity: usize,
}

impl EngineOptions {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            admin_secret: None,
            refresh_endpoint: RefreshEndpoint::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            request_log_capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            store_path: config.store_path(),
            admin_secret: config.admin_secret().map(str::to_owned),
            refresh_endpoint: RefreshEndpoint {
                token_url: config.refresh_token_url.clone(),
                client_id: config.refresh_client_id.clone(),
            },
            refresh_interval: config.refresh_interval(),
            request_log_capacity: config.request_log_capacity,
        }
    }
}

/// The credential engine: store, refresh cache, resolver, and admin view.
///
/// Constructed once in [`crate::run`] and shared behind an `Arc`.
pub struct CredentialEngine {
    store: Arc<TokenStore>,
    refresh: Arc<RefreshEngine>,
    status: Arc<StatusTracker>,
    log: Arc<RequestLog>,
    resolver: AuthResolver,
    projector: StatusProjector,
}

impl CredentialEngine {
    /// Open the store, merge `seeds` as read-only records, and wire the
    /// collaborators together.
    pub fn start(options: EngineOptions, seeds: Vec<SeedRecord>) -> Self {
        let status = Arc::new(StatusTracker::new(options.admin_secret.is_some()));
        let store = Arc::new(TokenStore::open(&options.store_path, &seeds));
        let refresh = Arc::new(RefreshEngine::new(
            Arc::clone(&store),
            Arc::clone(&status),
            crate::tls::http_client(),
            options.refresh_endpoint.clone(),
            options.refresh_interval,
        ));
        let log = Arc::new(RequestLog::new(options.request_log_capacity));
        let resolver = AuthResolver::new(
            options.admin_secret.clone(),
            Arc::clone(&store),
            Arc::clone(&refresh),
            Arc::clone(&status),
        );
        let projector = StatusProjector::new(
            Arc::clone(&store),
            Arc::clone(&refresh),
            Arc::clone(&status),
            Arc::clone(&log),
            seeds,
        );

        info!(
            store = %options.store_path.display(),
            admin_secret = options.admin_secret.is_some(),
            refresh_interval_secs = options.refresh_interval.as_secs(),
            "credential engine started"
        );
        Self { store, refresh, status, log, resolver, projector }
    }

    /// Start from process configuration, reading the environment and the
    /// legacy credential file once.
    pub fn from_config(config: &GateConfig) -> Self {
        let legacy = config.legacy_auth_path();
        let seeds = seed::collect(legacy.as_deref());
        Self::start(EngineOptions::from_config(config), seeds)
    }

    /// Choose the upstream credential for one request.
    pub async fn resolve(&self, presented: Option<&str>) -> Result<Resolution> {
        self.resolver.resolve(presented).await
    }

    pub fn record_request_log(&self, entry: RequestLogEntry) {
        self.log.push(entry);
    }

    pub fn resolver(&self) -> &AuthResolver {
        &self.resolver
    }

    pub fn projector(&self) -> &StatusProjector {
        &self.projector
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn refresh(&self) -> &Arc<RefreshEngine> {
        &self.refresh
    }

    pub fn status(&self) -> &Arc<StatusTracker> {
        &self.status
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
