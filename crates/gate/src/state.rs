// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::engine::CredentialEngine;

/// Shared HTTP state.
pub struct GateState {
    pub engine: Arc<CredentialEngine>,
    /// Base URL of the upstream API, without a trailing slash.
    pub upstream_url: String,
    /// Client for forwarding proxied requests.
    pub http: reqwest::Client,
}

impl GateState {
    pub fn new(engine: Arc<CredentialEngine>, upstream_url: &str) -> Self {
        Self {
            engine,
            upstream_url: upstream_url.trim_end_matches('/').to_owned(),
            http: crate::tls::http_client(),
        }
    }
}
