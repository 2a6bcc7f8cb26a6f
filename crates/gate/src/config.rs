// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::credential::oauth::{DEFAULT_CLIENT_ID, DEFAULT_TOKEN_URL};

/// Credential-substituting gateway for an LLM API.
#[derive(Debug, Clone, Parser)]
#[command(name = "credgate", version, about)]
pub struct GateConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "CREDGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000, env = "CREDGATE_PORT")]
    pub port: u16,

    /// Secret that unlocks server-managed credentials and the admin API.
    /// If unset, every request passes its own credential through.
    #[arg(long, env = "CREDGATE_ADMIN_SECRET")]
    pub admin_secret: Option<String>,

    /// Directory holding the token store.
    #[arg(long, default_value = "data", env = "CREDGATE_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Token store file. Defaults to `<data-dir>/tokens.json`.
    #[arg(long, env = "CREDGATE_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Legacy credential file. Defaults to `$HOME/.factory/auth.json`.
    #[arg(long, env = "CREDGATE_LEGACY_AUTH_FILE")]
    pub legacy_auth_file: Option<PathBuf>,

    /// Base URL requests under `/v1` are forwarded to.
    #[arg(long, default_value = "https://api.factory.ai", env = "CREDGATE_UPSTREAM_URL")]
    pub upstream_url: String,

    /// OAuth token endpoint for the refresh grant.
    #[arg(long, default_value = DEFAULT_TOKEN_URL, env = "CREDGATE_REFRESH_TOKEN_URL")]
    pub refresh_token_url: String,

    /// OAuth client id presented with the refresh grant.
    #[arg(long, default_value = DEFAULT_CLIENT_ID, env = "CREDGATE_REFRESH_CLIENT_ID")]
    pub refresh_client_id: String,

    /// Seconds before a cached access token is re-exchanged.
    #[arg(long, default_value_t = 21_600, env = "CREDGATE_REFRESH_INTERVAL_SECS")]
    pub refresh_interval_secs: u64,

    /// Number of recent requests kept for the admin view.
    #[arg(long, default_value_t = 200, env = "CREDGATE_REQUEST_LOG_CAPACITY")]
    pub request_log_capacity: usize,

    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    #[arg(long, default_value = "info", env = "CREDGATE_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "CREDGATE_LOG_FORMAT")]
    pub log_format: String,
}

impl GateConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.request_log_capacity == 0 {
            anyhow::bail!("--request-log-capacity must be at least 1");
        }
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("--refresh-interval-secs must be at least 1");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other} (expected json or text)"),
        }
        if self.upstream_url.trim().is_empty() {
            anyhow::bail!("--upstream-url must not be empty");
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| crate::credential::store_path(&self.data_dir))
    }

    pub fn legacy_auth_path(&self) -> Option<PathBuf> {
        self.legacy_auth_file.clone().or_else(crate::credential::seed::default_legacy_auth_path)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Non-empty admin secret, if configured.
    pub fn admin_secret(&self) -> Option<&str> {
        self.admin_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Build a minimal `GateConfig` for tests (port 0, store under `dir`).
    #[doc(hidden)]
    pub fn test(dir: &std::path::Path) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            admin_secret: Some("s3cr3t".into()),
            data_dir: dir.to_path_buf(),
            store_path: None,
            legacy_auth_file: Some(dir.join("no-legacy-auth.json")),
            upstream_url: "http://127.0.0.1:9".into(),
            refresh_token_url: "http://127.0.0.1:9/token".into(),
            refresh_client_id: "client_test".into(),
            refresh_interval_secs: 21_600,
            request_log_capacity: 200,
            log_level: "debug".into(),
            log_format: "text".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
