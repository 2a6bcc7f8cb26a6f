// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credgate: credential-substituting gateway for an LLM API.

pub mod admin;
pub mod config;
pub mod credential;
pub mod engine;
pub mod error;
pub mod request_log;
pub mod resolver;
pub mod state;
pub mod status;
pub mod test_support;
pub mod tls;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GateConfig;
use crate::engine::CredentialEngine;
use crate::state::GateState;
use crate::transport::build_router;

/// Run the gateway until ctrl-c or `shutdown` is cancelled.
pub async fn run(config: GateConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    config.validate()?;
    let addr = format!("{}:{}", config.host, config.port);

    let engine = Arc::new(CredentialEngine::from_config(&config));
    let state = Arc::new(GateState::new(engine, &config.upstream_url));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let listener = TcpListener::bind(&addr).await?;
    info!("credgate listening on {} (upstream {})", listener.local_addr()?, state.upstream_url);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
